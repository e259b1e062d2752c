use image::RgbImage;
use led_mapper::{Frame, FrameError, FrameSource, MapperError};
use log::info;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use std::path::Path;

/// Frames decoded from a video file with OpenCV.
///
/// The decoder is sequential: consecutive requests are served by plain reads and a
/// seek is only issued when the requested frame is not the next one in the stream.
pub struct OpenCvFrameSource {
    capture: VideoCapture,
    frame_count: u64,
    fps: f64,
    cursor: ReadCursor,
    buffer: Mat,
}

impl OpenCvFrameSource {
    pub fn open(path: &Path) -> Result<Self, MapperError> {
        let open_error = |reason: String| MapperError::SourceOpen {
            source_path: path.to_path_buf(),
            reason,
        };

        let capture = VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)
            .map_err(|e| open_error(e.to_string()))?;
        if !capture.is_opened().map_err(|e| open_error(e.to_string()))? {
            return Err(open_error("Error opening video file".to_string()));
        }

        let frame_count = capture
            .get(videoio::CAP_PROP_FRAME_COUNT)
            .map_err(|e| open_error(e.to_string()))?
            .max(0.0) as u64;
        let fps = capture
            .get(videoio::CAP_PROP_FPS)
            .map_err(|e| open_error(e.to_string()))?;
        info!("Total frames: {frame_count} at {fps:.2} fps");

        Ok(Self {
            capture,
            frame_count,
            fps,
            cursor: ReadCursor::start(),
            buffer: Mat::default(),
        })
    }

    /// Frame rate reported by the container.
    pub fn fps(&self) -> f64 {
        self.fps
    }
}

impl FrameSource for OpenCvFrameSource {
    fn total_frame_count(&self) -> u64 {
        self.frame_count
    }

    fn frame(&mut self, frame_number: u64) -> Result<Frame, FrameError> {
        let decode_error = |e: opencv::Error| FrameError::Decode {
            frame: frame_number,
            reason: e.to_string(),
        };

        let seek = self.cursor.needs_seek(frame_number);
        // Until this read succeeds the stream position is unknown.
        self.cursor.lost();
        if seek {
            self.capture
                .set(videoio::CAP_PROP_POS_FRAMES, frame_number as f64)
                .map_err(decode_error)?;
        }

        let read = self.capture.read(&mut self.buffer).map_err(decode_error)?;
        if !read || self.buffer.empty() {
            return Err(FrameError::EndOfStream(frame_number));
        }
        self.cursor.advanced(frame_number);

        bgr_to_rgb(&self.buffer)
            .map_err(decode_error)?
            .ok_or_else(|| FrameError::Decode {
                frame: frame_number,
                reason: "unexpected pixel layout".to_string(),
            })
    }
}

/// Tracks which frame the decoder will return on its next plain read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReadCursor {
    /// `None` once a read or seek failed and the position is unknown.
    next: Option<u64>,
}

impl ReadCursor {
    fn start() -> Self {
        Self { next: Some(0) }
    }

    fn needs_seek(&self, frame_number: u64) -> bool {
        self.next != Some(frame_number)
    }

    fn advanced(&mut self, frame_number: u64) {
        self.next = frame_number.checked_add(1);
    }

    fn lost(&mut self) {
        self.next = None;
    }
}

/// Converts an 8-bit BGR `Mat` into an `RgbImage`.
fn bgr_to_rgb(bgr: &Mat) -> opencv::Result<Option<RgbImage>> {
    let mut rgb = Mat::default();
    imgproc::cvt_color(bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
    let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
    let bytes = rgb.data_bytes()?.to_vec();
    Ok(RgbImage::from_raw(width, height, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_reads_never_seek() {
        let mut cursor = ReadCursor::start();
        for frame_number in 0..5 {
            assert!(!cursor.needs_seek(frame_number));
            cursor.lost();
            cursor.advanced(frame_number);
        }
        assert!(!cursor.needs_seek(5));
    }

    #[test]
    fn jumping_ahead_or_back_seeks() {
        let mut cursor = ReadCursor::start();
        assert!(cursor.needs_seek(5));
        cursor.advanced(5);
        assert!(!cursor.needs_seek(6));
        assert!(cursor.needs_seek(20));
        assert!(cursor.needs_seek(3));
    }

    #[test]
    fn failed_read_forces_a_seek() {
        let mut cursor = ReadCursor::start();
        cursor.advanced(0);
        cursor.lost();
        assert!(cursor.needs_seek(1));
        assert!(cursor.needs_seek(0));
    }

    #[test]
    fn last_representable_frame_leaves_cursor_unknown() {
        let mut cursor = ReadCursor::start();
        cursor.advanced(u64::MAX);
        assert!(cursor.needs_seek(0));
        assert_eq!(cursor.next, None);
    }
}

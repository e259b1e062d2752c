// THEORY:
// The `frame` module defines the one capability the rest of the engine needs from
// the outside world: "give me frame number N." Video decoding, seeking and file
// access all live behind the `FrameSource` trait so that the mapper never has to
// know whether frames come from a stateful sequential decoder, a random-access
// image directory, or a vector of synthetic images built by a test.
//
// Key architectural principles:
// 1.  **Capability Interface**: `FrameSource` exposes exactly two operations,
//     `total_frame_count` and `frame`. `frame` takes `&mut self` so that an
//     implementation is free to keep a decoder cursor and only seek when the
//     requested frame is not the next one in line.
// 2.  **Recoverable Failures**: A frame that cannot be produced is reported as a
//     `FrameError`, never as a panic. End-of-stream and decode failures are both
//     per-frame conditions; the caller decides to skip them.
// 3.  **Frames Are Transient**: A `Frame` is an owned `RgbImage` handed to the caller
//     for the duration of one analysis and dropped afterwards.

use crate::error::MapperError;
use image::RgbImage;
use std::path::{Path, PathBuf};

/// A single decoded video frame: a 2D grid of 8-bit RGB samples.
pub type Frame = RgbImage;

/// Per-frame failures. Neither variant aborts a mapping run.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("end of stream reached at frame {0}")]
    EndOfStream(u64),
    #[error("failed to decode frame {frame}: {reason}")]
    Decode { frame: u64, reason: String },
}

/// Anything that can hand out frames by their 0-based, contiguous frame number.
pub trait FrameSource {
    /// The number of frames the source claims to hold.
    fn total_frame_count(&self) -> u64;

    /// Produces frame `frame_number`, or the reason it could not be produced.
    fn frame(&mut self, frame_number: u64) -> Result<Frame, FrameError>;
}

/// Frames held in memory. A `None` slot behaves like a frame that fails to decode.
#[derive(Debug, Clone, Default)]
pub struct MemoryFrameSource {
    frames: Vec<Option<Frame>>,
}

impl MemoryFrameSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into_iter().map(Some).collect(),
        }
    }

    /// Appends a decodable frame.
    pub fn push(&mut self, frame: Frame) {
        self.frames.push(Some(frame));
    }

    /// Appends a slot that reports a decode failure when requested.
    pub fn push_corrupt(&mut self) {
        self.frames.push(None);
    }
}

impl FrameSource for MemoryFrameSource {
    fn total_frame_count(&self) -> u64 {
        self.frames.len() as u64
    }

    fn frame(&mut self, frame_number: u64) -> Result<Frame, FrameError> {
        match self.frames.get(frame_number as usize) {
            Some(Some(frame)) => Ok(frame.clone()),
            Some(None) => Err(FrameError::Decode {
                frame: frame_number,
                reason: "corrupt frame slot".to_string(),
            }),
            None => Err(FrameError::EndOfStream(frame_number)),
        }
    }
}

/// A directory of still images treated as consecutive frames, ordered by file name.
/// Files are decoded lazily, one per request.
#[derive(Debug, Clone)]
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
}

impl ImageSequenceSource {
    /// Lists the image files in `dir`. A missing, unreadable or image-less
    /// directory is fatal.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, MapperError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| MapperError::SourceOpen {
            source_path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_image_file(p))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(MapperError::SourceOpen {
                source_path: dir.to_path_buf(),
                reason: "directory contains no image files".to_string(),
            });
        }

        log::debug!("Opened image sequence {} ({} frames)", dir.display(), paths.len());
        Ok(Self { paths })
    }
}

impl FrameSource for ImageSequenceSource {
    fn total_frame_count(&self) -> u64 {
        self.paths.len() as u64
    }

    fn frame(&mut self, frame_number: u64) -> Result<Frame, FrameError> {
        let Some(path) = self.paths.get(frame_number as usize) else {
            return Err(FrameError::EndOfStream(frame_number));
        };
        image::open(path)
            .map(|img| img.to_rgb8())
            .map_err(|e| FrameError::Decode {
                frame: frame_number,
                reason: format!("{}: {e}", path.display()),
            })
    }
}

fn is_image_file(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    matches!(
        ext.to_ascii_lowercase().as_str(),
        "png" | "jpg" | "jpeg" | "bmp" | "tif" | "tiff" | "webp"
    )
}

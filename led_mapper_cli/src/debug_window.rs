use image::RgbImage;
use led_mapper::{DebugSink, MapperError};
use opencv::{
    core::{self, Mat, Scalar},
    highgui, imgproc,
    prelude::*,
};

pub const WINDOW_NAME: &str = "Thresholded + Contours";

/// Shows each overlay in a HighGUI window while the mapper runs.
pub struct HighGuiDebugSink {
    window: String,
}

impl HighGuiDebugSink {
    pub fn new(window: &str) -> Self {
        Self {
            window: window.to_string(),
        }
    }

    fn render(&self, overlay: &RgbImage) -> opencv::Result<()> {
        let (width, height) = overlay.dimensions();
        let mut rgb = Mat::new_size_with_default(
            core::Size::new(width as i32, height as i32),
            core::CV_8UC3,
            Scalar::all(0.0),
        )?;
        rgb.data_bytes_mut()?.copy_from_slice(overlay.as_raw());

        let mut bgr = Mat::default();
        imgproc::cvt_color(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
        highgui::imshow(&self.window, &bgr)?;
        highgui::wait_key(1)?;
        Ok(())
    }
}

impl DebugSink for HighGuiDebugSink {
    fn show(&mut self, _frame_number: u64, overlay: &RgbImage) -> Result<(), MapperError> {
        self.render(overlay)
            .map_err(|e| MapperError::DebugSink(e.to_string()))
    }
}

impl Drop for HighGuiDebugSink {
    fn drop(&mut self) {
        let _ = highgui::destroy_window(&self.window);
    }
}

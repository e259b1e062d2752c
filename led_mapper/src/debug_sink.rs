use crate::error::MapperError;
use crate::pipeline::DebugSink;
use image::RgbImage;
use std::path::{Path, PathBuf};

/// Saves every overlay as `overlay_<frame>.png` in a directory, for headless runs
/// where no window can be opened.
#[derive(Debug, Clone)]
pub struct DirectoryDebugSink {
    dir: PathBuf,
}

impl DirectoryDebugSink {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, MapperError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, frame_number: u64) -> PathBuf {
        self.dir.join(format!("overlay_{frame_number:06}.png"))
    }
}

impl DebugSink for DirectoryDebugSink {
    fn show(&mut self, frame_number: u64, overlay: &RgbImage) -> Result<(), MapperError> {
        overlay.save(self.path_for(frame_number))?;
        Ok(())
    }
}

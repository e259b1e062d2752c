use std::path::PathBuf;

/// Errors that abort a mapping run or one of its setup steps.
///
/// Missing frames and LEDs without a reliable position are not errors; they are
/// reported through `FrameError` and `LedStatus` respectively.
#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    #[error("cannot open frame source {}: {reason}", source_path.display())]
    SourceOpen { source_path: PathBuf, reason: String },
    #[error("invalid mapper configuration: {0}")]
    InvalidConfig(String),
    #[error("debug sink failed: {0}")]
    DebugSink(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

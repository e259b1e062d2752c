// THEORY:
// This file is the main entry point for the `led_mapper` library crate. It exposes
// the `LedMapper` driver and its data structures (`MapperConfig`, `LedRecord`,
// `MappingReport`) as the high-level interface, together with the two seams a host
// application plugs into: `FrameSource` for frames in, `RowSink` for records out.
//
// The per-frame detection (`blob_locator`), the temporal windowing (`window`) and
// the outlier rejection (`point_cloud`) live in `core_modules` and can be used on
// their own, but most callers only need what is re-exported here.

pub mod core_modules;
pub mod debug_sink;
pub mod error;
pub mod pipeline;
pub mod record_sink;

pub use crate::core_modules::blob_locator::blob_locator::{Blob, BlobScan, locate};
pub use crate::core_modules::frame::{Frame, FrameError, FrameSource, ImageSequenceSource, MemoryFrameSource};
pub use crate::core_modules::point_cloud::{Centroid, PointCloud, Reduction};
pub use crate::core_modules::window::FrameWindow;
pub use crate::debug_sink::DirectoryDebugSink;
pub use crate::error::MapperError;
pub use crate::pipeline::{DebugSink, LedMapper, LedRecord, LedStatus, MapperConfig, MappingReport};
pub use crate::record_sink::{CsvSink, RowSink};

// THEORY:
// The `pipeline` module is the top-level API of the mapping engine. `LedMapper`
// walks the LED string in index order, and for each LED:
//
// Stage 1: derives the LED's frame window from its index,
// Stage 2: pulls each frame of the window from the `FrameSource` and runs the
//          `BlobLocator` on it, collecting centroids into a `PointCloud`,
// Stage 3: reduces the cloud to one coordinate or a sentinel outcome.
//
// Exactly one `LedRecord` is produced per LED, in ascending index order. A frame that
// cannot be decoded is skipped; an LED with no reliable position gets the (-1, -1)
// sentinel plus a `notfound`/`unstable` status. Neither aborts the run. The only
// state carried from one LED to the next is the growing list of records, so a caller
// may stop the sweep between LEDs without corrupting what was already produced.

use crate::core_modules::blob_locator::blob_locator;
use crate::core_modules::frame::{Frame, FrameError, FrameSource};
use crate::core_modules::point_cloud::{Centroid, PointCloud, Reduction};
use crate::core_modules::window::{FrameWindow, frames_per_led};
use crate::error::MapperError;
use image::RgbImage;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

const DEFAULT_LED_COUNT: usize = 329;
const DEFAULT_FPS: f64 = 30.0;
const DEFAULT_SECONDS_PER_LED: f64 = 0.5;
const DEFAULT_MARGIN_FRAMES: u64 = 5;
const DEFAULT_BRIGHTNESS_THRESHOLD: u8 = 220;
const DEFAULT_MIN_BLOB_AREA: usize = 20;

/// Coordinate written for an LED whose position could not be determined.
pub const SENTINEL: i32 = -1;

/// Tunable parameters of a mapping run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Number of LEDs in the string; LEDs are mapped as indices `0..led_count`.
    pub led_count: usize,
    /// Frame rate of the capture.
    pub fps: f64,
    /// How long each LED stays lit.
    pub seconds_per_led: f64,
    /// Frames skipped at both ends of each LED's slot.
    pub margin_frames: u64,
    /// Minimum luma (0-255) for a pixel to count as lit.
    pub brightness_threshold: u8,
    /// Minimum pixel area for a region to be considered an LED.
    pub min_blob_area: usize,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            led_count: DEFAULT_LED_COUNT,
            fps: DEFAULT_FPS,
            seconds_per_led: DEFAULT_SECONDS_PER_LED,
            margin_frames: DEFAULT_MARGIN_FRAMES,
            brightness_threshold: DEFAULT_BRIGHTNESS_THRESHOLD,
            min_blob_area: DEFAULT_MIN_BLOB_AREA,
        }
    }
}

impl MapperConfig {
    /// Frames per LED slot, `round(fps * seconds_per_led)`.
    pub fn frames_per_led(&self) -> u64 {
        frames_per_led(self.fps, self.seconds_per_led)
    }

    /// Rejects capture timings that are not positive numbers. Timings whose windows
    /// come out empty are accepted; every LED then maps to `notfound`.
    pub fn validate(&self) -> Result<(), MapperError> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(MapperError::InvalidConfig(format!(
                "fps must be a positive number, got {}",
                self.fps
            )));
        }
        if !(self.seconds_per_led.is_finite() && self.seconds_per_led > 0.0) {
            return Err(MapperError::InvalidConfig(format!(
                "seconds_per_led must be a positive number, got {}",
                self.seconds_per_led
            )));
        }
        Ok(())
    }
}

/// Why an LED ended up with the coordinate it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedStatus {
    Located,
    /// No frame of the window contained a qualifying blob.
    NotFound,
    /// Every detection was rejected as an outlier.
    Unstable,
}

impl LedStatus {
    /// Short tag used in logs and in the optional CSV status column.
    pub fn tag(&self) -> &'static str {
        match self {
            LedStatus::Located => "ok",
            LedStatus::NotFound => "notfound",
            LedStatus::Unstable => "unstable",
        }
    }
}

/// The mapped position of one LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedRecord {
    pub led_index: usize,
    pub x: i32,
    pub y: i32,
    pub status: LedStatus,
}

impl LedRecord {
    pub fn located(led_index: usize, position: Centroid) -> Self {
        Self {
            led_index,
            x: position.x,
            y: position.y,
            status: LedStatus::Located,
        }
    }

    pub fn sentinel(led_index: usize, status: LedStatus) -> Self {
        Self {
            led_index,
            x: SENTINEL,
            y: SENTINEL,
            status,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.x == SENTINEL && self.y == SENTINEL
    }

    pub fn position(&self) -> Option<Centroid> {
        match self.status {
            LedStatus::Located => Some(Centroid::new(self.x, self.y)),
            _ => None,
        }
    }
}

/// Receives an annotated copy of every analysed frame. Purely observational: a
/// failing sink is logged and never changes the mapping result.
pub trait DebugSink {
    fn show(&mut self, frame_number: u64, overlay: &RgbImage) -> Result<(), MapperError>;
}

/// The output of a sweep over the LED string.
#[derive(Debug, Clone, Default)]
pub struct MappingReport {
    /// One record per mapped LED, in ascending index order.
    pub records: Vec<LedRecord>,
    /// True when the sweep was stopped before the last LED.
    pub interrupted: bool,
}

impl MappingReport {
    pub fn located(&self) -> usize {
        self.count(LedStatus::Located)
    }

    pub fn not_found(&self) -> usize {
        self.count(LedStatus::NotFound)
    }

    pub fn unstable(&self) -> usize {
        self.count(LedStatus::Unstable)
    }

    fn count(&self, status: LedStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }
}

/// Drives the whole mapping process over a `FrameSource`.
pub struct LedMapper {
    config: MapperConfig,
    frames_per_led: u64,
    debug_sink: Option<Box<dyn DebugSink>>,
}

impl LedMapper {
    pub fn new(config: MapperConfig) -> Result<Self, MapperError> {
        config.validate()?;
        let frames_per_led = config.frames_per_led();
        if config.margin_frames.saturating_mul(2) >= frames_per_led {
            warn!(
                "A margin of {} frames leaves nothing of a {frames_per_led}-frame LED slot; \
                 every LED will be reported {}",
                config.margin_frames,
                LedStatus::NotFound.tag()
            );
        }
        Ok(Self {
            frames_per_led,
            config,
            debug_sink: None,
        })
    }

    /// Attaches a sink that receives a diagnostic overlay for every decoded frame.
    pub fn with_debug_sink(mut self, sink: Box<dyn DebugSink>) -> Self {
        self.debug_sink = Some(sink);
        self
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn frames_per_led(&self) -> u64 {
        self.frames_per_led
    }

    /// The frames analysed for `led_index`.
    pub fn window(&self, led_index: usize) -> FrameWindow {
        FrameWindow::for_led(led_index, self.frames_per_led, self.config.margin_frames)
    }

    /// Maps every LED of the string.
    pub fn run<S: FrameSource + ?Sized>(&mut self, source: &mut S) -> MappingReport {
        self.run_until(source, &AtomicBool::new(false))
    }

    /// Maps LEDs in order until done or until `stop` is raised. The flag is only
    /// checked between LEDs, so every returned record is complete.
    pub fn run_until<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
        stop: &AtomicBool,
    ) -> MappingReport {
        let led_count = self.config.led_count;
        let total_frames = source.total_frame_count();
        let required_frames = (led_count as u64).saturating_mul(self.frames_per_led);
        info!(
            "Mapping {led_count} LEDs from {total_frames} frames ({} frames per LED)",
            self.frames_per_led
        );
        if required_frames > total_frames {
            warn!(
                "Source holds {total_frames} frames but {led_count} LEDs need {required_frames}; \
                 trailing LEDs will not be found"
            );
        }

        let mut report = MappingReport {
            records: Vec::with_capacity(led_count),
            interrupted: false,
        };

        for led_index in 0..led_count {
            if stop.load(Ordering::Relaxed) {
                warn!("Mapping interrupted after {led_index} of {led_count} LEDs");
                report.interrupted = true;
                return report;
            }
            report.records.push(self.map_led(source, led_index));
        }

        info!(
            "Mapping complete: {} located, {} not found, {} unstable",
            report.located(),
            report.not_found(),
            report.unstable()
        );
        report
    }

    /// Maps a single LED from its frame window.
    pub fn map_led<S: FrameSource + ?Sized>(&mut self, source: &mut S, led_index: usize) -> LedRecord {
        info!("Mapping LED {led_index}...");

        // --- Stage 1: Windowing ---
        let window = self.window(led_index);
        debug!("LED {led_index}: frames {}..{}", window.start, window.end);

        // --- Stage 2: Per-frame detection ---
        let cloud = self.collect_detections(source, &window);

        // --- Stage 3: Reduction ---
        match cloud.reduce() {
            Reduction::Located { position, inliers } => {
                debug!(
                    "LED {led_index}: ({}, {}) from {inliers} of {} detections",
                    position.x,
                    position.y,
                    cloud.len()
                );
                LedRecord::located(led_index, position)
            }
            Reduction::NotFound => {
                warn!("LED {led_index}: {}", LedStatus::NotFound.tag());
                LedRecord::sentinel(led_index, LedStatus::NotFound)
            }
            Reduction::Unstable { rejected } => {
                warn!(
                    "LED {led_index}: {} ({rejected} detections rejected)",
                    LedStatus::Unstable.tag()
                );
                LedRecord::sentinel(led_index, LedStatus::Unstable)
            }
        }
    }

    fn collect_detections<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
        window: &FrameWindow,
    ) -> PointCloud {
        let mut cloud = PointCloud::new();
        let total_frames = source.total_frame_count();
        for frame_number in window.frames() {
            let frame = match source.frame(frame_number) {
                Ok(frame) => frame,
                // Past the reported length nothing later in the window exists either.
                Err(e @ FrameError::EndOfStream(_)) if frame_number >= total_frames => {
                    debug!("Leaving window early: {e}");
                    break;
                }
                Err(e) => {
                    debug!("Skipping frame: {e}");
                    continue;
                }
            };
            if let Some(centroid) = self.detect(frame_number, &frame) {
                cloud.push(centroid);
            }
        }
        cloud
    }

    fn detect(&mut self, frame_number: u64, frame: &Frame) -> Option<Centroid> {
        let scan = blob_locator::scan(frame, self.config.brightness_threshold);
        let best = scan.best(self.config.min_blob_area);

        if let Some(sink) = self.debug_sink.as_mut() {
            let overlay = scan.render_overlay(frame, best);
            if let Err(e) = sink.show(frame_number, &overlay) {
                warn!("Debug overlay for frame {frame_number} failed: {e}");
            }
        }

        best.map(|blob| blob.centroid)
    }
}

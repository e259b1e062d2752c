mod debug_window;
mod settings;
mod video;

use anyhow::Context;
use clap::Parser;
use led_mapper::{
    CsvSink, DirectoryDebugSink, FrameSource, ImageSequenceSource, LedMapper, RowSink,
};
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::debug_window::{HighGuiDebugSink, WINDOW_NAME};
use crate::settings::{Cli, Settings};
use crate::video::OpenCvFrameSource;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // --- 1. Argument Parsing & Setup ---
    let cli = Cli::parse();
    let settings = Settings::resolve(&cli)?;
    let input = settings
        .video_path
        .clone()
        .context("no input given: pass a video file or frame directory, or set video_path")?;

    // --- 2. Frame Source ---
    let mut source = open_source(&input, settings.mapper.fps)?;

    // --- 3. Mapper Initialization ---
    let mut mapper = LedMapper::new(settings.mapper.clone())?;
    if settings.debug_visuals {
        mapper = mapper.with_debug_sink(Box::new(HighGuiDebugSink::new(WINDOW_NAME)));
    } else if let Some(dir) = &settings.debug_dir {
        mapper = mapper.with_debug_sink(Box::new(DirectoryDebugSink::new(dir)?));
    }

    // --- 4. Interrupt Handling ---
    // Ctrl-C raises the stop flag; the mapper finishes the LED it is on and returns.
    let stop = Arc::new(AtomicBool::new(false));
    let runtime = tokio::runtime::Runtime::new().context("starting signal runtime")?;
    let flag = Arc::clone(&stop);
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current LED");
            flag.store(true, Ordering::Relaxed);
        }
    });

    // --- 5. Mapping ---
    let report = mapper.run_until(source.as_mut(), &stop);
    drop(mapper);
    runtime.shutdown_background();

    // --- 6. Output ---
    let mut sink = CsvSink::create(&settings.output_path, settings.status_column)
        .with_context(|| format!("creating {}", settings.output_path.display()))?;
    sink.write_records(&report.records)
        .with_context(|| format!("writing {}", settings.output_path.display()))?;

    if report.interrupted {
        warn!(
            "Partial mapping: {} of {} LEDs saved to {}",
            report.records.len(),
            settings.mapper.led_count,
            settings.output_path.display()
        );
    } else {
        info!("Mapping complete. Saved to {}", settings.output_path.display());
    }
    Ok(())
}

fn open_source(input: &Path, configured_fps: f64) -> anyhow::Result<Box<dyn FrameSource>> {
    if input.is_dir() {
        return Ok(Box::new(ImageSequenceSource::open(input)?));
    }

    let video = OpenCvFrameSource::open(input)?;
    if video.fps() > 0.0 && (video.fps() - configured_fps).abs() > 0.01 {
        warn!(
            "Video reports {:.2} fps but mapping assumes {configured_fps}; windows may drift",
            video.fps()
        );
    }
    Ok(Box::new(video))
}

use anyhow::Context;
use clap::Parser;
use led_mapper::MapperConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_OUTPUT_PATH: &str = "led_coordinates.csv";

#[derive(Parser, Debug, Default)]
#[command(
    name = "led_mapper_cli",
    about = "Find the pixel position of every LED in a one-LED-at-a-time capture",
    version
)]
pub struct Cli {
    /// Video file, or a directory of frame images
    pub input: Option<PathBuf>,

    /// Destination CSV (default: led_coordinates.csv)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// JSON settings file; command-line flags take precedence
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Number of LEDs in the string
    #[arg(long = "leds")]
    pub led_count: Option<usize>,

    /// Frame rate of the capture
    #[arg(long)]
    pub fps: Option<f64>,

    /// How long each LED stays lit, in seconds
    #[arg(long)]
    pub seconds_per_led: Option<f64>,

    /// Frames skipped at each end of an LED's slot
    #[arg(long = "margin")]
    pub margin_frames: Option<u64>,

    /// Minimum luma (0-255) for a pixel to count as lit
    #[arg(long = "threshold")]
    pub brightness_threshold: Option<u8>,

    /// Minimum blob area in pixels
    #[arg(long = "min-area")]
    pub min_blob_area: Option<usize>,

    /// Show every analysed frame with the detected blob highlighted
    #[arg(long, conflicts_with = "debug_dir")]
    pub debug_visuals: bool,

    /// Save every analysed frame's overlay as PNG into this directory
    #[arg(long)]
    pub debug_dir: Option<PathBuf>,

    /// Add a status column (ok/notfound/unstable) to the CSV
    #[arg(long)]
    pub status_column: bool,
}

/// Everything a run needs, merged from the settings file and the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub video_path: Option<PathBuf>,
    pub output_path: PathBuf,
    pub debug_visuals: bool,
    pub debug_dir: Option<PathBuf>,
    pub status_column: bool,
    #[serde(flatten)]
    pub mapper: MapperConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            video_path: None,
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            debug_visuals: false,
            debug_dir: None,
            status_column: false,
            mapper: MapperConfig::default(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing settings file {}", path.display()))
    }

    /// Settings file (if any) first, then every flag given on the command line.
    pub fn resolve(cli: &Cli) -> anyhow::Result<Self> {
        let mut settings = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        settings.apply(cli);
        Ok(settings)
    }

    fn apply(&mut self, cli: &Cli) {
        if let Some(input) = &cli.input {
            self.video_path = Some(input.clone());
        }
        if let Some(output) = &cli.output {
            self.output_path = output.clone();
        }
        if let Some(dir) = &cli.debug_dir {
            self.debug_dir = Some(dir.clone());
            self.debug_visuals = false;
        }
        self.debug_visuals |= cli.debug_visuals;
        self.status_column |= cli.status_column;

        let mapper = &mut self.mapper;
        if let Some(v) = cli.led_count {
            mapper.led_count = v;
        }
        if let Some(v) = cli.fps {
            mapper.fps = v;
        }
        if let Some(v) = cli.seconds_per_led {
            mapper.seconds_per_led = v;
        }
        if let Some(v) = cli.margin_frames {
            mapper.margin_frames = v;
        }
        if let Some(v) = cli.brightness_threshold {
            mapper.brightness_threshold = v;
        }
        if let Some(v) = cli.min_blob_area {
            mapper.min_blob_area = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file_or_flags() {
        let cli = Cli::try_parse_from(["led_mapper_cli"]).unwrap();
        let settings = Settings::resolve(&cli).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.output_path, PathBuf::from("led_coordinates.csv"));
        assert_eq!(settings.mapper.led_count, 329);
    }

    #[test]
    fn flags_override_file_values() {
        let mut settings: Settings = serde_json::from_str(
            r#"{
                "video_path": "capture.mp4",
                "output_path": "from_file.csv",
                "led_count": 50,
                "fps": 60.0,
                "brightness_threshold": 180
            }"#,
        )
        .unwrap();
        assert_eq!(settings.mapper.seconds_per_led, 0.5);

        let cli = Cli::try_parse_from([
            "led_mapper_cli",
            "other.mp4",
            "--leds",
            "64",
            "--threshold",
            "240",
            "--status-column",
        ])
        .unwrap();
        settings.apply(&cli);

        assert_eq!(settings.video_path, Some(PathBuf::from("other.mp4")));
        assert_eq!(settings.output_path, PathBuf::from("from_file.csv"));
        assert_eq!(settings.mapper.led_count, 64);
        assert_eq!(settings.mapper.fps, 60.0);
        assert_eq!(settings.mapper.brightness_threshold, 240);
        assert!(settings.status_column);
    }

    #[test]
    fn debug_window_and_directory_are_exclusive() {
        let result = Cli::try_parse_from([
            "led_mapper_cli",
            "capture.mp4",
            "--debug-visuals",
            "--debug-dir",
            "overlays",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn missing_settings_file_is_reported() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/led_settings.json")),
            ..Cli::default()
        };
        let err = Settings::resolve(&cli).unwrap_err();
        assert!(err.to_string().contains("reading settings file"));
    }
}

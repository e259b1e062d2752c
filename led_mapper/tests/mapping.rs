use image::{Rgb, RgbImage};
use led_mapper::{CsvSink, ImageSequenceSource, LedMapper, LedStatus, MapperConfig, MapperError, RowSink};
use std::path::PathBuf;

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("led_mapper_{name}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("scratch directory");
    dir
}

/// An LED seen as a slightly soft 7x7 glow: a 5x5 saturated core in a dimmer halo.
fn glow(x: u32, y: u32) -> RgbImage {
    let mut frame = RgbImage::new(WIDTH, HEIGHT);
    for py in y - 3..=y + 3 {
        for px in x - 3..=x + 3 {
            frame.put_pixel(px, py, Rgb([120, 110, 100]));
        }
    }
    for py in y - 2..=y + 2 {
        for px in x - 2..=x + 2 {
            frame.put_pixel(px, py, Rgb([255, 250, 240]));
        }
    }
    frame
}

#[test]
fn maps_a_frame_directory_to_csv() {
    let _ = env_logger::builder().is_test(true).try_init();

    let frames_dir = scratch_dir("frames");
    // 6 frames per LED; LED 2 never lights up.
    let leds = [Some((10, 10)), Some((50, 12)), None, Some((30, 40))];
    let mut frame_number = 0;
    for led in leds {
        for _ in 0..6 {
            let frame = match led {
                Some((x, y)) => glow(x, y),
                None => RgbImage::new(WIDTH, HEIGHT),
            };
            frame
                .save(frames_dir.join(format!("frame_{frame_number:05}.png")))
                .expect("write frame");
            frame_number += 1;
        }
    }

    let config = MapperConfig {
        led_count: leds.len(),
        fps: 12.0,
        seconds_per_led: 0.5,
        margin_frames: 1,
        brightness_threshold: 200,
        min_blob_area: 9,
    };
    let mut source = ImageSequenceSource::open(&frames_dir).expect("open frames");
    let mut mapper = LedMapper::new(config).expect("valid config");
    let report = mapper.run(&mut source);

    assert_eq!(report.records.len(), 4);
    assert_eq!(report.records[2].status, LedStatus::NotFound);

    let out_dir = scratch_dir("csv");
    let csv_path = out_dir.join("nested").join("led_coordinates.csv");
    let mut sink = CsvSink::create(&csv_path, false).expect("create csv");
    sink.write_records(&report.records).expect("write csv");
    drop(sink);

    let written = std::fs::read_to_string(&csv_path).expect("read csv");
    assert_eq!(written, "LED_index,x,y\n0,10,10\n1,50,12\n2,-1,-1\n3,30,40\n");

    std::fs::remove_dir_all(&frames_dir).ok();
    std::fs::remove_dir_all(&out_dir).ok();
}

#[test]
fn empty_frame_directory_is_fatal() {
    let dir = scratch_dir("empty");
    let result = ImageSequenceSource::open(&dir);
    assert!(matches!(result, Err(MapperError::SourceOpen { .. })));
    std::fs::remove_dir_all(&dir).ok();
}

// THEORY:
// The `BlobLocator` is the engine of the per-frame detection layer. Given one frame
// in which (ideally) a single LED is lit, it answers one question: where is the
// biggest bright thing?
//
// Algorithm steps:
// 1.  **Intensity**: The RGB frame is reduced to a single BT.601 luma channel,
//     computed in 14-bit fixed point with round-half-up so thresholds tuned
//     against OpenCV's BGR2GRAY select the same pixels.
// 2.  **Binarization**: Every pixel whose luma reaches the brightness threshold is
//     foreground. Pure black (luma 0) is never foreground, so a threshold of 0
//     cannot turn an unlit frame into one giant blob.
// 3.  **External Regions**: Holes are filled before labelling. Background pixels that
//     cannot reach the image border through 4-connected background belong to the
//     region that encloses them. The filled mask is then labelled with
//     8-connectivity, which makes every label an "external" region: a halo around a
//     saturated LED core counts as one blob, not a ring plus an island.
// 4.  **Selection**: Among regions whose area reaches `min_area`, the largest wins.
//     Equal areas are resolved in favour of the lowest label, i.e. whichever region
//     the labelling pass numbered first. That order is an implementation detail of
//     the labeller and callers must not rely on it.
// 5.  **Stateless Utility**: Nothing is remembered between frames. Absence of a
//     qualifying blob is a normal `None`, never an error.

use crate::core_modules::frame::Frame;
use crate::core_modules::point_cloud::Centroid;
use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use imageproc::region_labelling::{Connectivity, connected_components};

pub mod blob_locator {
    use super::*;

    /// Per-pixel region labels; 0 is background, regions are numbered from 1.
    pub type LabelMap = ImageBuffer<Luma<u32>, Vec<u32>>;

    const FOREGROUND: Luma<u8> = Luma([255]);
    const BACKGROUND: Luma<u8> = Luma([0]);
    const OUTLINE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
    const MARKER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
    const MARKER_RADIUS: i32 = 4;

    const LUMA_SHIFT: u32 = 14;
    const LUMA_R: u32 = 4899;
    const LUMA_G: u32 = 9617;
    const LUMA_B: u32 = 1868;

    /// Inclusive pixel bounding box of a region.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Bounds {
        pub min_x: u32,
        pub min_y: u32,
        pub max_x: u32,
        pub max_y: u32,
    }

    /// A connected bright region found in one frame.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Blob {
        /// The region's label in the scan's `LabelMap`.
        pub label: u32,
        /// Pixel count of the region, holes included.
        pub area: usize,
        /// Mean pixel position, truncated toward zero.
        pub centroid: Centroid,
        pub bounds: Bounds,
    }

    /// Every external bright region of one frame, in label order.
    #[derive(Debug, Clone)]
    pub struct BlobScan {
        labels: LabelMap,
        blobs: Vec<Blob>,
    }

    impl BlobScan {
        pub fn blobs(&self) -> &[Blob] {
            &self.blobs
        }

        pub fn labels(&self) -> &LabelMap {
            &self.labels
        }

        /// The largest blob with `area >= min_area`. Ties keep the first in label order.
        pub fn best(&self, min_area: usize) -> Option<&Blob> {
            let mut best: Option<&Blob> = None;
            for blob in &self.blobs {
                if blob.area < min_area {
                    continue;
                }
                if best.is_none_or(|current| blob.area > current.area) {
                    best = Some(blob);
                }
            }
            best
        }

        /// Draws the outline of `blob` and a marker on its centroid over a copy of
        /// `frame`. The frame itself is left untouched.
        pub fn render_overlay(&self, frame: &Frame, blob: Option<&Blob>) -> RgbImage {
            let mut canvas = frame.clone();
            let Some(blob) = blob else {
                return canvas;
            };

            let (width, height) = self.labels.dimensions();
            let label_at = |x: i64, y: i64| -> u32 {
                if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                    0
                } else {
                    self.labels.get_pixel(x as u32, y as u32)[0]
                }
            };

            for y in blob.bounds.min_y..=blob.bounds.max_y {
                for x in blob.bounds.min_x..=blob.bounds.max_x {
                    if self.labels.get_pixel(x, y)[0] != blob.label {
                        continue;
                    }
                    let (xi, yi) = (x as i64, y as i64);
                    let on_edge = [(0, 1), (0, -1), (1, 0), (-1, 0)]
                        .iter()
                        .any(|(dx, dy)| label_at(xi + dx, yi + dy) != blob.label);
                    if on_edge && x < canvas.width() && y < canvas.height() {
                        canvas.put_pixel(x, y, OUTLINE_COLOR);
                    }
                }
            }

            draw_filled_circle_mut(
                &mut canvas,
                (blob.centroid.x, blob.centroid.y),
                MARKER_RADIUS,
                MARKER_COLOR,
            );
            canvas
        }
    }

    /// The detection contract: centroid of the largest bright region of at least
    /// `min_area` pixels, or `None`.
    pub fn locate(frame: &Frame, brightness_threshold: u8, min_area: usize) -> Option<Centroid> {
        scan(frame, brightness_threshold)
            .best(min_area)
            .map(|blob| blob.centroid)
    }

    /// Runs steps 1-3 and measures every region.
    pub fn scan(frame: &Frame, brightness_threshold: u8) -> BlobScan {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return BlobScan {
                labels: LabelMap::new(width, height),
                blobs: Vec::new(),
            };
        }

        // --- 1. Intensity ---
        let gray = luma(frame);

        // --- 2. Binarization ---
        let mask = binarize(&gray, brightness_threshold);

        // --- 3. External Regions ---
        let filled = fill_holes(&mask);
        let labels = connected_components(&filled, Connectivity::Eight, BACKGROUND);
        let blobs = measure_blobs(&labels);

        BlobScan { labels, blobs }
    }

    /// BT.601 luma: `0.299 R + 0.587 G + 0.114 B`, rounded.
    fn luma(frame: &Frame) -> GrayImage {
        GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
            let Rgb([r, g, b]) = *frame.get_pixel(x, y);
            let weighted = r as u32 * LUMA_R + g as u32 * LUMA_G + b as u32 * LUMA_B;
            Luma([((weighted + (1 << (LUMA_SHIFT - 1))) >> LUMA_SHIFT) as u8])
        })
    }

    fn binarize(gray: &GrayImage, threshold: u8) -> GrayImage {
        let cutoff = threshold.max(1);
        GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            if gray.get_pixel(x, y)[0] >= cutoff {
                FOREGROUND
            } else {
                BACKGROUND
            }
        })
    }

    /// Marks every background pixel that is not 4-connected to the border as foreground.
    fn fill_holes(mask: &GrayImage) -> GrayImage {
        let (width, height) = mask.dimensions();
        let inverted = GrayImage::from_fn(width, height, |x, y| {
            if mask.get_pixel(x, y)[0] == 0 {
                FOREGROUND
            } else {
                BACKGROUND
            }
        });
        let background = connected_components(&inverted, Connectivity::Four, BACKGROUND);

        let max_label = background.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
        let mut outside = vec![false; max_label + 1];
        let mut mark = |x: u32, y: u32| {
            let label = background.get_pixel(x, y)[0] as usize;
            if label != 0 {
                outside[label] = true;
            }
        };
        for x in 0..width {
            mark(x, 0);
            mark(x, height - 1);
        }
        for y in 0..height {
            mark(0, y);
            mark(width - 1, y);
        }

        GrayImage::from_fn(width, height, |x, y| {
            let label = background.get_pixel(x, y)[0] as usize;
            if label != 0 && outside[label] {
                BACKGROUND
            } else {
                FOREGROUND
            }
        })
    }

    #[derive(Default)]
    struct RegionAccumulator {
        area: u64,
        sum_x: u64,
        sum_y: u64,
        min_x: u32,
        min_y: u32,
        max_x: u32,
        max_y: u32,
    }

    impl RegionAccumulator {
        fn add(&mut self, x: u32, y: u32) {
            if self.area == 0 {
                self.min_x = x;
                self.min_y = y;
                self.max_x = x;
                self.max_y = y;
            } else {
                self.min_x = self.min_x.min(x);
                self.min_y = self.min_y.min(y);
                self.max_x = self.max_x.max(x);
                self.max_y = self.max_y.max(y);
            }
            self.area += 1;
            self.sum_x += x as u64;
            self.sum_y += y as u64;
        }
    }

    fn measure_blobs(labels: &LabelMap) -> Vec<Blob> {
        let max_label = labels.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
        let mut regions: Vec<RegionAccumulator> = (0..max_label)
            .map(|_| RegionAccumulator::default())
            .collect();

        for (x, y, label) in labels.enumerate_pixels() {
            let label = label[0] as usize;
            if label != 0 {
                regions[label - 1].add(x, y);
            }
        }

        regions
            .into_iter()
            .enumerate()
            .filter(|(_, region)| region.area > 0)
            .map(|(i, region)| Blob {
                label: i as u32 + 1,
                area: region.area as usize,
                centroid: Centroid {
                    x: (region.sum_x / region.area) as i32,
                    y: (region.sum_y / region.area) as i32,
                },
                bounds: Bounds {
                    min_x: region.min_x,
                    min_y: region.min_y,
                    max_x: region.max_x,
                    max_y: region.max_y,
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::blob_locator::*;
    use super::*;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    fn paint_square(img: &mut RgbImage, x0: u32, y0: u32, size: u32, color: Rgb<u8>) {
        for y in y0..y0 + size {
            for x in x0..x0 + size {
                img.put_pixel(x, y, color);
            }
        }
    }

    #[test]
    fn dark_frame_has_no_blob() {
        let frame = RgbImage::new(64, 48);
        for threshold in [0u8, 1, 128, 220, 255] {
            for min_area in [0usize, 1, 20] {
                assert_eq!(locate(&frame, threshold, min_area), None);
            }
        }
    }

    #[test]
    fn single_square_centroid_is_its_center() {
        let mut frame = RgbImage::new(64, 64);
        paint_square(&mut frame, 10, 30, 11, WHITE);

        let scan = scan(&frame, 220);
        assert_eq!(scan.blobs().len(), 1);
        assert_eq!(scan.blobs()[0].area, 121);
        assert_eq!(locate(&frame, 220, 20), Some(Centroid { x: 15, y: 35 }));
    }

    #[test]
    fn larger_region_wins_regardless_of_position() {
        let mut frame = RgbImage::new(80, 80);
        paint_square(&mut frame, 2, 2, 5, WHITE);
        paint_square(&mut frame, 60, 60, 9, WHITE);
        assert_eq!(locate(&frame, 200, 1), Some(Centroid { x: 64, y: 64 }));

        let mut swapped = RgbImage::new(80, 80);
        paint_square(&mut swapped, 2, 2, 9, WHITE);
        paint_square(&mut swapped, 60, 60, 5, WHITE);
        assert_eq!(locate(&swapped, 200, 1), Some(Centroid { x: 6, y: 6 }));
    }

    #[test]
    fn even_square_centroid_truncates_toward_origin() {
        // Pixels 10..=19 and 30..=39: the exact center is (14.5, 34.5).
        let mut frame = RgbImage::new(64, 64);
        paint_square(&mut frame, 10, 30, 10, WHITE);
        assert_eq!(locate(&frame, 220, 20), Some(Centroid { x: 14, y: 34 }));
    }

    #[test]
    fn luma_uses_bt601_weights() {
        // BT.601 puts this magenta-ish pixel at 223; Rec.709 weights would give 215.
        let mut frame = RgbImage::new(40, 40);
        paint_square(&mut frame, 10, 10, 10, Rgb([255, 200, 255]));
        assert_eq!(locate(&frame, 220, 20), Some(Centroid { x: 14, y: 14 }));
        assert_eq!(locate(&frame, 224, 20), None);
    }

    #[test]
    fn regions_below_min_area_are_ignored() {
        let mut frame = RgbImage::new(32, 32);
        paint_square(&mut frame, 4, 4, 4, WHITE);
        assert_eq!(locate(&frame, 200, 17), None);
        assert_eq!(locate(&frame, 200, 16), Some(Centroid { x: 5, y: 5 }));
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut frame = RgbImage::new(20, 20);
        paint_square(&mut frame, 5, 5, 5, Rgb([200, 200, 200]));
        assert_eq!(locate(&frame, 200, 1), Some(Centroid { x: 7, y: 7 }));
        assert_eq!(locate(&frame, 201, 1), None);
    }

    #[test]
    fn enclosed_holes_count_toward_the_region() {
        // A hollow 11x11 square with a 2 pixel wall: 80 lit pixels around a 7x7 hole.
        let mut frame = RgbImage::new(40, 40);
        paint_square(&mut frame, 10, 10, 11, WHITE);
        paint_square(&mut frame, 12, 12, 7, Rgb([0, 0, 0]));

        let scan = scan(&frame, 200);
        assert_eq!(scan.blobs().len(), 1);
        assert_eq!(scan.blobs()[0].area, 121);
        assert_eq!(locate(&frame, 200, 100), Some(Centroid { x: 15, y: 15 }));
    }

    #[test]
    fn diagonal_neighbours_join_one_region() {
        let mut frame = RgbImage::new(10, 10);
        frame.put_pixel(2, 2, WHITE);
        frame.put_pixel(3, 3, WHITE);
        frame.put_pixel(4, 4, WHITE);
        let scan = scan(&frame, 200);
        assert_eq!(scan.blobs().len(), 1);
        assert_eq!(scan.blobs()[0].centroid, Centroid { x: 3, y: 3 });
    }

    #[test]
    fn equal_areas_resolve_to_one_of_the_candidates() {
        let mut frame = RgbImage::new(50, 50);
        paint_square(&mut frame, 5, 5, 5, WHITE);
        paint_square(&mut frame, 35, 35, 5, WHITE);
        let found = locate(&frame, 200, 1).expect("a blob is found");
        assert!(found == Centroid { x: 7, y: 7 } || found == Centroid { x: 37, y: 37 });
    }

    #[test]
    fn overlay_marks_centroid_without_touching_frame() {
        let mut frame = RgbImage::new(40, 40);
        paint_square(&mut frame, 10, 10, 11, WHITE);
        let scan = scan(&frame, 200);
        let blob = scan.best(1);
        let overlay = scan.render_overlay(&frame, blob);

        assert_eq!(*overlay.get_pixel(15, 15), Rgb([255, 0, 0]));
        assert_eq!(*overlay.get_pixel(10, 10), Rgb([0, 255, 0]));
        assert_eq!(*frame.get_pixel(15, 15), WHITE);
        assert_eq!(*overlay.get_pixel(0, 0), Rgb([0, 0, 0]));
    }
}

// THEORY:
// The `PointCloud` gathers every per-frame detection for a single LED and reduces
// them to one trustworthy coordinate. Most frames in an LED's window see the LED
// itself; a minority may see a reflection, sensor noise or a neighbour that has not
// fully gone dark. The reduction is a single pass of distance-based rejection:
//
// 1.  Mean position of all detections.
// 2.  Euclidean distance of each detection from that mean.
// 3.  Population standard deviation of those distances.
// 4.  Keep detections with distance <= OUTLIER_SIGMA * deviation. When every
//     detection sits at the same spot the deviation is 0 and every distance is 0,
//     so everything is kept.
// 5.  Truncated mean of the survivors.
//
// An empty cloud is `NotFound`; a cloud whose every point is rejected is
// `Unstable`. Both end up as the sentinel coordinate, but they are distinct outcomes.

/// Detections farther from the mean than this many standard deviations of the
/// distance distribution are discarded.
pub const OUTLIER_SIGMA: f64 = 1.5;

/// Integer pixel position of a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Centroid {
    pub x: i32,
    pub y: i32,
}

impl Centroid {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// The outcome of reducing one LED's detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// A stable position, averaged over `inliers` detections.
    Located { position: Centroid, inliers: usize },
    /// No frame in the window produced a detection.
    NotFound,
    /// Detections existed but all of them were rejected.
    Unstable { rejected: usize },
}

/// Ordered detections collected over one LED's frame window.
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    points: Vec<Centroid>,
}

impl PointCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: Centroid) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Centroid] {
        &self.points
    }

    /// Rejects outliers and averages what is left.
    pub fn reduce(&self) -> Reduction {
        if self.points.is_empty() {
            return Reduction::NotFound;
        }

        let count = self.points.len() as f64;
        let (mean_x, mean_y) = mean(self.points.iter());

        let distances: Vec<f64> = self
            .points
            .iter()
            .map(|p| (p.x as f64 - mean_x).hypot(p.y as f64 - mean_y))
            .collect();
        let mean_distance = distances.iter().sum::<f64>() / count;
        let variance = distances
            .iter()
            .map(|d| (d - mean_distance).powi(2))
            .sum::<f64>()
            / count;
        let cutoff = variance.sqrt() * OUTLIER_SIGMA;

        let inliers: Vec<&Centroid> = self
            .points
            .iter()
            .zip(&distances)
            .filter(|(_, d)| **d <= cutoff)
            .map(|(p, _)| p)
            .collect();

        if inliers.is_empty() {
            return Reduction::Unstable {
                rejected: self.points.len(),
            };
        }

        let (x, y) = mean(inliers.iter().copied());
        Reduction::Located {
            position: Centroid::new(x as i32, y as i32),
            inliers: inliers.len(),
        }
    }
}

impl FromIterator<Centroid> for PointCloud {
    fn from_iter<T: IntoIterator<Item = Centroid>>(iter: T) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

fn mean<'a>(points: impl Iterator<Item = &'a Centroid>) -> (f64, f64) {
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut count = 0usize;
    for p in points {
        sum_x += p.x as f64;
        sum_y += p.y as f64;
        count += 1;
    }
    (sum_x / count as f64, sum_y / count as f64)
}

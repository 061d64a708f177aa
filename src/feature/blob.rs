//! Dark blob detection over a series of binary thresholds.
//!
//! Each threshold yields candidate regions (outer contours of the dark
//! pixels) that pass through the enabled shape filters. With the default
//! parameters area, inertia ratio and convexity are checked; circularity
//! is off. Centres that recur at nearby positions across thresholds are
//! grouped, and groups seen at least `MIN_REPEATABILITY` times become
//! keypoints.

use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, find_contours};
use imageproc::geometry::convex_hull;
use imageproc::point::Point;

use super::Keypoint;

#[derive(Clone, Debug)]
pub struct BlobParams {
    pub min_threshold: u8,
    pub max_threshold: u8,
    pub threshold_step: u8,
    pub min_repeatability: usize,
    pub min_dist_between_blobs: f64,
    pub filter_by_area: bool,
    pub min_area: f64,
    pub max_area: f64,
    pub filter_by_circularity: bool,
    pub min_circularity: f64,
    pub filter_by_inertia: bool,
    pub min_inertia_ratio: f64,
    pub filter_by_convexity: bool,
    pub min_convexity: f64,
}

impl Default for BlobParams {
    fn default() -> Self {
        Self {
            min_threshold: 50,
            max_threshold: 220,
            threshold_step: 10,
            min_repeatability: 2,
            min_dist_between_blobs: 10.0,
            filter_by_area: true,
            min_area: 25.0,
            max_area: 5000.0,
            filter_by_circularity: false,
            min_circularity: 0.8,
            filter_by_inertia: true,
            min_inertia_ratio: 0.1,
            filter_by_convexity: true,
            min_convexity: 0.95,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Center {
    x: f64,
    y: f64,
    radius: f64,
    confidence: f64,
}

impl Center {
    fn distance(&self, other: &Center) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

pub fn detect(image: &GrayImage) -> Vec<Keypoint> {
    detect_with(image, &BlobParams::default())
}

pub fn detect_with(image: &GrayImage, params: &BlobParams) -> Vec<Keypoint> {
    let mut groups: Vec<Vec<Center>> = Vec::new();

    let step = params.threshold_step.max(1) as usize;
    for threshold in (params.min_threshold..params.max_threshold).step_by(step) {
        let binary = dark_mask(image, threshold);
        let mut new_groups = Vec::new();
        for center in find_blobs(&binary, params) {
            let home = groups.iter_mut().find(|group| {
                let middle = &group[group.len() / 2];
                let dist = middle.distance(&center);
                dist < params.min_dist_between_blobs || dist < middle.radius || dist < center.radius
            });
            match home {
                Some(group) => {
                    let at = group.partition_point(|c| c.radius < center.radius);
                    group.insert(at, center);
                }
                None => new_groups.push(vec![center]),
            }
        }
        groups.extend(new_groups);
    }

    groups
        .iter()
        .filter(|group| group.len() >= params.min_repeatability)
        .filter_map(|group| {
            let weight: f64 = group.iter().map(|c| c.confidence).sum();
            if weight <= 0.0 {
                return None;
            }
            let x = group.iter().map(|c| c.x * c.confidence).sum::<f64>() / weight;
            let y = group.iter().map(|c| c.y * c.confidence).sum::<f64>() / weight;
            Some(Keypoint::new(x as f32, y as f32))
        })
        .collect()
}

/// Foreground where the pixel is at or below `threshold`
fn dark_mask(image: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y).0[0] <= threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

fn find_blobs(binary: &GrayImage, params: &BlobParams) -> Vec<Center> {
    find_contours::<i32>(binary)
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer)
        .filter_map(|contour| measure(&contour.points, binary, params))
        .collect()
}

fn measure(points: &[Point<i32>], binary: &GrayImage, params: &BlobParams) -> Option<Center> {
    if points.len() < 3 {
        return None;
    }
    let moments = Moments::of_polygon(points);
    let area = moments.m00;
    if area <= 0.0 {
        return None;
    }
    if params.filter_by_area && (area < params.min_area || area >= params.max_area) {
        return None;
    }

    if params.filter_by_circularity {
        let perimeter = closed_length(points);
        let circularity = 4.0 * std::f64::consts::PI * area / (perimeter * perimeter);
        if circularity < params.min_circularity {
            return None;
        }
    }

    let mut confidence = 1.0;
    if params.filter_by_inertia {
        let ratio = moments.inertia_ratio();
        if ratio < params.min_inertia_ratio {
            return None;
        }
        confidence = ratio * ratio;
    }

    if params.filter_by_convexity {
        let hull_area = polygon_area(&convex_hull(points));
        if hull_area <= 0.0 || area / hull_area < params.min_convexity {
            return None;
        }
    }

    let (x, y) = (moments.m10 / area, moments.m01 / area);
    let (px, py) = (x.round(), y.round());
    let inside = px >= 0.0
        && py >= 0.0
        && (px as u32) < binary.width()
        && (py as u32) < binary.height()
        && binary.get_pixel(px as u32, py as u32).0[0] != 0;
    if !inside {
        return None;
    }

    let mut dists: Vec<f64> = points
        .iter()
        .map(|p| (p.x as f64 - x).hypot(p.y as f64 - y))
        .collect();
    dists.sort_by(f64::total_cmp);
    let radius = (dists[(dists.len() - 1) / 2] + dists[dists.len() / 2]) / 2.0;

    Some(Center {
        x,
        y,
        radius,
        confidence,
    })
}

/// Spatial and central moments of a closed polygon
struct Moments {
    m00: f64,
    m10: f64,
    m01: f64,
    mu20: f64,
    mu11: f64,
    mu02: f64,
}

impl Moments {
    fn of_polygon(points: &[Point<i32>]) -> Self {
        let (mut a, mut x1, mut y1, mut xx, mut xy, mut yy) = (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        for (i, p) in points.iter().enumerate() {
            let q = &points[(i + 1) % points.len()];
            let (xi, yi, xj, yj) = (p.x as f64, p.y as f64, q.x as f64, q.y as f64);
            let cross = xi * yj - xj * yi;
            a += cross;
            x1 += cross * (xi + xj);
            y1 += cross * (yi + yj);
            xx += cross * (xi * xi + xi * xj + xj * xj);
            yy += cross * (yi * yi + yi * yj + yj * yj);
            xy += cross * (2.0 * xi * yi + xi * yj + xj * yi + 2.0 * xj * yj);
        }
        // Orientation of the traversal decides the sign.
        let sign = if a < 0.0 { -1.0 } else { 1.0 };
        let m00 = sign * a / 2.0;
        let m10 = sign * x1 / 6.0;
        let m01 = sign * y1 / 6.0;
        let m20 = sign * xx / 12.0;
        let m02 = sign * yy / 12.0;
        let m11 = sign * xy / 24.0;
        if m00 == 0.0 {
            return Self {
                m00,
                m10,
                m01,
                mu20: 0.0,
                mu11: 0.0,
                mu02: 0.0,
            };
        }
        let (cx, cy) = (m10 / m00, m01 / m00);
        Self {
            m00,
            m10,
            m01,
            mu20: m20 - cx * m10,
            mu11: m11 - cx * m01,
            mu02: m02 - cy * m01,
        }
    }

    /// Ratio of the smallest to the largest second moment of area
    fn inertia_ratio(&self) -> f64 {
        let denominator = (2.0 * self.mu11).hypot(self.mu20 - self.mu02);
        if denominator <= 1e-2 {
            return 1.0;
        }
        let cos = (self.mu20 - self.mu02) / denominator;
        let sin = 2.0 * self.mu11 / denominator;
        let half_sum = 0.5 * (self.mu20 + self.mu02);
        let half_diff = 0.5 * (self.mu20 - self.mu02);
        let i_min = half_sum - half_diff * cos - self.mu11 * sin;
        let i_max = half_sum + half_diff * cos + self.mu11 * sin;
        if i_max <= 0.0 { 0.0 } else { i_min / i_max }
    }
}

fn closed_length(points: &[Point<i32>]) -> f64 {
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(p, q)| ((q.x - p.x) as f64).hypot((q.y - p.y) as f64))
        .sum()
}

fn polygon_area(points: &[Point<i32>]) -> f64 {
    let twice: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(p, q)| p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64)
        .sum();
    twice.abs() / 2.0
}

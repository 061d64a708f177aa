use image::GrayImage;
use image::imageops::{FilterType, resize};
use imageproc::corners::{Corner, corners_fast9};
use ndarray::Array2;

use super::Keypoint;
use super::tensor::{clamp_index, sobel};

const N_FEATURES: usize = 100;
const SCALE_FACTOR: f32 = 1.2;
const N_LEVELS: usize = 8;
const EDGE_THRESHOLD: u32 = 31;
const FAST_THRESHOLD: u8 = 20;
const HARRIS_BLOCK_SIZE: isize = 7;
const HARRIS_K: f32 = 0.04;
const PATCH_RADIUS: i64 = 15;

/// Keypoint with its intensity-centroid orientation in radians
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrientedKeypoint {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub level: usize,
    pub response: f32,
}

pub fn detect(image: &GrayImage) -> Vec<Keypoint> {
    detect_oriented(image)
        .into_iter()
        .map(|k| Keypoint::new(k.x, k.y))
        .collect()
}

pub fn detect_oriented(image: &GrayImage) -> Vec<OrientedKeypoint> {
    let quotas = level_quotas(N_FEATURES);
    let mut keypoints = Vec::new();

    for (level, &quota) in quotas.iter().enumerate() {
        let scale = SCALE_FACTOR.powi(level as i32);
        let width = (image.width() as f32 / scale).round() as u32;
        let height = (image.height() as f32 / scale).round() as u32;
        if width <= 2 * EDGE_THRESHOLD || height <= 2 * EDGE_THRESHOLD {
            break;
        }
        let layer = if level == 0 {
            image.clone()
        } else {
            resize(image, width, height, FilterType::Triangle)
        };
        keypoints.extend(detect_level(&layer, level, scale, quota));
    }
    keypoints
}

/// Split the feature budget geometrically over the pyramid levels
fn level_quotas(n_features: usize) -> Vec<usize> {
    let factor = 1.0 / SCALE_FACTOR;
    let mut desired = n_features as f32 * (1.0 - factor) / (1.0 - factor.powi(N_LEVELS as i32));
    let mut quotas = Vec::with_capacity(N_LEVELS);
    let mut assigned = 0;
    for _ in 0..N_LEVELS - 1 {
        let quota = desired.round() as usize;
        quotas.push(quota);
        assigned += quota;
        desired *= factor;
    }
    quotas.push(n_features.saturating_sub(assigned));
    quotas
}

fn detect_level(layer: &GrayImage, level: usize, scale: f32, quota: usize) -> Vec<OrientedKeypoint> {
    let (width, height) = layer.dimensions();
    let (gx, gy) = sobel(layer);

    let corners = corners_fast9(layer, FAST_THRESHOLD);
    let mut scored: Vec<(f32, u32, u32)> = suppress_non_maxima(corners, width, height)
        .into_iter()
        .filter(|c| {
            (EDGE_THRESHOLD..width - EDGE_THRESHOLD).contains(&c.x)
                && (EDGE_THRESHOLD..height - EDGE_THRESHOLD).contains(&c.y)
        })
        .map(|c| (harris_at(&gx, &gy, c.x as usize, c.y as usize), c.x, c.y))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.truncate(quota);

    scored
        .into_iter()
        .map(|(response, x, y)| OrientedKeypoint {
            x: x as f32 * scale,
            y: y as f32 * scale,
            angle: intensity_centroid_angle(layer, x, y),
            level,
            response,
        })
        .collect()
}

/// Keep FAST corners whose score is a 3x3 local maximum.
///
/// Equal neighbours are resolved in favour of the first in raster order.
fn suppress_non_maxima(corners: Vec<Corner>, width: u32, height: u32) -> Vec<Corner> {
    let mut scores = Array2::<f32>::zeros((height as usize, width as usize));
    for c in &corners {
        scores[[c.y as usize, c.x as usize]] = c.score;
    }

    corners
        .into_iter()
        .filter(|c| {
            let (x, y) = (c.x as usize, c.y as usize);
            let mut rows = y.saturating_sub(1)..=(y + 1).min(height as usize - 1);
            rows.all(|ny| {
                (x.saturating_sub(1)..=(x + 1).min(width as usize - 1)).all(|nx| {
                    let other = scores[[ny, nx]];
                    (ny, nx) == (y, x)
                        || other < c.score
                        || (other == c.score && (ny, nx) > (y, x))
                })
            })
        })
        .collect()
}

fn harris_at(gx: &Array2<f32>, gy: &Array2<f32>, x: usize, y: usize) -> f32 {
    let (height, width) = gx.dim();
    let half = HARRIS_BLOCK_SIZE / 2;
    let (mut a, mut b, mut c) = (0.0, 0.0, 0.0);
    for dy in -half..=half {
        for dx in -half..=half {
            let yy = clamp_index(y as isize + dy, height);
            let xx = clamp_index(x as isize + dx, width);
            let (ix, iy) = (gx[[yy, xx]], gy[[yy, xx]]);
            a += ix * ix;
            b += ix * iy;
            c += iy * iy;
        }
    }
    a * c - b * b - HARRIS_K * (a + c) * (a + c)
}

fn intensity_centroid_angle(layer: &GrayImage, x: u32, y: u32) -> f32 {
    let (mut m10, mut m01) = (0.0f32, 0.0f32);
    for dy in -PATCH_RADIUS..=PATCH_RADIUS {
        for dx in -PATCH_RADIUS..=PATCH_RADIUS {
            if dx * dx + dy * dy > PATCH_RADIUS * PATCH_RADIUS {
                continue;
            }
            let px = (x as i64 + dx) as u32;
            let py = (y as i64 + dy) as u32;
            let intensity = layer.get_pixel(px, py).0[0] as f32;
            m10 += dx as f32 * intensity;
            m01 += dy as f32 * intensity;
        }
    }
    m01.atan2(m10)
}

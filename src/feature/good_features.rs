use image::GrayImage;

use super::Keypoint;
use super::tensor::{StructureTensor, max_filter3, max_value};

const MAX_CORNERS: usize = 100;
const QUALITY_LEVEL: f32 = 0.01;
const MIN_DISTANCE: f32 = 15.0;
const BLOCK_SIZE: usize = 3;

/// Strongest Shi-Tomasi corners, at least `MIN_DISTANCE` apart
pub fn detect(image: &GrayImage) -> Vec<Keypoint> {
    detect_with(image, MAX_CORNERS, MIN_DISTANCE)
}

pub fn detect_with(image: &GrayImage, max_corners: usize, min_distance: f32) -> Vec<Keypoint> {
    let response = StructureTensor::new(image, BLOCK_SIZE).min_eigenvalue();
    let threshold = match max_value(&response) {
        Some(max) if max > 0.0 => QUALITY_LEVEL * max,
        _ => return Vec::new(),
    };
    let dilated = max_filter3(&response);

    let mut candidates: Vec<(f32, usize, usize)> = response
        .indexed_iter()
        .filter(|&(idx, &value)| value > threshold && value == dilated[idx])
        .map(|((y, x), &value)| (value, x, y))
        .collect();
    // Stable sort keeps raster order among equal responses.
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

    let min_distance_sq = min_distance * min_distance;
    let mut corners: Vec<Keypoint> = Vec::new();
    for (_, x, y) in candidates {
        if corners.len() >= max_corners {
            break;
        }
        let candidate = Keypoint::new(x as f32, y as f32);
        let crowded = corners.iter().any(|c| {
            let (dx, dy) = (c.x - candidate.x, c.y - candidate.y);
            dx * dx + dy * dy < min_distance_sq
        });
        if !crowded {
            corners.push(candidate);
        }
    }
    corners
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::test_images::{flat, near_any, square, square_corners};
    use image::{GrayImage, Luma};

    #[test]
    fn finds_the_four_square_corners() {
        let corners = square_corners(12, 28);
        let points = detect(&square(40, 12, 28));
        assert_eq!(points.len(), 4, "{points:?}");
        for point in &points {
            assert!(near_any(point.x, point.y, &corners, 3.0), "{point:?}");
        }
    }

    #[test]
    fn keeps_minimum_distance_and_cap() {
        // Checkerboard with 4 px cells has many corners closer than 15 px.
        let board = GrayImage::from_fn(64, 64, |x, y| {
            if ((x / 4) + (y / 4)) % 2 == 0 { Luma([255]) } else { Luma([0]) }
        });
        let points = detect(&board);
        assert!(!points.is_empty());
        for (i, a) in points.iter().enumerate() {
            for b in &points[i + 1..] {
                let d = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
                assert!(d >= MIN_DISTANCE);
            }
        }

        let capped = detect_with(&board, 5, 1.0);
        assert_eq!(capped.len(), 5);
    }

    #[test]
    fn flat_frame_yields_nothing() {
        assert!(detect(&flat(32, 200)).is_empty());
    }
}

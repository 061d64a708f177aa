use image::GrayImage;

use super::Keypoint;
use super::tensor::{StructureTensor, max_filter3, max_value};

const BLOCK_SIZE: usize = 10;
const K: f32 = 0.04;
const RELATIVE_THRESHOLD: f32 = 0.01;

/// Every pixel whose dilated Harris response exceeds 1% of the frame maximum
pub fn detect(image: &GrayImage) -> Vec<Keypoint> {
    let response = StructureTensor::new(image, BLOCK_SIZE).harris(K);
    let dilated = max_filter3(&response);
    let threshold = match max_value(&dilated) {
        Some(max) if max > 0.0 => RELATIVE_THRESHOLD * max,
        _ => return Vec::new(),
    };

    dilated
        .indexed_iter()
        .filter(|&(_, &value)| value > threshold)
        .map(|((y, x), _)| Keypoint::new(x as f32, y as f32))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::test_images::{flat, near_any, square, square_corners};

    #[test]
    fn responds_only_around_square_corners() {
        let points = detect(&square(48, 14, 34));
        assert!(!points.is_empty());

        let corners = square_corners(14, 34);
        for point in &points {
            assert!(near_any(point.x, point.y, &corners, 8.0), "{point:?}");
        }
        for (cx, cy) in corners {
            assert!(near_any(cx, cy, &points.iter().map(|p| (p.x, p.y)).collect::<Vec<_>>(), 3.0));
        }
    }

    #[test]
    fn flat_frame_yields_nothing() {
        assert!(detect(&flat(32, 0)).is_empty());
    }
}

//! Point-of-interest detectors for a single 8-bit plane.
//!
//! Every detector is a pure function from a [`GrayImage`] to a list of
//! [`Keypoint`]s in the image's own pixel frame. A detector that finds
//! nothing returns an empty list.

pub mod blob;
pub mod good_features;
pub mod harris;
pub mod orb;
pub mod sift;
mod tensor;

use image::GrayImage;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::enums::Detector;
use crate::volume::Volume;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Detector {
    pub fn detect(self, image: &GrayImage) -> Vec<Keypoint> {
        match self {
            Detector::Harris => harris::detect(image),
            Detector::GoodFeatures => good_features::detect(image),
            Detector::Sift => sift::detect(image),
            Detector::Blob => blob::detect(image),
            Detector::Orb => orb::detect(image),
        }
    }
}

/// Scale a plane to 8 bits by `max`, the same mapping the rendered slice uses
pub fn to_gray_u8(plane: &Array2<u16>, max: u16) -> GrayImage {
    let (height, width) = plane.dim();
    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        image::Luma([Volume::normalize_to_u8(plane[[y as usize, x as usize]], max)])
    })
}

#[cfg(test)]
pub(crate) mod test_images {
    use image::{GrayImage, Luma};

    /// Bright square spanning `lo..hi` on both axes
    pub(crate) fn square(size: u32, lo: u32, hi: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if (lo..hi).contains(&x) && (lo..hi).contains(&y) {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    /// Square corners as pixel coordinates
    pub(crate) fn square_corners(lo: u32, hi: u32) -> [(f32, f32); 4] {
        let (lo, hi) = (lo as f32, (hi - 1) as f32);
        [(lo, lo), (hi, lo), (lo, hi), (hi, hi)]
    }

    pub(crate) fn near_any(x: f32, y: f32, points: &[(f32, f32)], tolerance: f32) -> bool {
        points
            .iter()
            .any(|&(px, py)| (x - px).abs() <= tolerance && (y - py).abs() <= tolerance)
    }

    pub(crate) fn flat(size: u32, value: u8) -> GrayImage {
        GrayImage::from_pixel(size, size, Luma([value]))
    }
}

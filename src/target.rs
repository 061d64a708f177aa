use image::{Rgba, RgbaImage};
use tracing::warn;

/// Side length of the generated placeholder
pub const PLACEHOLDER_SIZE: u32 = 256;

/// Image shown in the target panel
#[derive(Clone, Debug, PartialEq)]
pub enum TargetImage {
    Uploaded(RgbaImage),
    Placeholder(RgbaImage),
}

impl Default for TargetImage {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl TargetImage {
    pub fn placeholder() -> Self {
        Self::Placeholder(diagonal_gradient(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE))
    }

    /// Decode uploaded bytes, falling back to the placeholder when they are
    /// empty or not a supported image
    pub fn decode(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self::placeholder();
        }
        match image::load_from_memory(bytes) {
            Ok(decoded) => Self::Uploaded(decoded.to_rgba8()),
            Err(err) => {
                warn!(error = %err, len = bytes.len(), "undecodable target image, using placeholder");
                Self::placeholder()
            }
        }
    }

    pub fn raster(&self) -> &RgbaImage {
        match self {
            Self::Uploaded(image) | Self::Placeholder(image) => image,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }
}

/// Opaque gradient running from the top-left to the bottom-right corner
pub fn diagonal_gradient(width: u32, height: u32) -> RgbaImage {
    let span = (width + height).saturating_sub(2).max(1) as f32;
    RgbaImage::from_fn(width, height, |x, y| {
        let t = ((x + y) as f32 / span * 255.0).round() as u8;
        Rgba([t, 255 - t, 128, 255])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat};
    use std::io::Cursor;

    #[test]
    fn gradient_runs_along_diagonal() {
        let image = diagonal_gradient(4, 3);
        assert_eq!(image.get_pixel(0, 0).0, [0, 255, 128, 255]);
        assert_eq!(image.get_pixel(3, 2).0, [255, 0, 128, 255]);
        assert_eq!(image.get_pixel(1, 2), image.get_pixel(2, 1));
    }

    #[test]
    fn decodes_png_upload() {
        let source = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 40]));
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(source.clone())
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap();

        let target = TargetImage::decode(bytes.get_ref());
        assert!(!target.is_placeholder());
        assert_eq!(target.raster(), &source);
    }

    #[test]
    fn garbage_and_empty_uploads_fall_back() {
        assert!(TargetImage::decode(b"definitely not an image").is_placeholder());
        assert_eq!(TargetImage::decode(&[]), TargetImage::placeholder());
    }
}

use image::GrayImage;
use ndarray::Array2;
use ndarray::Array3;

/// Reference intensities indexed by `(ap, dv, ml)`
#[derive(Debug, Default)]
pub struct Volume {
    data: Array3<u16>,
    max_intensity: u16,
}

impl Volume {
    pub fn new(data: Array3<u16>) -> Self {
        let max_intensity = data.iter().copied().max().unwrap_or(0);
        Self {
            data,
            max_intensity,
        }
    }

    /// Get the dimensions of the volume (ap, dv, ml)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<u16> {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn n_ap(&self) -> usize {
        self.data.dim().0
    }

    pub fn n_dv(&self) -> usize {
        self.data.dim().1
    }

    pub fn n_ml(&self) -> usize {
        self.data.dim().2
    }

    pub fn max_intensity(&self) -> u16 {
        self.max_intensity
    }

    #[inline]
    pub(crate) fn normalize_to_u8(value: u16, max: u16) -> u8 {
        if max == 0 {
            return 0;
        }
        ((value as f32 / max as f32) * 255.0).clamp(0.0, 255.0) as u8
    }

    /// Render a plane for display, scaling intensities by the volume maximum.
    ///
    /// The plane is expected in the y-up display frame; the image is written
    /// top row first, so the last plane row becomes image row 0.
    pub fn plane_to_image(&self, plane: &Array2<u16>) -> Option<GrayImage> {
        let (height, width) = plane.dim();
        let max = self.max_intensity;
        let pixel_data: Vec<u8> = plane
            .outer_iter()
            .rev()
            .flat_map(|row| row.into_iter().map(move |&v| Self::normalize_to_u8(v, max)))
            .collect();
        GrayImage::from_raw(width as u32, height as u32, pixel_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn dims_follow_storage_order() {
        let volume = Volume::new(Array3::zeros((4, 3, 2)));
        assert_eq!(volume.dim(), (4, 3, 2));
        assert_eq!((volume.n_ap(), volume.n_dv(), volume.n_ml()), (4, 3, 2));
        assert_eq!(volume.len(), 24);
    }

    #[test]
    fn image_is_scaled_by_volume_max_and_flipped() {
        let mut data = Array3::zeros((1, 2, 2));
        data[[0, 1, 1]] = 400;
        let volume = Volume::new(data);
        assert_eq!(volume.max_intensity(), 400);

        let plane = array![[0u16, 100], [200, 400]];
        let image = volume.plane_to_image(&plane).unwrap();
        assert_eq!(image.dimensions(), (2, 2));
        // Last plane row is the top image row.
        assert_eq!(image.get_pixel(0, 0).0[0], 127);
        assert_eq!(image.get_pixel(1, 0).0[0], 255);
        assert_eq!(image.get_pixel(1, 1).0[0], 63);
    }

    #[test]
    fn empty_volume_renders_black() {
        let volume = Volume::new(Array3::zeros((1, 1, 1)));
        let image = volume.plane_to_image(&array![[7u16]]).unwrap();
        assert_eq!(image.get_pixel(0, 0).0[0], 0);
    }
}

use image::GrayImage;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use ndarray::Array2;

/// Gradient products summed over a square block around each pixel
pub(crate) struct StructureTensor {
    pub(crate) xx: Array2<f32>,
    pub(crate) xy: Array2<f32>,
    pub(crate) yy: Array2<f32>,
}

impl StructureTensor {
    pub(crate) fn new(image: &GrayImage, block_size: usize) -> Self {
        let (gx, gy) = sobel(image);
        Self {
            xx: box_sum(&(&gx * &gx), block_size),
            xy: box_sum(&(&gx * &gy), block_size),
            yy: box_sum(&(&gy * &gy), block_size),
        }
    }

    /// `det(M) - k * trace(M)^2`
    pub(crate) fn harris(&self, k: f32) -> Array2<f32> {
        Array2::from_shape_fn(self.xx.dim(), |idx| {
            let (a, b, c) = (self.xx[idx], self.xy[idx], self.yy[idx]);
            let trace = a + c;
            a * c - b * b - k * trace * trace
        })
    }

    /// Smaller eigenvalue of `M`
    pub(crate) fn min_eigenvalue(&self) -> Array2<f32> {
        Array2::from_shape_fn(self.xx.dim(), |idx| {
            let (a, b, c) = (self.xx[idx], self.xy[idx], self.yy[idx]);
            let half_diff = (a - c) * 0.5;
            (a + c) * 0.5 - (half_diff * half_diff + b * b).sqrt()
        })
    }
}

/// 3x3 Sobel gradients as float maps `(gx, gy)` indexed `[y, x]`
pub(crate) fn sobel(image: &GrayImage) -> (Array2<f32>, Array2<f32>) {
    let (width, height) = image.dimensions();
    let shape = (height as usize, width as usize);
    let horizontal = horizontal_sobel(image);
    let vertical = vertical_sobel(image);
    let gx = Array2::from_shape_fn(shape, |(y, x)| {
        horizontal.get_pixel(x as u32, y as u32).0[0] as f32
    });
    let gy = Array2::from_shape_fn(shape, |(y, x)| {
        vertical.get_pixel(x as u32, y as u32).0[0] as f32
    });
    (gx, gy)
}

#[inline]
pub(crate) fn clamp_index(index: isize, len: usize) -> usize {
    index.clamp(0, len as isize - 1) as usize
}

/// Sum over a `block x block` window anchored at `block / 2`, replicating
/// border pixels
pub(crate) fn box_sum(src: &Array2<f32>, block: usize) -> Array2<f32> {
    let (height, width) = src.dim();
    let before = (block / 2) as isize;
    let horizontal = Array2::from_shape_fn((height, width), |(y, x)| {
        (0..block as isize)
            .map(|k| src[[y, clamp_index(x as isize + k - before, width)]])
            .sum::<f32>()
    });
    Array2::from_shape_fn((height, width), |(y, x)| {
        (0..block as isize)
            .map(|k| horizontal[[clamp_index(y as isize + k - before, height), x]])
            .sum::<f32>()
    })
}

/// 3x3 grayscale dilation
pub(crate) fn max_filter3(src: &Array2<f32>) -> Array2<f32> {
    let (height, width) = src.dim();
    Array2::from_shape_fn((height, width), |(y, x)| {
        let mut max = f32::MIN;
        for dy in -1..=1 {
            for dx in -1..=1 {
                let yy = clamp_index(y as isize + dy, height);
                let xx = clamp_index(x as isize + dx, width);
                max = max.max(src[[yy, xx]]);
            }
        }
        max
    })
}

/// Largest value of a response map, if any
pub(crate) fn max_value(src: &Array2<f32>) -> Option<f32> {
    src.iter().copied().reduce(f32::max)
}

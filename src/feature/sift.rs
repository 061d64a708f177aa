//! Scale-invariant keypoints from difference-of-Gaussian extrema.
//!
//! The scale space starts at the input resolution (no initial upsampling),
//! with `INTERVALS` sampled scales per octave. Candidates are kept when they
//! are extrema among their 26 scale-space neighbours, have enough contrast
//! and are not edge-like; the strongest `N_FEATURES` are returned.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::filter::gaussian_blur_f32;
use ndarray::Array2;

use super::Keypoint;

const N_FEATURES: usize = 100;
const INTERVALS: usize = 3;
const SIGMA: f32 = 1.6;
const INITIAL_BLUR: f32 = 0.5;
const CONTRAST_THRESHOLD: f32 = 0.04;
const EDGE_RATIO: f32 = 10.0;
const BORDER: usize = 5;
const MIN_OCTAVE_SIZE: u32 = 2 * BORDER as u32 + 6;

type GrayF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

struct Candidate {
    x: f32,
    y: f32,
    response: f32,
}

pub fn detect(image: &GrayImage) -> Vec<Keypoint> {
    let (width, height) = image.dimensions();
    if width.min(height) < MIN_OCTAVE_SIZE {
        return Vec::new();
    }

    let normalized: GrayF32 =
        ImageBuffer::from_fn(width, height, |x, y| Luma([image.get_pixel(x, y).0[0] as f32 / 255.0]));
    let mut octave_base = gaussian_blur_f32(
        &normalized,
        (SIGMA * SIGMA - INITIAL_BLUR * INITIAL_BLUR).sqrt(),
    );

    let sigmas = layer_sigmas();
    let n_octaves = ((width.min(height) as f32).log2() - 2.0).floor().max(1.0) as usize;

    let mut candidates = Vec::new();
    for octave in 0..n_octaves {
        let (w, h) = octave_base.dimensions();
        if w.min(h) < MIN_OCTAVE_SIZE {
            break;
        }

        let mut gaussians = vec![octave_base];
        for &sigma in &sigmas {
            let next = gaussian_blur_f32(&gaussians[gaussians.len() - 1], sigma);
            gaussians.push(next);
        }
        let dogs: Vec<Array2<f32>> = gaussians
            .windows(2)
            .map(|pair| difference(&pair[1], &pair[0]))
            .collect();

        let scale = (1u32 << octave) as f32;
        for layer in 1..=INTERVALS {
            find_extrema(&dogs, layer, scale, &mut candidates);
        }

        octave_base = downsample(&gaussians[INTERVALS]);
    }

    candidates.sort_by(|a, b| b.response.total_cmp(&a.response));
    candidates.truncate(N_FEATURES);
    candidates
        .into_iter()
        .map(|c| Keypoint::new(c.x, c.y))
        .collect()
}

/// Incremental blur taking layer `i - 1` to layer `i`, for `i` in `1..INTERVALS + 3`
fn layer_sigmas() -> Vec<f32> {
    let k = 2f32.powf(1.0 / INTERVALS as f32);
    (1..INTERVALS + 3)
        .map(|i| {
            let previous = SIGMA * k.powi(i as i32 - 1);
            let total = previous * k;
            (total * total - previous * previous).sqrt()
        })
        .collect()
}

fn difference(upper: &GrayF32, lower: &GrayF32) -> Array2<f32> {
    let (width, height) = upper.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        upper.get_pixel(x as u32, y as u32).0[0] - lower.get_pixel(x as u32, y as u32).0[0]
    })
}

fn downsample(image: &GrayF32) -> GrayF32 {
    let (width, height) = image.dimensions();
    ImageBuffer::from_fn((width / 2).max(1), (height / 2).max(1), |x, y| {
        *image.get_pixel(2 * x, 2 * y)
    })
}

fn find_extrema(dogs: &[Array2<f32>], layer: usize, scale: f32, out: &mut Vec<Candidate>) {
    let dog = &dogs[layer];
    let (height, width) = dog.dim();
    let min_contrast = CONTRAST_THRESHOLD / INTERVALS as f32;

    for y in BORDER..height.saturating_sub(BORDER) {
        for x in BORDER..width.saturating_sub(BORDER) {
            let value = dog[[y, x]];
            if value.abs() < min_contrast {
                continue;
            }
            if !is_extremum(dogs, layer, y, x, value) || is_edge(dog, y, x, value) {
                continue;
            }
            out.push(Candidate {
                x: x as f32 * scale,
                y: y as f32 * scale,
                response: value.abs(),
            });
        }
    }
}

fn is_extremum(dogs: &[Array2<f32>], layer: usize, y: usize, x: usize, value: f32) -> bool {
    let neighbours = (layer - 1..=layer + 1).flat_map(|l| {
        (y - 1..=y + 1).flat_map(move |yy| (x - 1..=x + 1).map(move |xx| (l, yy, xx)))
    });
    let mut neighbours = neighbours
        .filter(|&(l, yy, xx)| (l, yy, xx) != (layer, y, x))
        .map(|(l, yy, xx)| dogs[l][[yy, xx]]);
    if value > 0.0 {
        neighbours.all(|n| value >= n)
    } else {
        neighbours.all(|n| value <= n)
    }
}

/// Principal curvature ratio test on the 2x2 spatial Hessian
fn is_edge(dog: &Array2<f32>, y: usize, x: usize, value: f32) -> bool {
    let dxx = dog[[y, x + 1]] + dog[[y, x - 1]] - 2.0 * value;
    let dyy = dog[[y + 1, x]] + dog[[y - 1, x]] - 2.0 * value;
    let dxy = (dog[[y + 1, x + 1]] - dog[[y + 1, x - 1]] - dog[[y - 1, x + 1]]
        + dog[[y - 1, x - 1]])
        * 0.25;
    let trace = dxx + dyy;
    let det = dxx * dyy - dxy * dxy;
    det <= 0.0 || trace * trace * EDGE_RATIO >= (EDGE_RATIO + 1.0).powi(2) * det
}

//! Orientation-dependent plane extraction from the reference volume.
//!
//! A [`SliceView`] pairs an [`Orientation`] with the shared [`Volume`]. Each
//! orientation fixes which volume axis is the frame axis (scrolled by the
//! user and displaced by the offset map) and which two axes map to the rows
//! and columns of the output plane.

use std::sync::Arc;

use ndarray::Array2;
use thiserror::Error;

use crate::enums::{Axis, Orientation};
use crate::volume::Volume;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SliceError {
    #[error("Offset grid is {got:?} but the {view} plane is {expected:?}")]
    ShapeMismatch {
        view: &'static str,
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("Volume is empty")]
    EmptyVolume,
}

/// Volume axes driving the frame index, the plane rows and the plane columns
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxisMap {
    pub frame: Axis,
    pub rows: Axis,
    pub cols: Axis,
}

impl AxisMap {
    /// Build the `(ap, dv, ml)` index for one output pixel
    #[inline]
    fn voxel_index(&self, frame: usize, row: usize, col: usize) -> [usize; 3] {
        let mut index = [0; 3];
        index[self.frame.index()] = frame;
        index[self.rows.index()] = row;
        index[self.cols.index()] = col;
        index
    }
}

impl Orientation {
    pub const fn axes(self) -> AxisMap {
        match self {
            Orientation::Coronal => AxisMap {
                frame: Axis::Ap,
                rows: Axis::Dv,
                cols: Axis::Ml,
            },
            Orientation::Sagittal => AxisMap {
                frame: Axis::Ml,
                rows: Axis::Dv,
                cols: Axis::Ap,
            },
            Orientation::Transverse => AxisMap {
                frame: Axis::Dv,
                rows: Axis::Ap,
                cols: Axis::Ml,
            },
        }
    }
}

/// Produce the per-pixel frame displacement simulating a rotation.
///
/// Column `j` contributes a ramp from `-h` to `+h` across `width`, row `i` a
/// ramp from `-v` to `+v` across `height`; both are rounded to the nearest
/// integer (ties to even) and summed. This is a shear along each axis, not a
/// rigid rotation.
pub fn offset_map(h: i32, v: i32, width: usize, height: usize) -> Array2<i64> {
    let x_frame = linear_ramp(h, width);
    let y_frame = linear_ramp(v, height);
    Array2::from_shape_fn((height, width), |(row, col)| y_frame[row] + x_frame[col])
}

fn linear_ramp(extent: i32, len: usize) -> Vec<i64> {
    let start = -(extent as f64);
    let step = if len > 1 {
        2.0 * extent as f64 / (len - 1) as f64
    } else {
        0.0
    };
    (0..len)
        .map(|i| (i as f64 * step + start).round_ties_even() as i64)
        .collect()
}

/// A plane view of the volume in one orientation
#[derive(Clone, Debug)]
pub struct SliceView {
    orientation: Orientation,
    volume: Arc<Volume>,
}

impl SliceView {
    pub fn new(orientation: Orientation, volume: Arc<Volume>) -> Self {
        Self {
            orientation,
            volume,
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn name(&self) -> &'static str {
        self.orientation.name()
    }

    pub fn volume(&self) -> &Arc<Volume> {
        &self.volume
    }

    fn axis_len(&self, axis: Axis) -> usize {
        let (n_ap, n_dv, n_ml) = self.volume.dim();
        match axis {
            Axis::Ap => n_ap,
            Axis::Dv => n_dv,
            Axis::Ml => n_ml,
        }
    }

    /// Length of the axis the frame slider scrolls through
    pub fn n_frame(&self) -> usize {
        self.axis_len(self.orientation.axes().frame)
    }

    pub fn width(&self) -> usize {
        self.axis_len(self.orientation.axes().cols)
    }

    pub fn height(&self) -> usize {
        self.axis_len(self.orientation.axes().rows)
    }

    pub fn offset(&self, h: i32, v: i32) -> Array2<i64> {
        offset_map(h, v, self.width(), self.height())
    }

    /// Frame grid for `frame` displaced by `offsets`
    pub fn frame_grid(&self, frame: usize, offsets: &Array2<i64>) -> Array2<i64> {
        offsets.mapv(|o| o + frame as i64)
    }

    /// Cut a plane where each pixel reads its frame index from `o`.
    ///
    /// Frame indices outside `0..n_frame` are clamped to the nearest valid
    /// frame; they never wrap around.
    pub fn plane(&self, o: &Array2<i64>) -> Result<Array2<u16>, SliceError> {
        let expected = (self.height(), self.width());
        if o.dim() != expected {
            return Err(SliceError::ShapeMismatch {
                view: self.name(),
                expected,
                got: o.dim(),
            });
        }
        let last_frame = match self.n_frame().checked_sub(1) {
            Some(last) if !self.volume.is_empty() => last as i64,
            _ => return Err(SliceError::EmptyVolume),
        };

        let axes = self.orientation.axes();
        let data = self.volume.data();
        Ok(Array2::from_shape_fn(expected, |(row, col)| {
            let frame = o[[row, col]].clamp(0, last_frame) as usize;
            data[axes.voxel_index(frame, row, col)]
        }))
    }

    /// Plane in the y-up display frame (rows reversed)
    pub fn display_plane(
        &self,
        frame: usize,
        offsets: &Array2<i64>,
    ) -> Result<Array2<u16>, SliceError> {
        let mut plane = self.plane(&self.frame_grid(frame, offsets))?;
        plane.invert_axis(ndarray::Axis(0));
        Ok(plane)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, s};

    fn ramp_volume(shape: (usize, usize, usize)) -> Arc<Volume> {
        let (_, n_dv, n_ml) = shape;
        let data = Array3::from_shape_fn(shape, |(ap, dv, ml)| {
            (ap * n_dv * n_ml + dv * n_ml + ml) as u16
        });
        Arc::new(Volume::new(data))
    }

    #[test]
    fn plane_size_matches_volume_over_frame_axis() {
        let volume = ramp_volume((10, 8, 6));
        for orientation in Orientation::ALL {
            let view = SliceView::new(orientation, volume.clone());
            assert_eq!(view.width() * view.height(), volume.len() / view.n_frame());
        }
    }

    #[test]
    fn axis_permutation_per_orientation() {
        let volume = ramp_volume((10, 8, 6));
        let dims = |o| {
            let view = SliceView::new(o, volume.clone());
            (view.n_frame(), view.height(), view.width())
        };
        assert_eq!(dims(Orientation::Coronal), (10, 8, 6));
        assert_eq!(dims(Orientation::Sagittal), (6, 8, 10));
        assert_eq!(dims(Orientation::Transverse), (8, 10, 6));
    }

    #[test]
    fn coronal_plane_is_ap_section() {
        let volume = Arc::new(Volume::new(Array3::from_shape_fn((100, 80, 60), |(ap, dv, ml)| {
            ((ap * 7 + dv * 3 + ml) % 4096) as u16
        })));
        let view = SliceView::new(Orientation::Coronal, volume.clone());
        assert_eq!((view.width(), view.height(), view.n_frame()), (60, 80, 100));

        let plane = view.plane(&view.frame_grid(50, &view.offset(0, 0))).unwrap();
        assert_eq!(plane, volume.data().slice(s![50, .., ..]));

        let display = view.display_plane(50, &view.offset(0, 0)).unwrap();
        assert_eq!(display, volume.data().slice(s![50, ..;-1, ..]));
    }

    #[test]
    fn sagittal_and_transverse_planes() {
        let volume = ramp_volume((10, 8, 6));

        let sagittal = SliceView::new(Orientation::Sagittal, volume.clone());
        let plane = sagittal.plane(&sagittal.frame_grid(3, &sagittal.offset(0, 0))).unwrap();
        assert_eq!(plane, volume.data().slice(s![.., .., 3]).t());

        let transverse = SliceView::new(Orientation::Transverse, volume.clone());
        let plane = transverse
            .plane(&transverse.frame_grid(5, &transverse.offset(0, 0)))
            .unwrap();
        assert_eq!(plane, volume.data().slice(s![.., 5, ..]));
    }

    #[test]
    fn per_pixel_frames_follow_the_offset_grid() {
        let volume = ramp_volume((10, 8, 6));
        let data = volume.data();

        let sagittal = SliceView::new(Orientation::Sagittal, volume.clone());
        let o = Array2::from_shape_fn((8, 10), |(r, c)| ((r + 2 * c) % 6) as i64);
        let plane = sagittal.plane(&o).unwrap();
        for ((r, c), &value) in plane.indexed_iter() {
            assert_eq!(value, data[[c, r, o[[r, c]] as usize]]);
        }

        let transverse = SliceView::new(Orientation::Transverse, volume.clone());
        let o = Array2::from_shape_fn((10, 6), |(r, c)| ((3 * r + c) % 8) as i64);
        let plane = transverse.plane(&o).unwrap();
        for ((r, c), &value) in plane.indexed_iter() {
            assert_eq!(value, data[[r, o[[r, c]] as usize, c]]);
        }
    }

    #[test]
    fn out_of_range_frames_clamp() {
        let volume = ramp_volume((10, 8, 6));
        let view = SliceView::new(Orientation::Coronal, volume.clone());

        let below = view.plane(&Array2::from_elem((8, 6), -25)).unwrap();
        assert_eq!(below, volume.data().slice(s![0, .., ..]));

        let above = view.plane(&Array2::from_elem((8, 6), 10)).unwrap();
        assert_eq!(above, volume.data().slice(s![9, .., ..]));

        // Extreme rotation at the last frame still renders.
        let plane = view.display_plane(10, &view.offset(100, -100)).unwrap();
        assert_eq!(plane.dim(), (8, 6));
    }

    #[test]
    fn mismatched_offset_grid_is_rejected() {
        let view = SliceView::new(Orientation::Transverse, ramp_volume((10, 8, 6)));
        let err = view.plane(&Array2::zeros((8, 6))).unwrap_err();
        assert_eq!(
            err,
            SliceError::ShapeMismatch {
                view: "Transverse",
                expected: (10, 6),
                got: (8, 6),
            }
        );
    }

    #[test]
    fn zero_rotation_is_zero_map() {
        for (w, h) in [(1, 1), (60, 80), (7, 3)] {
            assert!(offset_map(0, 0, w, h).iter().all(|&o| o == 0));
        }
    }

    #[test]
    fn offset_map_is_antisymmetric() {
        for (h, v) in [(10, 0), (3, -7), (100, 100), (-55, 13)] {
            let forward = offset_map(h, v, 61, 37);
            let backward = offset_map(-h, -v, 61, 37);
            assert_eq!(forward, backward.mapv(|o| -o));
        }
    }

    #[test]
    fn horizontal_ramp_spans_width() {
        let map = offset_map(10, 0, 60, 4);
        let first_row = map.row(0).to_vec();
        assert_eq!(first_row[0], -10);
        assert_eq!(first_row[59], 10);
        assert!(first_row.windows(2).all(|w| w[0] <= w[1]));
        // Rows are identical without vertical rotation.
        for row in map.rows() {
            assert_eq!(row.to_vec(), first_row);
        }
    }

    #[test]
    fn ramp_rounds_ties_to_even() {
        assert_eq!(linear_ramp(1, 5), vec![-1, 0, 0, 0, 1]);
        assert_eq!(linear_ramp(4, 1), vec![-4]);
        assert!(linear_ramp(4, 0).is_empty());
    }
}

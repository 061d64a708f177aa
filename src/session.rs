//! The single mutable viewing session behind the UI.
//!
//! A [`Session`] owns the active [`SliceView`], the offset map derived from
//! the rotation sliders, the frame index, the target image and the current
//! annotation set. Every UI action maps to one method that runs to
//! completion.

use std::sync::Arc;

use image::{GrayImage, RgbaImage};
use ndarray::Array2;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use web_time::Instant;

use crate::enums::{Detector, Orientation, RotationAxis};
use crate::feature::{Keypoint, to_gray_u8};
use crate::slice_view::{SliceError, SliceView};
use crate::target::TargetImage;
use crate::volume::Volume;

/// Rotation sliders span `-ROTATION_LIMIT..=ROTATION_LIMIT`
pub const ROTATION_LIMIT: i32 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Frame {frame} is outside 0..={max}")]
    FrameOutOfRange { frame: usize, max: usize },

    #[error("Rotation {value} is outside -{limit}..={limit}", limit = ROTATION_LIMIT)]
    RotationOutOfRange { value: i32 },

    #[error("Could not render the reference image")]
    Render,

    #[error(transparent)]
    Slice(#[from] SliceError),
}

/// Serializable view of the session for the browser
#[derive(Clone, Debug, Serialize)]
pub struct SessionSnapshot {
    pub view: Orientation,
    pub view_name: &'static str,
    pub frame: usize,
    pub n_frame: usize,
    pub width: usize,
    pub height: usize,
    pub h: i32,
    pub v: i32,
    pub rotation_limit: i32,
    pub annotations: Vec<Keypoint>,
    pub target_placeholder: bool,
    pub target_width: u32,
    pub target_height: u32,
}

#[derive(Debug)]
pub struct Session {
    view: SliceView,
    offsets: Array2<i64>,
    frame: usize,
    h: i32,
    v: i32,
    target: TargetImage,
    annotations: Vec<Keypoint>,
}

impl Session {
    /// Coronal view at the middle frame, no rotation, placeholder target
    pub fn new(volume: Arc<Volume>) -> Self {
        let view = SliceView::new(Orientation::default(), volume);
        let offsets = view.offset(0, 0);
        let frame = view.n_frame() / 2;
        Self {
            view,
            offsets,
            frame,
            h: 0,
            v: 0,
            target: TargetImage::placeholder(),
            annotations: Vec::new(),
        }
    }

    pub fn view(&self) -> &SliceView {
        &self.view
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn rotation(&self) -> (i32, i32) {
        (self.h, self.v)
    }

    pub fn offsets(&self) -> &Array2<i64> {
        &self.offsets
    }

    pub fn annotations(&self) -> &[Keypoint] {
        &self.annotations
    }

    pub fn target(&self) -> &TargetImage {
        &self.target
    }

    /// Swap to another orientation over the same volume.
    ///
    /// The frame value is kept as-is (extraction clamps it), so switching
    /// away and back reproduces the same plane. Returns `false` when the
    /// orientation is already active.
    pub fn change_view(&mut self, orientation: Orientation) -> bool {
        if orientation == self.view.orientation() {
            return false;
        }
        self.view = SliceView::new(orientation, self.view.volume().clone());
        self.offsets = self.view.offset(self.h, self.v);
        self.clear_annotations();
        info!(
            view = self.view.name(),
            n_frame = self.view.n_frame(),
            width = self.view.width(),
            height = self.view.height(),
            "view changed"
        );
        true
    }

    /// Move the frame slider; accepts `0..=n_frame`
    pub fn set_frame(&mut self, frame: usize) -> Result<(), SessionError> {
        let max = self.view.n_frame();
        if frame > max {
            return Err(SessionError::FrameOutOfRange { frame, max });
        }
        self.frame = frame;
        debug!(frame, "frame changed");
        Ok(())
    }

    pub fn set_rotation(&mut self, h: i32, v: i32) -> Result<(), SessionError> {
        for value in [h, v] {
            if !(-ROTATION_LIMIT..=ROTATION_LIMIT).contains(&value) {
                return Err(SessionError::RotationOutOfRange { value });
            }
        }
        self.h = h;
        self.v = v;
        self.offsets = self.view.offset(h, v);
        debug!(h, v, "rotation changed");
        Ok(())
    }

    pub fn reset_rotation(&mut self, axis: RotationAxis) {
        let (h, v) = match axis {
            RotationAxis::H => (0, self.v),
            RotationAxis::V => (self.h, 0),
        };
        self.h = h;
        self.v = v;
        self.offsets = self.view.offset(h, v);
        debug!(?axis, "rotation reset");
    }

    /// Current plane in the y-up display frame
    pub fn display_plane(&self) -> Result<Array2<u16>, SessionError> {
        Ok(self.view.display_plane(self.frame, &self.offsets)?)
    }

    pub fn reference_image(&self) -> Result<GrayImage, SessionError> {
        let plane = self.display_plane()?;
        self.view
            .volume()
            .plane_to_image(&plane)
            .ok_or(SessionError::Render)
    }

    /// Run `detector` on the displayed plane and replace the annotations
    pub fn detect(&mut self, detector: Detector) -> Result<&[Keypoint], SessionError> {
        let started = Instant::now();
        let max = self.view.volume().max_intensity();
        let gray = to_gray_u8(&self.display_plane()?, max);
        self.annotations = detector.detect(&gray);
        info!(
            detector = detector.name(),
            points = self.annotations.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "features detected"
        );
        Ok(&self.annotations)
    }

    pub fn clear_annotations(&mut self) {
        self.annotations.clear();
    }

    /// Replace the annotations with points drawn by the user
    pub fn set_annotations(&mut self, points: Vec<Keypoint>) {
        self.annotations = points;
    }

    pub fn upload_target(&mut self, bytes: &[u8]) {
        self.target = TargetImage::decode(bytes);
        let (width, height) = self.target.raster().dimensions();
        info!(width, height, placeholder = self.target.is_placeholder(), "target image set");
    }

    pub fn clear_target(&mut self) {
        self.target = TargetImage::placeholder();
    }

    pub fn target_image(&self) -> &RgbaImage {
        self.target.raster()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let (target_width, target_height) = self.target.raster().dimensions();
        SessionSnapshot {
            view: self.view.orientation(),
            view_name: self.view.name(),
            frame: self.frame,
            n_frame: self.view.n_frame(),
            width: self.view.width(),
            height: self.view.height(),
            h: self.h,
            v: self.v,
            rotation_limit: ROTATION_LIMIT,
            annotations: self.annotations.clone(),
            target_placeholder: self.target.is_placeholder(),
            target_width,
            target_height,
        }
    }
}

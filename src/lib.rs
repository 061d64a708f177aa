//! # atlas-slicer
//!
//! Interactive viewer for volumetric brain reference atlases.
//!
//! The reference volume is loaded once from a BrainGlobe-style atlas cache
//! and sliced in one of three orientations:
//!  - Coronal (frame axis anterior-posterior)
//!  - Sagittal (frame axis medio-lateral)
//!  - Transverse (frame axis dorsal-ventral)
//!
//! A per-pixel offset map added to the frame index tilts the cut plane to
//! simulate small rotations. Frame indices that leave the volume are clamped
//! to the first or last frame. The displayed plane can be annotated with one
//! of five feature detectors (Harris, Shi-Tomasi, SIFT-style DoG, simple
//! blobs, ORB-style oriented FAST), and an uploaded target image is shown
//! next to it for comparison.
//!
//! All state lives in a single [`session::Session`], served to a browser by
//! [`server::router`].
//!
//! # Examples
//!
//! ## Cutting a tilted coronal plane
//!
//! ```
//! # use std::sync::Arc;
//! # use atlas_slicer::{Orientation, SliceView, Volume};
//! # use ndarray::Array3;
//! let volume = Arc::new(Volume::new(Array3::zeros((100, 80, 60))));
//! let view = SliceView::new(Orientation::Coronal, volume);
//! let offsets = view.offset(10, 0);
//! let plane = view
//!     .display_plane(50, &offsets)
//!     .expect("offset grid matches the plane");
//! assert_eq!(plane.dim(), (80, 60));
//! ```
//!
//! ## Loading an atlas and annotating the middle frame
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use atlas_slicer::{AtlasProvider, BrainGlobeCache, Detector, Session};
//! let cache = BrainGlobeCache::new("/home/me/.brainglobe", false);
//! let volume = cache
//!     .reference("allen_mouse_25um")
//!     .expect("should have loaded the reference volume");
//! let mut session = Session::new(Arc::new(volume));
//! let points = session.detect(Detector::Blob).expect("plane renders");
//! println!("{} blobs", points.len());
//! ```

pub mod atlas_loader;
pub mod config;
pub mod enums;
pub mod feature;
pub mod server;
pub mod session;
pub mod slice_view;
pub mod target;
pub mod volume;

pub use atlas_loader::{AtlasError, AtlasProvider, BrainGlobeCache};
pub use enums::{Detector, Orientation, RotationAxis};
pub use feature::Keypoint;
pub use session::{Session, SessionError};
pub use slice_view::{SliceView, offset_map};
pub use volume::Volume;

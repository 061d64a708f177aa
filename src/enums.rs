use serde::{Deserialize, Serialize};

/// Axis of the reference volume, in storage order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    /// Anterior-posterior
    Ap,
    /// Dorsal-ventral
    Dv,
    /// Medio-lateral
    Ml,
}

impl Axis {
    /// Position of the axis in the `(ap, dv, ml)` index triple
    pub const fn index(self) -> usize {
        match self {
            Axis::Ap => 0,
            Axis::Dv => 1,
            Axis::Ml => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Coronal,
    Sagittal,
    Transverse,
}

impl Orientation {
    pub const ALL: [Orientation; 3] = [
        Orientation::Coronal,
        Orientation::Sagittal,
        Orientation::Transverse,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Orientation::Coronal => "Coronal",
            Orientation::Sagittal => "Sagittal",
            Orientation::Transverse => "Transverse",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Detector {
    /// Harris corner response, thresholded at 1% of the maximum
    Harris,
    /// Shi-Tomasi strongest corners
    GoodFeatures,
    /// Difference-of-Gaussian scale-space keypoints
    Sift,
    /// Simple dark blob detection
    #[default]
    Blob,
    /// Oriented FAST keypoints
    Orb,
}

impl Detector {
    pub const ALL: [Detector; 5] = [
        Detector::Harris,
        Detector::GoodFeatures,
        Detector::Sift,
        Detector::Blob,
        Detector::Orb,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Detector::Harris => "harris",
            Detector::GoodFeatures => "good-features",
            Detector::Sift => "sift",
            Detector::Blob => "blob",
            Detector::Orb => "orb",
        }
    }
}

/// Rotation slider selected by a reset button
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationAxis {
    H,
    V,
}

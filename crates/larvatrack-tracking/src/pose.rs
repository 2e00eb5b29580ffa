//! Per-frame pose records.

use larvatrack_core::{same_value, Point};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tracked body features for one frame. Undefined values are NaN, and
/// compare equal to each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pose {
    pub first_eye: Point,
    pub second_eye: Point,
    /// Orientation of the first eye; NaN unless extended eye calculation ran.
    pub first_eye_angle: f64,
    pub second_eye_angle: f64,
    pub swim_bladder: Point,
    /// Tail chain, starting next to the swim bladder.
    pub tail_points: Vec<Point>,
    /// Centroid of the two eyes and the swim bladder.
    pub body_center: Point,
    /// Direction from the body center to the eye midpoint.
    pub heading_angle: f64,
}

impl PartialEq for Pose {
    fn eq(&self, other: &Self) -> bool {
        self.first_eye == other.first_eye
            && self.second_eye == other.second_eye
            && same_value(self.first_eye_angle, other.first_eye_angle)
            && same_value(self.second_eye_angle, other.second_eye_angle)
            && self.swim_bladder == other.swim_bladder
            && self.tail_points == other.tail_points
            && self.body_center == other.body_center
            && same_value(self.heading_angle, other.heading_angle)
    }
}

impl Pose {
    /// A pose with every field undefined.
    pub fn nan(n_tail_points: usize) -> Self {
        Self {
            first_eye: Point::NAN,
            second_eye: Point::NAN,
            first_eye_angle: f64::NAN,
            second_eye_angle: f64::NAN,
            swim_bladder: Point::NAN,
            tail_points: vec![Point::NAN; n_tail_points],
            body_center: Point::NAN,
            heading_angle: f64::NAN,
        }
    }

    /// Whether every coordinate (eyes, swim bladder, tail, body center) and
    /// the heading are defined. Eye angles are not considered.
    pub fn is_complete(&self) -> bool {
        self.first_eye.is_valid()
            && self.second_eye.is_valid()
            && self.swim_bladder.is_valid()
            && self.body_center.is_valid()
            && self.heading_angle.is_finite()
            && self.tail_points.iter().all(|p| p.is_valid())
    }

    /// Midpoint between the eyes.
    pub fn heading_point(&self) -> Point {
        self.first_eye.midpoint(self.second_eye)
    }
}

/// Why a frame produced no pose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegradeReason {
    /// Nothing in the frame crossed the pixel threshold.
    NoFishVisible,
    /// No thresholded blob contained an eye.
    EyeNotSegmented,
    /// A search produced undefined or non-finite geometry.
    DegenerateGeometry(String),
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFishVisible => f.write_str("no fish visible"),
            Self::EyeNotSegmented => f.write_str("eye blob not found"),
            Self::DegenerateGeometry(what) => write!(f, "degenerate geometry: {what}"),
        }
    }
}

/// Result of processing one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Pose computed from this frame.
    Fresh(Pose),
    /// Frame unchanged from the previous one; its pose is repeated.
    Reused(Pose),
    /// No usable pose; carries an all-NaN pose.
    Degraded { pose: Pose, reason: DegradeReason },
}

impl FrameOutcome {
    pub fn pose(&self) -> &Pose {
        match self {
            Self::Fresh(pose) | Self::Reused(pose) => pose,
            Self::Degraded { pose, .. } => pose,
        }
    }

    pub fn into_pose(self) -> Pose {
        match self {
            Self::Fresh(pose) | Self::Reused(pose) => pose,
            Self::Degraded { pose, .. } => pose,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

//! Tracking parameters.

use larvatrack_core::{Result, TrackError};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Tracking method variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMethod {
    /// Background-subtract first, then locate every feature.
    #[default]
    FreeSwimming,
    /// Locate the eyes on the raw frame, subtract the background afterwards.
    HeadFixed,
}

impl FromStr for TrackingMethod {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "free_swimming" => Ok(Self::FreeSwimming),
            "head_fixed" => Ok(Self::HeadFixed),
            other => Err(TrackError::InvalidParameter(format!(
                "unknown tracking method {other:?} (expected free_swimming or head_fixed)"
            ))),
        }
    }
}

impl fmt::Display for TrackingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FreeSwimming => "free_swimming",
            Self::HeadFixed => "head_fixed",
        })
    }
}

/// Which extreme a pixel search looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    #[default]
    Brightest,
    Darkest,
}

impl Polarity {
    /// Whether `candidate` beats `best` strictly.
    #[inline]
    pub fn better(self, candidate: u8, best: u8) -> bool {
        match self {
            Self::Brightest => candidate > best,
            Self::Darkest => candidate < best,
        }
    }
}

impl FromStr for Polarity {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "brightest" => Ok(Self::Brightest),
            "darkest" => Ok(Self::Darkest),
            other => Err(TrackError::InvalidParameter(format!(
                "unknown pixel search {other:?} (expected brightest or darkest)"
            ))),
        }
    }
}

/// Configuration for one tracking run. Set before the run starts and never
/// changed during it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingParameters {
    pub method: TrackingMethod,
    /// Polarity of the first-eye search (and the head-fixed gate).
    pub initial_pixel_search: Polarity,
    pub n_tail_points: usize,
    /// Radius of each tail search step, in pixels.
    pub dist_tail_points: f64,
    /// Radius of the second-eye search, in pixels.
    pub dist_eyes: f64,
    /// Radius of the swim bladder search from the eye midpoint, in pixels.
    pub dist_swim_bladder: f64,
    /// Width of the angular window for tail searches, in radians.
    pub range_angles: f64,
    pub n_angle_samples: usize,
    pub pixel_threshold: u8,
    pub frame_change_threshold: u8,
    pub eyes_threshold: u8,
    /// Median blur kernel size; odd, 1 disables blurring.
    pub median_blur: u32,
    pub invert_threshold: bool,
    pub extended_eyes_calculation: bool,
}

impl Default for TrackingParameters {
    fn default() -> Self {
        Self {
            method: TrackingMethod::FreeSwimming,
            initial_pixel_search: Polarity::Brightest,
            n_tail_points: 7,
            dist_tail_points: 5.0,
            dist_eyes: 4.0,
            dist_swim_bladder: 12.0,
            range_angles: TAU / 3.0,
            n_angle_samples: 100,
            pixel_threshold: 40,
            frame_change_threshold: 10,
            eyes_threshold: 100,
            median_blur: 3,
            invert_threshold: false,
            extended_eyes_calculation: false,
        }
    }
}

impl TrackingParameters {
    /// Reject configurations that cannot be tracked with.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(TrackError::InvalidParameter(msg));
        if self.median_blur == 0 || self.median_blur % 2 == 0 {
            return bad(format!("median blur kernel must be odd, got {}", self.median_blur));
        }
        if self.n_angle_samples == 0 {
            return bad("n_angle_samples must be at least 1".into());
        }
        for (name, value) in [
            ("dist_tail_points", self.dist_tail_points),
            ("dist_eyes", self.dist_eyes),
            ("dist_swim_bladder", self.dist_swim_bladder),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return bad(format!("{name} must be a positive distance, got {value}"));
            }
        }
        if !(self.range_angles.is_finite() && self.range_angles > 0.0 && self.range_angles <= TAU) {
            return bad(format!(
                "range_angles must lie in (0, 2π], got {}",
                self.range_angles
            ));
        }
        Ok(())
    }

    /// Load parameters from a JSON file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let params: Self = serde_json::from_str(&json)
            .map_err(|e| TrackError::Serialization(format!("{}: {e}", path.display())))?;
        params.validate()?;
        Ok(params)
    }

    /// Write parameters as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| TrackError::Serialization(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

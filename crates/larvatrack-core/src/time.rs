//! Frame rate representation.
//!
//! Kept as a numerator/denominator pair so NTSC rates such as 30000/1001
//! survive a round trip through probing and encoding.

use crate::error::{Result, TrackError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Video frame rate as a rational number of frames per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    /// Numerator (e.g., 30000)
    pub numerator: u32,
    /// Denominator (e.g., 1001)
    pub denominator: u32,
}

impl FrameRate {
    /// Create a new frame rate.
    #[inline]
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Convert to frames per second as f64.
    #[inline]
    pub fn to_fps_f64(self) -> f64 {
        if self.denominator == 0 {
            return 0.0;
        }
        self.numerator as f64 / self.denominator as f64
    }

    /// Presentation time of frame `index`, in seconds.
    #[inline]
    pub fn timestamp(self, index: usize) -> f64 {
        if self.numerator == 0 {
            return 0.0;
        }
        index as f64 * self.denominator as f64 / self.numerator as f64
    }

    /// Common frame rates
    pub const FPS_25: Self = Self::new(25, 1);
    pub const FPS_29_97: Self = Self::new(30000, 1001);
    pub const FPS_30: Self = Self::new(30, 1);
    pub const FPS_60: Self = Self::new(60, 1);
    pub const FPS_100: Self = Self::new(100, 1);
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_30
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denominator == 1 {
            write!(f, "{} fps", self.numerator)
        } else {
            write!(f, "{:.3} fps", self.to_fps_f64())
        }
    }
}

impl FromStr for FrameRate {
    type Err = TrackError;

    /// Parse `"30000/1001"` (ffprobe style) or a plain integer `"30"`.
    fn from_str(s: &str) -> Result<Self> {
        let bad = || TrackError::InvalidParameter(format!("invalid frame rate: {s:?}"));
        let (num, den) = match s.trim().split_once('/') {
            Some((n, d)) => (n.trim(), d.trim()),
            None => (s.trim(), "1"),
        };
        let numerator: u32 = num.parse().map_err(|_| bad())?;
        let denominator: u32 = den.parse().map_err(|_| bad())?;
        if denominator == 0 {
            return Err(bad());
        }
        Ok(Self::new(numerator, denominator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rate_fps() {
        assert!((FrameRate::FPS_29_97.to_fps_f64() - 29.97).abs() < 0.01);
        assert_eq!(FrameRate::FPS_25.timestamp(50), 2.0);
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!("30000/1001".parse::<FrameRate>().unwrap(), FrameRate::FPS_29_97);
        assert_eq!("100".parse::<FrameRate>().unwrap(), FrameRate::FPS_100);
        assert!("30/0".parse::<FrameRate>().is_err());
        assert!("fast".parse::<FrameRate>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(FrameRate::FPS_60.to_string(), "60 fps");
        assert_eq!(FrameRate::FPS_29_97.to_string(), "29.970 fps");
    }
}

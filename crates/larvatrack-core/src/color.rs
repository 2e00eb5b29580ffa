//! Annotation colours.

use crate::error::{Result, TrackError};
use serde::{Deserialize, Serialize};

/// 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Colour {
    /// Create a new colour from RGB components.
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// As an `[r, g, b]` array.
    #[inline]
    pub fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Linear interpolation between two colours.
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round().clamp(0.0, 255.0) as u8;
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
        }
    }

    // Common colours
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);
    pub const RED: Self = Self::new(255, 0, 0);
    pub const GREEN: Self = Self::new(0, 255, 0);
    pub const BLUE: Self = Self::new(0, 0, 255);
    pub const YELLOW: Self = Self::new(255, 255, 0);
    pub const CYAN: Self = Self::new(0, 255, 255);
    pub const MAGENTA: Self = Self::new(255, 0, 255);
}

impl From<[u8; 3]> for Colour {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

impl From<Colour> for [u8; 3] {
    fn from(c: Colour) -> Self {
        c.to_array()
    }
}

/// Palette for pose annotation.
///
/// Layout: `[first eye, second eye, heading, tail 0, .., tail n-1]`, so the
/// length is always `n_tail_points + 3`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Colours {
    colours: Vec<Colour>,
}

impl Colours {
    /// Number of non-tail entries at the front of the palette.
    pub const FIXED: usize = 3;

    /// Default palette for a tail of `n_tail_points` points: green and red
    /// eyes, a white heading arrow and a yellow-to-magenta tail gradient.
    pub fn for_tail_points(n_tail_points: usize) -> Self {
        let mut colours = vec![Colour::GREEN, Colour::RED, Colour::WHITE];
        colours.extend(tail_gradient(n_tail_points));
        Self { colours }
    }

    /// Validate an explicit palette against the tail length.
    pub fn new(colours: Vec<Colour>, n_tail_points: usize) -> Result<Self> {
        let expected = n_tail_points + Self::FIXED;
        if colours.len() != expected {
            return Err(TrackError::InvalidParameter(format!(
                "expected {} colours for {} tail points, got {}",
                expected,
                n_tail_points,
                colours.len()
            )));
        }
        Ok(Self { colours })
    }

    /// Rebuild the palette for a new tail length, keeping existing entries
    /// and filling new tail slots from the default gradient.
    pub fn resized(&self, n_tail_points: usize) -> Self {
        let mut colours: Vec<Colour> = self
            .colours
            .iter()
            .copied()
            .take(n_tail_points + Self::FIXED)
            .collect();
        let defaults = Self::for_tail_points(n_tail_points);
        let have = colours.len();
        colours.extend_from_slice(&defaults.colours[have..]);
        Self { colours }
    }

    /// Number of tail points this palette is built for.
    pub fn n_tail_points(&self) -> usize {
        self.colours.len().saturating_sub(Self::FIXED)
    }

    /// Check the palette matches a tail length.
    pub fn check(&self, n_tail_points: usize) -> Result<()> {
        if self.n_tail_points() == n_tail_points {
            Ok(())
        } else {
            Err(TrackError::InvalidParameter(format!(
                "colour palette covers {} tail points, parameters ask for {}",
                self.n_tail_points(),
                n_tail_points
            )))
        }
    }

    pub fn first_eye(&self) -> Colour {
        self.colours[0]
    }

    pub fn second_eye(&self) -> Colour {
        self.colours[1]
    }

    pub fn heading(&self) -> Colour {
        self.colours[2]
    }

    /// Colour of tail point `index`.
    pub fn tail(&self, index: usize) -> Colour {
        self.colours[Self::FIXED + index]
    }

    /// All entries in palette order.
    pub fn as_slice(&self) -> &[Colour] {
        &self.colours
    }
}

fn tail_gradient(n: usize) -> impl Iterator<Item = Colour> {
    (0..n).map(move |i| {
        let t = if n > 1 { i as f32 / (n - 1) as f32 } else { 0.0 };
        Colour::YELLOW.lerp(Colour::MAGENTA, t)
    })
}

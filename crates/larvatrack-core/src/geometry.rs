//! Geometric primitives: pixel-space points, angles and rectangles.
//!
//! Points are `(row, col)` pairs. Angles follow image convention: measured
//! from the +col axis towards +row, i.e. `atan2(d_row, d_col)`.

use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

/// Equality that treats two NaNs as the same undefined value.
#[inline]
pub fn same_value(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

/// A 2D coordinate in pixel space. NaN components mean "not found".
///
/// Two points are equal when each component is equal or both are NaN, so an
/// undefined point equals itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Point {
    pub row: f64,
    pub col: f64,
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        same_value(self.row, other.row) && same_value(self.col, other.col)
    }
}

impl Point {
    /// The undefined point.
    pub const NAN: Self = Self {
        row: f64::NAN,
        col: f64::NAN,
    };

    #[inline]
    pub const fn new(row: f64, col: f64) -> Self {
        Self { row, col }
    }

    /// Whether both components are finite.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.row.is_finite() && self.col.is_finite()
    }

    /// Whether either component is NaN.
    #[inline]
    pub fn is_nan(self) -> bool {
        self.row.is_nan() || self.col.is_nan()
    }

    /// As an `(x, y)` vector.
    #[inline]
    pub fn to_vec(self) -> DVec2 {
        DVec2::new(self.col, self.row)
    }

    /// From an `(x, y)` vector.
    #[inline]
    pub fn from_vec(v: DVec2) -> Self {
        Self::new(v.y, v.x)
    }

    /// Point halfway between `self` and `other`.
    #[inline]
    pub fn midpoint(self, other: Self) -> Self {
        Self::from_vec(self.to_vec().lerp(other.to_vec(), 0.5))
    }

    /// Mean of a set of points (NaN for an empty set).
    pub fn centroid(points: &[Self]) -> Self {
        if points.is_empty() {
            return Self::NAN;
        }
        let sum: DVec2 = points.iter().map(|p| p.to_vec()).sum();
        Self::from_vec(sum / points.len() as f64)
    }

    /// Direction from `self` to `other`, in radians.
    #[inline]
    pub fn angle_to(self, other: Self) -> f64 {
        (other.row - self.row).atan2(other.col - self.col)
    }

    /// Euclidean distance.
    #[inline]
    pub fn distance(self, other: Self) -> f64 {
        self.to_vec().distance(other.to_vec())
    }

    /// The point at `radius` from `self` along `angle`.
    #[inline]
    pub fn offset(self, angle: f64, radius: f64) -> Self {
        Self::new(self.row + radius * angle.sin(), self.col + radius * angle.cos())
    }

    /// Nearest pixel as `(x, y)` = `(col, row)`, or `None` when undefined.
    #[inline]
    pub fn to_pixel(self) -> Option<(i64, i64)> {
        if self.is_valid() {
            Some((self.col.round() as i64, self.row.round() as i64))
        } else {
            None
        }
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::NAN
    }
}

/// Wrap an angle into `(-π, π]`. NaN passes through.
pub fn wrap_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return angle;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Remove 2π discontinuities from an angle series.
///
/// Each value is shifted by a multiple of 2π so that it lies within π of the
/// last finite value before it. NaN entries are kept as NaN and do not reset
/// the running offset.
pub fn unwrap_angles(angles: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(angles.len());
    let mut last: Option<f64> = None;
    for &angle in angles {
        if !angle.is_finite() {
            out.push(angle);
            continue;
        }
        let value = match last {
            Some(prev) => prev + wrap_angle(angle - prev),
            None => angle,
        };
        last = Some(value);
        out.push(value);
    }
    out
}

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Number of pixels covered.
    #[inline]
    pub fn area(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Check if a pixel is inside the rectangle.
    #[inline]
    pub fn contains(self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    /// Compute intersection with another rectangle.
    pub fn intersection(self, other: Self) -> Option<Self> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        if x1 < x2 && y1 < y2 {
            Some(Self::new(x1, y1, x2 - x1, y2 - y1))
        } else {
            None
        }
    }

    /// Tile a `frame_width` x `frame_height` area into `tile_width` x
    /// `tile_height` rectangles, row by row. Tiles on the right and bottom
    /// edges are clamped to the frame.
    pub fn tiles(frame_width: u32, frame_height: u32, tile_width: u32, tile_height: u32) -> Vec<Self> {
        if tile_width == 0 || tile_height == 0 {
            return Vec::new();
        }
        let frame = Self::new(0, 0, frame_width, frame_height);
        let mut tiles = Vec::new();
        for y in (0..frame_height).step_by(tile_height as usize) {
            for x in (0..frame_width).step_by(tile_width as usize) {
                if let Some(tile) = Self::new(x, y, tile_width, tile_height).intersection(frame) {
                    tiles.push(tile);
                }
            }
        }
        tiles
    }
}

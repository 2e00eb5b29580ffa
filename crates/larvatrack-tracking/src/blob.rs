//! Blob segmentation on binary masks, with moment-based centroid and
//! orientation.

use larvatrack_core::{FrameBuffer, Point, Result};
use std::collections::VecDeque;

/// A connected foreground region.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    /// Number of pixels in the region.
    pub area: usize,
    /// Center of mass.
    pub centroid: Point,
    /// Second central moment μ₂₀ (variance along columns)
    pub m_xx: f64,
    /// Second central moment μ₀₂ (variance along rows)
    pub m_yy: f64,
    /// Second central moment μ₁₁
    pub m_xy: f64,
}

impl Blob {
    /// Angle of the major axis, in `(-π/2, π/2]`, measured like every other
    /// angle here (from +col towards +row). NaN for a single pixel.
    pub fn orientation(&self) -> f64 {
        if self.area < 2 {
            return f64::NAN;
        }
        0.5 * (2.0 * self.m_xy).atan2(self.m_xx - self.m_yy)
    }
}

/// Segment the 8-connected foreground component of `mask` (non-zero pixels)
/// containing `seed`. `None` when the seed is off the frame or background.
pub fn segment(mask: &FrameBuffer, seed: Point) -> Result<Option<Blob>> {
    mask.ensure_gray()?;
    let Some((sx, sy)) = seed.to_pixel() else {
        return Ok(None);
    };
    match mask.get_checked(sx, sy) {
        Some(v) if v > 0 => {}
        _ => return Ok(None),
    }

    let (width, height) = mask.dimensions();
    let mut visited = vec![false; width as usize * height as usize];
    let mut queue = VecDeque::new();
    let index = |x: i64, y: i64| y as usize * width as usize + x as usize;

    visited[index(sx, sy)] = true;
    queue.push_back((sx, sy));

    let (mut n, mut sum_x, mut sum_y) = (0usize, 0.0f64, 0.0f64);
    let (mut sum_xx, mut sum_yy, mut sum_xy) = (0.0f64, 0.0f64, 0.0f64);

    while let Some((x, y)) = queue.pop_front() {
        let (fx, fy) = (x as f64, y as f64);
        n += 1;
        sum_x += fx;
        sum_y += fy;
        sum_xx += fx * fx;
        sum_yy += fy * fy;
        sum_xy += fx * fy;

        for dy in -1..=1 {
            for dx in -1..=1 {
                let (nx, ny) = (x + dx, y + dy);
                match mask.get_checked(nx, ny) {
                    Some(v) if v > 0 && !visited[index(nx, ny)] => {
                        visited[index(nx, ny)] = true;
                        queue.push_back((nx, ny));
                    }
                    _ => {}
                }
            }
        }
    }

    let count = n as f64;
    let (cx, cy) = (sum_x / count, sum_y / count);
    Ok(Some(Blob {
        area: n,
        centroid: Point::new(cy, cx),
        m_xx: sum_xx / count - cx * cx,
        m_yy: sum_yy / count - cy * cy,
        m_xy: sum_xy / count - cx * cy,
    }))
}

/// Whether `point` lands on a foreground pixel of `mask`.
pub fn in_mask(mask: &FrameBuffer, point: Point) -> bool {
    point
        .to_pixel()
        .and_then(|(x, y)| mask.get_checked(x, y))
        .is_some_and(|v| v > 0)
}

//! Radial point search: the geometric step used for every feature after the
//! first eye.

use crate::params::Polarity;
use larvatrack_core::{FrameBuffer, Point};
use std::f64::consts::TAU;

/// Samples candidates on a circle around an origin and keeps the most
/// extreme pixel.
///
/// Counts its calls so callers can observe whether a frame triggered a
/// search at all.
#[derive(Debug, Clone)]
pub struct RadialSearch {
    n_samples: usize,
    calls: u64,
}

impl RadialSearch {
    pub fn new(n_samples: usize) -> Self {
        Self {
            n_samples: n_samples.max(1),
            calls: 0,
        }
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Number of `find_next` calls so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    /// Candidate angles, in sampling order.
    ///
    /// Without a hint the full circle `2π·i/n` is covered; with one, the
    /// window `[hint - range/2, hint + range/2]` is sampled with both ends
    /// included.
    pub fn angles(&self, hint: Option<f64>, range: f64) -> Vec<f64> {
        let n = self.n_samples;
        match hint {
            None => (0..n).map(|i| TAU * i as f64 / n as f64).collect(),
            Some(h) if n == 1 => vec![h],
            Some(h) => {
                let start = h - range / 2.0;
                let step = range / (n - 1) as f64;
                (0..n).map(|i| start + step * i as f64).collect()
            }
        }
    }

    /// Find the next point of interest at `radius` from `origin`.
    ///
    /// Intensity is read at each candidate's rounded pixel; candidates off
    /// the frame are skipped. The first candidate with the extreme value wins
    /// and its rounded coordinate is returned. With no candidate on the frame
    /// the origin comes back unchanged, and a NaN origin gives a NaN point.
    pub fn find_next(
        &mut self,
        origin: Point,
        radius: f64,
        frame: &FrameBuffer,
        hint: Option<f64>,
        range: f64,
        polarity: Polarity,
    ) -> Point {
        self.calls += 1;
        if origin.is_nan() {
            return Point::NAN;
        }
        let hint = hint.filter(|h| h.is_finite());

        let mut best: Option<(Point, u8)> = None;
        for angle in self.angles(hint, range) {
            let candidate = origin.offset(angle, radius);
            let Some((x, y)) = candidate.to_pixel() else {
                continue;
            };
            let Some(value) = frame.get_checked(x, y) else {
                continue;
            };
            match best {
                Some((_, b)) if !polarity.better(value, b) => {}
                _ => best = Some((Point::new(y as f64, x as f64), value)),
            }
        }
        best.map_or(origin, |(p, _)| p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larvatrack_core::PixelFormat;
    use std::f64::consts::PI;

    fn dark(width: u32, height: u32) -> FrameBuffer {
        FrameBuffer::new(width, height, PixelFormat::Gray8)
    }

    #[test]
    fn test_finds_lone_bright_pixel() {
        let mut frame = dark(100, 100);
        // (row 56, col 58): offset (6, 8) from the origin, radius 10
        frame.set(58, 56, 255);
        let mut search = RadialSearch::new(100);
        let p = search.find_next(
            Point::new(50.0, 50.0),
            10.0,
            &frame,
            None,
            TAU,
            Polarity::Brightest,
        );
        assert_eq!(p, Point::new(56.0, 58.0));
        assert_eq!(search.calls(), 1);
    }

    #[test]
    fn test_darkest_and_first_tie() {
        let frame = FrameBuffer::gray_from_fn(40, 40, |_, _| 100);
        let mut search = RadialSearch::new(8);
        // all equal: first candidate (angle 0, +col) wins
        let p = search.find_next(Point::new(20.0, 20.0), 5.0, &frame, None, TAU, Polarity::Darkest);
        assert_eq!(p, Point::new(20.0, 25.0));
    }

    #[test]
    fn test_hint_restricts_window() {
        let mut frame = dark(40, 40);
        frame.set(25, 20, 200); // angle 0
        frame.set(15, 20, 255); // angle π
        let mut search = RadialSearch::new(11);
        let p = search.find_next(
            Point::new(20.0, 20.0),
            5.0,
            &frame,
            Some(0.0),
            PI / 2.0,
            Polarity::Brightest,
        );
        assert_eq!(p, Point::new(20.0, 25.0));
    }

    #[test]
    fn test_window_angles_include_both_ends() {
        let search = RadialSearch::new(5);
        let angles = search.angles(Some(1.0), 2.0);
        assert_eq!(angles.len(), 5);
        assert!((angles[0] - 0.0).abs() < 1e-12);
        assert!((angles[4] - 2.0).abs() < 1e-12);
        let full = search.angles(None, 2.0);
        assert!((full[1] - TAU / 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_bounds_returns_origin() {
        let frame = dark(10, 10);
        let mut search = RadialSearch::new(16);
        let origin = Point::new(5.0, 5.0);
        assert_eq!(
            search.find_next(origin, 50.0, &frame, None, TAU, Polarity::Brightest),
            origin
        );
    }

    #[test]
    fn test_edge_excludes_outside_candidates() {
        let mut frame = dark(10, 10);
        let mut search = RadialSearch::new(4);
        let origin = Point::new(1.0, 1.0);
        // left and up candidates fall off the frame
        let p = search.find_next(origin, 2.0, &frame, None, TAU, Polarity::Brightest);
        assert_eq!(p, Point::new(1.0, 3.0));
        frame.set(1, 3, 50);
        let p = search.find_next(origin, 2.0, &frame, None, TAU, Polarity::Brightest);
        assert_eq!(p, Point::new(3.0, 1.0));
    }

    #[test]
    fn test_nan_origin() {
        let mut search = RadialSearch::new(10);
        let p = search.find_next(Point::NAN, 3.0, &dark(5, 5), None, TAU, Polarity::Brightest);
        assert!(p.is_nan());
        assert_eq!(search.calls(), 1);
    }
}

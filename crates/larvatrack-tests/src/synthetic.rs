//! Synthetic fish frames with known geometry.

use larvatrack_core::{FrameBuffer, FrameRate, PixelFormat, Point};
use larvatrack_media::MemorySource;
use larvatrack_tracking::{Background, TrackingParameters};
use std::f64::consts::FRAC_PI_2;

pub const SIZE: u32 = 200;

pub fn black() -> FrameBuffer {
    FrameBuffer::new(SIZE, SIZE, PixelFormat::Gray8)
}

pub fn black_background() -> Background {
    Background::new(black())
}

pub fn video(frames: Vec<FrameBuffer>) -> MemorySource {
    MemorySource::new(frames, FrameRate::FPS_100).unwrap()
}

/// Fish facing up the frame: single-pixel eyes at (97, 98) and (97, 102),
/// body down column 100 from row 100 to 131, fading towards the tail.
pub fn upright_fish() -> FrameBuffer {
    FrameBuffer::gray_from_fn(SIZE, SIZE, |x, y| match (x, y) {
        (98 | 102, 97) => 250,
        (100, 100..=131) => (200 - 2 * (y - 100)) as u8,
        _ => 0,
    })
}

/// Fish blob of radius 14 around (100, 100) with two eyes at (95, 98) and
/// (95, 102).
///
/// Each eye is a 5-pixel cross at 250 fading out to 4.5 px, overlapping its
/// neighbour. The body is brightest at (106, 98), behind the eyes, and dims
/// with distance from there.
pub fn two_eye_fish() -> FrameBuffer {
    let center = Point::new(100.0, 100.0);
    let bladder = Point::new(106.0, 98.0);
    let eyes = [Point::new(95.0, 98.0), Point::new(95.0, 102.0)];

    FrameBuffer::gray_from_fn(SIZE, SIZE, |x, y| {
        let p = Point::new(y as f64, x as f64);
        let mut value: f64 = 0.0;

        if p.distance(center) <= 14.0 {
            value = (160.0 - 4.0 * p.distance(bladder)).max(60.0);
        }
        for eye in eyes {
            let d = p.distance(eye);
            if d <= 1.0 {
                value = 250.0;
            } else if d <= 4.5 {
                value = value.max(250.0 - 10.0 * d);
            }
        }

        value.round() as u8
    })
}

/// Parameters matching [`upright_fish`].
///
/// Expected pose: eyes (97, 98) and (97, 102), swim bladder (103, 100),
/// body center (99, 100), tail every 5 rows from (108, 100).
pub fn upright_params() -> TrackingParameters {
    TrackingParameters {
        dist_eyes: 4.0,
        dist_swim_bladder: 6.0,
        dist_tail_points: 5.0,
        n_tail_points: 5,
        median_blur: 1,
        pixel_threshold: 30,
        ..TrackingParameters::default()
    }
}

/// Fish centred on (100, 100) whose head points along `heading`.
///
/// Eyes are ellipses 10 px apart, elongated across the body axis, brightest
/// at their centres, on a dim head disc. The body is a 3 px wide band from 3
/// to 50 px behind the eye midpoint, fading towards the tail.
pub fn rotated_fish(heading: f64) -> FrameBuffer {
    let center = Point::new(100.0, 100.0);
    let head = center.offset(heading, 15.0);
    let eyes = [
        head.offset(heading + FRAC_PI_2, 5.0),
        head.offset(heading - FRAC_PI_2, 5.0),
    ];
    let (sin, cos) = heading.sin_cos();

    FrameBuffer::gray_from_fn(SIZE, SIZE, |x, y| {
        let (col, row) = (x as f64, y as f64);
        let mut value: f64 = 0.0;

        if Point::new(row, col).distance(head) <= 7.0 {
            value = 60.0;
        }
        for eye in eyes {
            let (dx, dy) = (col - eye.col, row - eye.row);
            let along = dx * cos + dy * sin;
            let across = -dx * sin + dy * cos;
            let rho = ((across / 3.0).powi(2) + (along / 1.5).powi(2)).sqrt();
            if rho <= 1.0 {
                value = value.max(250.0 - 20.0 * rho);
            }
        }

        let (dx, dy) = (col - head.col, row - head.row);
        let behind = -(dx * cos + dy * sin);
        let across = (-dx * sin + dy * cos).abs();
        if (3.0..=50.0).contains(&behind) && across <= 1.5 {
            value = value.max(200.0 - 2.0 * behind - 40.0 * across);
        }

        value.round() as u8
    })
}

/// Parameters matching [`rotated_fish`], with the extended eye calculation.
pub fn rotated_params() -> TrackingParameters {
    TrackingParameters {
        dist_eyes: 10.0,
        dist_swim_bladder: 30.0,
        dist_tail_points: 5.0,
        n_tail_points: 3,
        n_angle_samples: 360,
        median_blur: 1,
        pixel_threshold: 30,
        eyes_threshold: 225,
        extended_eyes_calculation: true,
        ..TrackingParameters::default()
    }
}

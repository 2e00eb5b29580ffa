//! Pose overlays on RGB copies of tracked frames.

use crate::pose::Pose;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut};
use larvatrack_core::{Colour, Colours, FrameBuffer, PixelFormat, Point, Result, TrackError};
use std::f64::consts::PI;

/// Radius of the eye markers, in pixels.
const EYE_RADIUS: i32 = 2;
/// Radius of the tail point markers, in pixels.
const TAIL_RADIUS: i32 = 1;
/// Shortest heading arrow drawn.
const MIN_ARROW_LENGTH: f64 = 8.0;
const ARROW_HEAD: f64 = 3.0;

fn rgb(colour: Colour) -> Rgb<u8> {
    Rgb(colour.to_array())
}

fn xy(point: Point) -> (f32, f32) {
    (point.col as f32, point.row as f32)
}

fn xy_i32(point: Point) -> (i32, i32) {
    (point.col.round() as i32, point.row.round() as i32)
}

/// Draw `pose` on an RGB copy of `frame`.
///
/// Undefined features are skipped, so a degraded pose returns a plain RGB
/// copy. The palette must match the pose's tail length.
pub fn annotate(frame: &FrameBuffer, pose: &Pose, colours: &Colours) -> Result<FrameBuffer> {
    colours.check(pose.tail_points.len())?;
    let (width, height) = frame.dimensions();
    let mut canvas = RgbImage::from_raw(width, height, frame.to_rgb().into_data())
        .ok_or_else(|| TrackError::Internal("RGB buffer has the wrong length".into()))?;

    draw_tail(&mut canvas, pose, colours);
    draw_heading(&mut canvas, pose, colours.heading());

    if pose.swim_bladder.is_valid() {
        draw_hollow_circle_mut(
            &mut canvas,
            xy_i32(pose.swim_bladder),
            EYE_RADIUS,
            rgb(colours.heading()),
        );
    }
    for (eye, colour) in [
        (pose.first_eye, colours.first_eye()),
        (pose.second_eye, colours.second_eye()),
    ] {
        if eye.is_valid() {
            draw_filled_circle_mut(&mut canvas, xy_i32(eye), EYE_RADIUS, rgb(colour));
        }
    }

    FrameBuffer::from_raw(width, height, PixelFormat::Rgb8, canvas.into_raw())
}

fn draw_tail(canvas: &mut RgbImage, pose: &Pose, colours: &Colours) {
    let mut previous = pose.swim_bladder;
    for (i, &point) in pose.tail_points.iter().enumerate() {
        let colour = rgb(colours.tail(i));
        if point.is_valid() {
            if previous.is_valid() {
                draw_line_segment_mut(canvas, xy(previous), xy(point), colour);
            }
            draw_filled_circle_mut(canvas, xy_i32(point), TAIL_RADIUS, colour);
        }
        previous = point;
    }
}

fn draw_heading(canvas: &mut RgbImage, pose: &Pose, colour: Colour) {
    if !pose.body_center.is_valid() || !pose.heading_angle.is_finite() {
        return;
    }
    let length = (2.0 * pose.body_center.distance(pose.heading_point())).max(MIN_ARROW_LENGTH);
    let tip = pose.body_center.offset(pose.heading_angle, length);
    let colour = rgb(colour);

    draw_line_segment_mut(canvas, xy(pose.body_center), xy(tip), colour);
    for side in [-1.0, 1.0] {
        let barb = tip.offset(pose.heading_angle + PI + side * PI / 6.0, ARROW_HEAD);
        draw_line_segment_mut(canvas, xy(tip), xy(barb), colour);
    }
}

//! Frame-sequential pose tracker.
//!
//! Each frame is preprocessed, gated on visibility, compared with the
//! previous frame, and only then searched: first eye at the extreme pixel,
//! second eye on a circle around it, swim bladder on a circle around the eye
//! midpoint, then a chain of tail points each searched in a window around
//! the direction of the previous segment.

use crate::background::Background;
use crate::blob::{in_mask, segment};
use crate::params::{Polarity, TrackingMethod, TrackingParameters};
use crate::pose::{DegradeReason, FrameOutcome, Pose};
use crate::preprocess::{count_changed, find_extremum, median_blur, preprocess, subtract, threshold};
use crate::radial::RadialSearch;
use larvatrack_core::{wrap_angle, FrameBuffer, Point, Result, TrackError};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI, TAU};
use tracing::debug;

/// Lifecycle of a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// No frame processed yet.
    Uninitialized,
    /// At least one frame processed; previous-frame state is populated.
    Tracking,
}

/// Per-run frame counts by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerStats {
    pub fresh: usize,
    pub reused: usize,
    pub degraded: usize,
}

impl TrackerStats {
    pub fn total(&self) -> usize {
        self.fresh + self.reused + self.degraded
    }

    fn record(&mut self, outcome: &FrameOutcome) {
        match outcome {
            FrameOutcome::Fresh(_) => self.fresh += 1,
            FrameOutcome::Reused(_) => self.reused += 1,
            FrameOutcome::Degraded { .. } => self.degraded += 1,
        }
    }
}

/// Frames a fresh search runs on.
struct SearchFrames<'a> {
    /// Frame the eyes are located on.
    eyes: &'a FrameBuffer,
    /// Polarity of the first and second eye searches.
    eye_polarity: Polarity,
    /// Whether the body is darker than the pixel threshold on `eyes`.
    dark_body: bool,
    /// Background-subtracted frame for the swim bladder and tail.
    body: &'a FrameBuffer,
}

/// Stateful pose tracker. Frames must be fed in order.
pub struct PoseTracker {
    params: TrackingParameters,
    background: Option<FrameBuffer>,
    search: RadialSearch,
    state: TrackerState,
    previous_frame: Option<FrameBuffer>,
    previous_eye_angle: Option<f64>,
    last_pose: Option<Pose>,
    stats: TrackerStats,
    frames_seen: usize,
}

impl PoseTracker {
    /// Create a tracker. Parameters are validated here.
    pub fn new(params: TrackingParameters, background: Option<&Background>) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            search: RadialSearch::new(params.n_angle_samples),
            background: background.map(|bg| bg.frame().clone()),
            params,
            state: TrackerState::Uninitialized,
            previous_frame: None,
            previous_eye_angle: None,
            last_pose: None,
            stats: TrackerStats::default(),
            frames_seen: 0,
        })
    }

    pub fn params(&self) -> &TrackingParameters {
        &self.params
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn stats(&self) -> TrackerStats {
        self.stats
    }

    /// Number of radial searches run so far.
    pub fn search_calls(&self) -> u64 {
        self.search.calls()
    }

    /// Forget all previous-frame state.
    pub fn reset(&mut self) {
        self.state = TrackerState::Uninitialized;
        self.previous_frame = None;
        self.previous_eye_angle = None;
        self.last_pose = None;
        self.stats = TrackerStats::default();
        self.frames_seen = 0;
    }

    /// Process the next frame.
    ///
    /// Tracking failures on the frame come back as
    /// [`FrameOutcome::Degraded`]; `Err` is reserved for frames that cannot
    /// be processed at all, such as a size that does not match the
    /// background.
    pub fn process(&mut self, frame: &FrameBuffer) -> Result<FrameOutcome> {
        let outcome = match self.params.method {
            TrackingMethod::FreeSwimming => self.process_free_swimming(frame)?,
            TrackingMethod::HeadFixed => self.process_head_fixed(frame)?,
        };

        if let FrameOutcome::Degraded { reason, .. } = &outcome {
            debug!(frame = self.frames_seen, %reason, "Frame degraded");
        }
        self.stats.record(&outcome);
        self.last_pose = Some(outcome.pose().clone());
        self.state = TrackerState::Tracking;
        self.frames_seen += 1;
        Ok(outcome)
    }

    fn process_free_swimming(&mut self, frame: &FrameBuffer) -> Result<FrameOutcome> {
        let processed = preprocess(frame, self.background.as_ref(), self.params.median_blur)?;

        if processed.max_value() <= self.params.pixel_threshold {
            self.previous_frame = Some(processed);
            return Ok(self.degraded(DegradeReason::NoFishVisible));
        }
        if let Some(reused) = self.check_unchanged(&processed)? {
            self.previous_frame = Some(processed);
            return Ok(reused);
        }

        let frames = SearchFrames {
            eyes: &processed,
            eye_polarity: Polarity::Brightest,
            dark_body: false,
            body: &processed,
        };
        let outcome = self.fresh(&frames);
        self.previous_frame = Some(processed);
        Ok(outcome)
    }

    /// Eyes are found on the blurred raw frame; the background is only
    /// subtracted afterwards, for the swim bladder and tail.
    fn process_head_fixed(&mut self, frame: &FrameBuffer) -> Result<FrameOutcome> {
        let gray = frame.to_gray();
        let raw = median_blur(&gray, self.params.median_blur)?;
        let polarity = self.params.initial_pixel_search;

        let visible = match polarity {
            Polarity::Brightest => raw.max_value() > self.params.pixel_threshold,
            Polarity::Darkest => raw.min_value() < self.params.pixel_threshold,
        };
        if !visible {
            self.previous_frame = Some(raw);
            return Ok(self.degraded(DegradeReason::NoFishVisible));
        }
        if let Some(reused) = self.check_unchanged(&raw)? {
            self.previous_frame = Some(raw);
            return Ok(reused);
        }

        let body = match &self.background {
            Some(bg) => median_blur(&subtract(&gray, bg)?, self.params.median_blur)?,
            None => raw.clone(),
        };
        let frames = SearchFrames {
            eyes: &raw,
            eye_polarity: polarity,
            dark_body: polarity == Polarity::Darkest,
            body: &body,
        };
        let outcome = self.fresh(&frames);
        self.previous_frame = Some(raw);
        Ok(outcome)
    }

    /// The previous pose, if no pixel moved by the change threshold.
    fn check_unchanged(&self, current: &FrameBuffer) -> Result<Option<FrameOutcome>> {
        let (Some(previous), Some(last)) = (&self.previous_frame, &self.last_pose) else {
            return Ok(None);
        };
        if count_changed(current, previous, self.params.frame_change_threshold)? == 0 {
            return Ok(Some(FrameOutcome::Reused(last.clone())));
        }
        Ok(None)
    }

    fn degraded(&self, reason: DegradeReason) -> FrameOutcome {
        FrameOutcome::Degraded {
            pose: Pose::nan(self.params.n_tail_points),
            reason,
        }
    }

    fn fresh(&mut self, frames: &SearchFrames<'_>) -> FrameOutcome {
        match self.locate(frames) {
            Ok(pose) => FrameOutcome::Fresh(pose),
            Err(reason) => self.degraded(reason),
        }
    }

    fn locate(&mut self, frames: &SearchFrames<'_>) -> std::result::Result<Pose, DegradeReason> {
        let p = &self.params;

        let (x, y, _) = find_extremum(frames.eyes, frames.eye_polarity)
            .map_err(geometry)?
            .ok_or_else(|| DegradeReason::DegenerateGeometry("empty frame".into()))?;
        let mut first_eye = Point::new(y as f64, x as f64);
        let mut second_eye =
            self.search
                .find_next(first_eye, p.dist_eyes, frames.eyes, None, TAU, frames.eye_polarity);

        let mut first_eye_angle = f64::NAN;
        let mut second_eye_angle = f64::NAN;
        if p.extended_eyes_calculation {
            let mut pair_angle = first_eye.angle_to(second_eye);
            if let Some(previous) = self.previous_eye_angle {
                let delta = (pair_angle - previous).abs();
                if delta > FRAC_PI_2 && delta < 3.0 * FRAC_PI_2 {
                    std::mem::swap(&mut first_eye, &mut second_eye);
                    pair_angle = first_eye.angle_to(second_eye);
                }
            }
            if pair_angle.is_finite() {
                self.previous_eye_angle = Some(pair_angle);
            }

            let eye_mask = threshold(frames.eyes, p.eyes_threshold, p.invert_threshold).map_err(geometry)?;
            let body_mask = threshold(frames.eyes, p.pixel_threshold, frames.dark_body).map_err(geometry)?;
            let first = segment(&eye_mask, first_eye)
                .map_err(geometry)?
                .ok_or(DegradeReason::EyeNotSegmented)?;
            let second = segment(&eye_mask, second_eye)
                .map_err(geometry)?
                .ok_or(DegradeReason::EyeNotSegmented)?;

            first_eye = first.centroid;
            second_eye = second.centroid;
            first_eye_angle = outward(first_eye, first.orientation(), p.dist_eyes, &body_mask);
            second_eye_angle = outward(second_eye, second.orientation(), p.dist_eyes, &body_mask);
        }

        let heading_point = first_eye.midpoint(second_eye);
        let swim_bladder = self.search.find_next(
            heading_point,
            p.dist_swim_bladder,
            frames.body,
            None,
            TAU,
            Polarity::Brightest,
        );
        let body_center = Point::centroid(&[swim_bladder, first_eye, second_eye]);
        let heading_angle = body_center.angle_to(heading_point);

        let mut tail_points: Vec<Point> = Vec::with_capacity(p.n_tail_points);
        let mut hint = heading_angle + PI;
        for i in 0..p.n_tail_points {
            if i == 1 {
                hint = swim_bladder.angle_to(tail_points[0]);
            } else if i >= 2 {
                hint = tail_points[i - 2].angle_to(tail_points[i - 1]);
            }
            let origin = tail_points.last().copied().unwrap_or(swim_bladder);
            let next = self.search.find_next(
                origin,
                p.dist_tail_points,
                frames.body,
                Some(hint),
                p.range_angles,
                Polarity::Brightest,
            );
            tail_points.push(next);
        }

        let pose = Pose {
            first_eye,
            second_eye,
            first_eye_angle,
            second_eye_angle,
            swim_bladder,
            tail_points,
            body_center,
            heading_angle,
        };
        if !pose.is_complete() {
            return Err(DegradeReason::DegenerateGeometry(
                "search produced an undefined point".into(),
            ));
        }
        Ok(pose)
    }
}

/// Flip an eye's axis angle by π when it points into the body.
fn outward(eye: Point, angle: f64, reach: f64, body_mask: &FrameBuffer) -> f64 {
    if !angle.is_finite() {
        return angle;
    }
    if in_mask(body_mask, eye.offset(angle, reach)) {
        wrap_angle(angle + PI)
    } else {
        angle
    }
}

fn geometry(err: TrackError) -> DegradeReason {
    DegradeReason::DegenerateGeometry(err.to_string())
}

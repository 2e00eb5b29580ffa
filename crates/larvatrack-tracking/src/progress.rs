//! Progress reporting and cooperative cancellation.
//!
//! Long operations take a `FnMut(ProgressUpdate)` callback, invoked at most
//! once per frame, and a [`CancelToken`] they check once per frame.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Progress units charged per frame for each kind of work.
pub mod units {
    /// Reading one frame for a brightest/darkest background.
    pub const EXTREMUM_BACKGROUND_FRAME: u64 = 1;
    /// Reading one frame for one modal background tile.
    pub const MODAL_BACKGROUND_FRAME: u64 = 10;
    /// Tracking one frame.
    pub const TRACKED_FRAME: u64 = 10;
}

/// Which part of a run is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    CalculatingBackground,
    TrackingVideo,
    Complete,
}

impl Phase {
    /// Display label for the phase.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CalculatingBackground => "Calculating Background",
            Self::TrackingVideo => "Tracking Video",
            Self::Complete => "Complete",
        }
    }
}

/// A progress report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub phase: Phase,
    /// Frames processed so far within the current phase.
    pub current_frame: usize,
    /// Frames the current phase will process in total.
    pub total_frames: usize,
    /// Cumulative work units over the whole run.
    pub units_done: u64,
    pub units_total: u64,
    pub elapsed: Duration,
}

impl ProgressUpdate {
    /// Completion of the whole run (0.0 to 1.0).
    pub fn fraction(&self) -> f64 {
        if self.units_total == 0 {
            return 0.0;
        }
        (self.units_done as f64 / self.units_total as f64).min(1.0)
    }

    pub fn label(&self) -> &'static str {
        self.phase.label()
    }
}

/// Running unit count for a run, turned into [`ProgressUpdate`]s.
#[derive(Debug, Clone)]
pub struct ProgressMeter {
    started: Instant,
    units_done: u64,
    units_total: u64,
}

impl ProgressMeter {
    pub fn new(units_total: u64) -> Self {
        Self {
            started: Instant::now(),
            units_done: 0,
            units_total,
        }
    }

    /// Charge `units` of finished work and build the matching update.
    pub fn advance(
        &mut self,
        units: u64,
        phase: Phase,
        current_frame: usize,
        total_frames: usize,
    ) -> ProgressUpdate {
        self.units_done += units;
        ProgressUpdate {
            phase,
            current_frame,
            total_frames,
            units_done: self.units_done,
            units_total: self.units_total,
            elapsed: self.started.elapsed(),
        }
    }

    pub fn units_done(&self) -> u64 {
        self.units_done
    }

    pub fn units_total(&self) -> u64 {
        self.units_total
    }
}

/// Handle for cancelling an in-progress operation.
#[derive(Debug, Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a new cancel handle.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Check if cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Latest progress, shared with a thread that polls it.
#[derive(Debug, Clone, Default)]
pub struct SharedProgress(Arc<Mutex<Option<ProgressUpdate>>>);

impl SharedProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an update, replacing the previous one.
    pub fn publish(&self, update: ProgressUpdate) {
        *self.0.lock() = Some(update);
    }

    /// Most recent update, if any has been published.
    pub fn latest(&self) -> Option<ProgressUpdate> {
        self.0.lock().clone()
    }

    /// A callback that publishes into this handle.
    pub fn callback(&self) -> impl FnMut(ProgressUpdate) + Send + 'static {
        let handle = self.clone();
        move |update| handle.publish(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(done: u64, total: u64) -> ProgressUpdate {
        ProgressUpdate {
            phase: Phase::TrackingVideo,
            current_frame: 0,
            total_frames: 0,
            units_done: done,
            units_total: total,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_fraction() {
        assert!((update(25, 100).fraction() - 0.25).abs() < 1e-12);
        assert_eq!(update(5, 0).fraction(), 0.0);
    }

    #[test]
    fn test_labels() {
        assert_eq!(Phase::CalculatingBackground.label(), "Calculating Background");
        assert_eq!(update(0, 1).label(), "Tracking Video");
    }

    #[test]
    fn test_meter_accumulates() {
        let mut meter = ProgressMeter::new(30);
        meter.advance(units::TRACKED_FRAME, Phase::TrackingVideo, 1, 3);
        let last = meter.advance(units::TRACKED_FRAME, Phase::TrackingVideo, 2, 3);
        assert_eq!(last.units_done, 20);
        assert_eq!(last.units_total, 30);
        assert_eq!(last.current_frame, 2);
    }

    #[test]
    fn test_cancel_handle() {
        let cancel = CancelToken::new();
        let other = cancel.clone();
        assert!(!cancel.is_cancelled());
        other.cancel();
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_shared_progress() {
        let shared = SharedProgress::new();
        assert!(shared.latest().is_none());
        let mut callback = shared.callback();
        callback(update(1, 10));
        callback(update(2, 10));
        assert_eq!(shared.latest().unwrap().units_done, 2);
    }
}

//! A complete tracking run over one video.
//!
//! The session owns its frame source and optional annotation sink for the
//! whole run and drops both on every exit path. The background is computed
//! once up front unless one is supplied.

use crate::annotate::annotate;
use crate::background::{compute_background_metered, Background, BackgroundOptions};
use crate::params::TrackingParameters;
use crate::progress::{units, CancelToken, Phase, ProgressMeter, ProgressUpdate};
use crate::result::TrackingResult;
use crate::tracker::PoseTracker;
use larvatrack_core::{Colours, Result, TrackError};
use larvatrack_media::{FrameSink, FrameSource};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Where the session's background comes from.
#[derive(Debug, Clone)]
pub enum BackgroundSource {
    /// Use a background computed or loaded elsewhere.
    Provided(Background),
    /// Compute one from the source before tracking.
    Compute(BackgroundOptions),
}

impl Default for BackgroundSource {
    fn default() -> Self {
        Self::Compute(BackgroundOptions::default())
    }
}

/// Requested frames: from `starting_frame`, `n_frames` of them (or to the
/// end of the video when `None`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    pub starting_frame: usize,
    pub n_frames: Option<usize>,
}

/// A correction made to a requested [`FrameRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeAdjustment {
    /// The start was past the end; the whole video is tracked instead.
    StartReset { requested: usize, frame_count: usize },
    /// Fewer frames were available than requested.
    CountClamped { requested: usize, tracked: usize },
}

impl fmt::Display for RangeAdjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartReset {
                requested,
                frame_count,
            } => write!(
                f,
                "starting frame {requested} is beyond the {frame_count}-frame video; tracking from frame 0"
            ),
            Self::CountClamped { requested, tracked } => {
                write!(f, "{requested} frames requested, {tracked} available")
            }
        }
    }
}

impl FrameRange {
    /// Every frame of the video.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(starting_frame: usize, n_frames: Option<usize>) -> Self {
        Self {
            starting_frame,
            n_frames,
        }
    }

    /// Fit the range to a video of `frame_count` frames.
    ///
    /// Returns `(start, count, adjustments)`. Out-of-range requests are
    /// corrected, never rejected.
    pub fn resolve(self, frame_count: usize) -> (usize, usize, Vec<RangeAdjustment>) {
        let mut adjustments = Vec::new();

        if self.starting_frame >= frame_count {
            adjustments.push(RangeAdjustment::StartReset {
                requested: self.starting_frame,
                frame_count,
            });
            return (0, frame_count, adjustments);
        }

        let available = frame_count - self.starting_frame;
        let count = match self.n_frames {
            Some(n) if n > available => {
                adjustments.push(RangeAdjustment::CountClamped {
                    requested: n,
                    tracked: available,
                });
                available
            }
            Some(n) => n,
            None => available,
        };
        (self.starting_frame, count, adjustments)
    }
}

/// One tracking run: source, background, parameters, range, optional
/// annotated output.
pub struct TrackingSession<S: FrameSource> {
    source: S,
    params: TrackingParameters,
    background: BackgroundSource,
    range: FrameRange,
    sink: Option<Box<dyn FrameSink>>,
    colours: Colours,
    background_output: Option<PathBuf>,
}

impl<S: FrameSource> TrackingSession<S> {
    /// A session tracking every frame, computing a brightest-pixel
    /// background, with the default palette.
    pub fn new(source: S, params: TrackingParameters) -> Self {
        Self {
            colours: Colours::for_tail_points(params.n_tail_points),
            source,
            params,
            background: BackgroundSource::default(),
            range: FrameRange::all(),
            sink: None,
            background_output: None,
        }
    }

    pub fn with_background(mut self, background: Background) -> Self {
        self.background = BackgroundSource::Provided(background);
        self
    }

    pub fn with_background_options(mut self, options: BackgroundOptions) -> Self {
        self.background = BackgroundSource::Compute(options);
        self
    }

    pub fn with_range(mut self, range: FrameRange) -> Self {
        self.range = range;
        self
    }

    /// Write one annotated frame per tracked frame to `sink`.
    pub fn with_sink(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_colours(mut self, colours: Colours) -> Self {
        self.colours = colours;
        self
    }

    /// Save a computed background as PNG at `path`.
    pub fn with_background_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.background_output = Some(path.into());
        self
    }

    pub fn params(&self) -> &TrackingParameters {
        &self.params
    }

    /// Reject anything that would fail before the first frame is read.
    fn validate(&self) -> Result<()> {
        self.params.validate()?;
        self.colours.check(self.params.n_tail_points)?;
        if self.source.frame_count() == 0 {
            return Err(TrackError::InvalidParameter("video has no frames".into()));
        }
        if self.range.n_frames == Some(0) {
            return Err(TrackError::InvalidParameter(
                "n_frames must be at least 1".into(),
            ));
        }
        match &self.background {
            BackgroundSource::Compute(options) => options.validate(),
            BackgroundSource::Provided(background) => {
                let expected = self.source.dimensions();
                if background.dimensions() == expected {
                    Ok(())
                } else {
                    Err(TrackError::DimensionMismatch {
                        expected,
                        actual: background.dimensions(),
                    })
                }
            }
        }
    }

    /// Run the session to completion.
    ///
    /// `progress` receives at most one update per frame, plus a final
    /// [`Phase::Complete`] update. `cancel` is checked before every frame;
    /// a cancelled run returns [`TrackError::Cancelled`] and leaves the sink
    /// unfinished.
    pub fn run(
        mut self,
        mut progress: impl FnMut(ProgressUpdate),
        cancel: &CancelToken,
    ) -> Result<TrackingResult> {
        self.validate()?;

        let frame_count = self.source.frame_count();
        let (width, height) = self.source.dimensions();
        let (start, count, mut adjustments) = self.range.resolve(frame_count);
        for adjustment in &adjustments {
            warn!(%adjustment, "Frame range corrected");
        }

        let background_units = match &self.background {
            BackgroundSource::Compute(options) => options.work_units(frame_count, width, height),
            BackgroundSource::Provided(_) => 0,
        };
        let mut meter = ProgressMeter::new(background_units + count as u64 * units::TRACKED_FRAME);

        info!(
            video = ?self.source.path(),
            method = %self.params.method,
            start,
            frames = count,
            "Starting tracking session"
        );

        let background = match std::mem::take(&mut self.background) {
            BackgroundSource::Provided(background) => background,
            BackgroundSource::Compute(options) => {
                let background = compute_background_metered(
                    &mut self.source,
                    &options,
                    &mut meter,
                    &mut progress,
                    cancel,
                )?;
                if let Some(path) = &self.background_output {
                    background.save_png(path)?;
                    info!(path = %path.display(), "Background saved");
                }
                background
            }
        };

        let mut tracker = PoseTracker::new(self.params.clone(), Some(&background))?;
        let mut poses = Vec::with_capacity(count);

        self.source.seek(start)?;
        for i in 0..count {
            if cancel.is_cancelled() {
                info!(frame = start + i, "Tracking cancelled");
                return Err(TrackError::Cancelled);
            }
            let Some(frame) = self.source.next_frame()? else {
                let adjustment = RangeAdjustment::CountClamped {
                    requested: count,
                    tracked: i,
                };
                warn!(%adjustment, "Video ended before the requested range");
                adjustments.push(adjustment);
                break;
            };

            let outcome = tracker.process(&frame)?;
            if let Some(sink) = self.sink.as_mut() {
                sink.write_frame(&annotate(&frame, outcome.pose(), &self.colours)?)?;
            }
            poses.push(outcome.into_pose());

            progress(meter.advance(units::TRACKED_FRAME, Phase::TrackingVideo, i + 1, count));
        }

        if let Some(mut sink) = self.sink.take() {
            sink.finish()?;
            debug!("Annotated output finished");
        }

        let stats = tracker.stats();
        info!(
            fresh = stats.fresh,
            reused = stats.reused,
            degraded = stats.degraded,
            "Tracking complete"
        );
        progress(meter.advance(0, Phase::Complete, poses.len(), count));

        Ok(TrackingResult {
            poses,
            video_path: self.source.path().map(|p| p.to_path_buf()),
            video_n_frames: frame_count,
            frame_rate: self.source.frame_rate(),
            starting_frame: start,
            params: self.params,
            colours: self.colours,
            stats,
            adjustments,
        })
    }
}

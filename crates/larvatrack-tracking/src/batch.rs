//! Tracking several videos in parallel.
//!
//! Each [`VideoJob`] is an immutable record; jobs share nothing except the
//! aggregate progress counters and the cancel token. Frames within one video
//! are still processed strictly in order.

use crate::background::{Background, BackgroundOptions};
use crate::params::TrackingParameters;
use crate::progress::{CancelToken, ProgressUpdate};
use crate::result::{TrackingRecord, TrackingResult};
use crate::session::{FrameRange, TrackingSession};
use larvatrack_core::{Result, TrackError};
use larvatrack_media::{FrameSource, VideoCodec, VideoDecoder, VideoWriter};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{info, warn};

/// Background for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobBackground {
    Compute(BackgroundOptions),
    /// Load a previously saved PNG.
    Load(PathBuf),
}

impl Default for JobBackground {
    fn default() -> Self {
        Self::Compute(BackgroundOptions::default())
    }
}

/// Everything needed to track one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoJob {
    pub video: PathBuf,
    #[serde(default)]
    pub params: TrackingParameters,
    #[serde(default)]
    pub background: JobBackground,
    #[serde(default)]
    pub range: FrameRange,
    /// Where to write the results record.
    #[serde(default)]
    pub results_path: Option<PathBuf>,
    /// Where to write an annotated copy of the tracked frames.
    #[serde(default)]
    pub annotated_video: Option<PathBuf>,
}

impl VideoJob {
    /// A job with default parameters, writing results beside the video.
    pub fn new(video: impl Into<PathBuf>) -> Self {
        let video = video.into();
        Self {
            results_path: Some(TrackingRecord::default_path(&video)),
            video,
            params: TrackingParameters::default(),
            background: JobBackground::default(),
            range: FrameRange::all(),
            annotated_video: None,
        }
    }

    pub fn with_params(mut self, params: TrackingParameters) -> Self {
        self.params = params;
        self
    }

    pub fn with_background(mut self, background: JobBackground) -> Self {
        self.background = background;
        self
    }

    pub fn with_range(mut self, range: FrameRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_results_path(mut self, path: Option<PathBuf>) -> Self {
        self.results_path = path;
        self
    }

    pub fn with_annotated_video(mut self, path: impl Into<PathBuf>) -> Self {
        self.annotated_video = Some(path.into());
        self
    }
}

/// Aggregate progress over every job in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub jobs_started: usize,
    pub jobs_finished: usize,
    pub jobs_total: usize,
    /// Work units done across all jobs.
    pub units_done: u64,
    /// Work units of every job that has started so far.
    pub units_known: u64,
}

impl BatchProgress {
    /// Completion estimate (0.0 to 1.0). Jobs that have not started count
    /// as not done.
    pub fn fraction(&self) -> f64 {
        if self.jobs_total == 0 {
            return 1.0;
        }
        if self.units_known == 0 {
            return self.jobs_finished as f64 / self.jobs_total as f64;
        }
        let started = self.jobs_started as f64 / self.jobs_total as f64;
        (self.units_done as f64 / self.units_known as f64).min(1.0) * started
    }
}

/// Outcome of one job.
#[derive(Debug)]
pub struct JobOutcome {
    pub video: PathBuf,
    pub result: Result<TrackingResult>,
}

#[derive(Default)]
struct Counters {
    jobs_started: AtomicUsize,
    units_done: AtomicU64,
    units_known: AtomicU64,
    jobs_finished: AtomicUsize,
}

impl Counters {
    fn snapshot(&self, jobs_total: usize) -> BatchProgress {
        BatchProgress {
            jobs_started: self.jobs_started.load(Ordering::SeqCst),
            jobs_finished: self.jobs_finished.load(Ordering::SeqCst),
            jobs_total,
            units_done: self.units_done.load(Ordering::SeqCst),
            units_known: self.units_known.load(Ordering::SeqCst),
        }
    }
}

/// Track every job, decoding videos with FFmpeg.
///
/// Returns one outcome per job, in job order. A failing job does not stop
/// the others; cancelling stops all of them.
pub fn run_batch(
    jobs: &[VideoJob],
    progress: impl Fn(BatchProgress) + Send + Sync,
    cancel: &CancelToken,
) -> Vec<JobOutcome> {
    run_batch_with(jobs, |job| VideoDecoder::open(&job.video), progress, cancel)
}

/// [`run_batch`] with a caller-supplied way of opening each job's video.
pub fn run_batch_with<S, F>(
    jobs: &[VideoJob],
    open: F,
    progress: impl Fn(BatchProgress) + Send + Sync,
    cancel: &CancelToken,
) -> Vec<JobOutcome>
where
    S: FrameSource,
    F: Fn(&VideoJob) -> Result<S> + Send + Sync,
{
    let counters = Counters::default();
    let jobs_total = jobs.len();
    info!(jobs = jobs_total, "Starting batch");

    let outcomes: Vec<JobOutcome> = jobs
        .par_iter()
        .map(|job| {
            let mut reported = 0u64;
            let mut started = false;
            let on_update = |update: ProgressUpdate| {
                if !started {
                    counters.jobs_started.fetch_add(1, Ordering::SeqCst);
                    counters.units_known.fetch_add(update.units_total, Ordering::SeqCst);
                    started = true;
                }
                counters
                    .units_done
                    .fetch_add(update.units_done - reported, Ordering::SeqCst);
                reported = update.units_done;
                progress(counters.snapshot(jobs_total));
            };

            let result = open(job).and_then(|source| run_job(job, source, on_update, cancel));
            match &result {
                Ok(r) => info!(video = %job.video.display(), frames = r.len(), "Job finished"),
                Err(e) => warn!(video = %job.video.display(), error = %e, "Job failed"),
            }
            counters.jobs_finished.fetch_add(1, Ordering::SeqCst);
            progress(counters.snapshot(jobs_total));

            JobOutcome {
                video: job.video.clone(),
                result,
            }
        })
        .collect();

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    info!(jobs = jobs_total, failed, "Batch complete");
    outcomes
}

fn run_job<S: FrameSource>(
    job: &VideoJob,
    source: S,
    progress: impl FnMut(ProgressUpdate),
    cancel: &CancelToken,
) -> Result<TrackingResult> {
    let frame_rate = source.frame_rate();
    let mut session = TrackingSession::new(source, job.params.clone()).with_range(job.range);
    session = match &job.background {
        JobBackground::Compute(options) => session.with_background_options(options.clone()),
        JobBackground::Load(path) => session.with_background(Background::load(path)?),
    };
    if let Some(path) = &job.annotated_video {
        session = session.with_sink(Box::new(VideoWriter::new(
            path,
            frame_rate,
            VideoCodec::default(),
        )));
    }

    let result = session.run(progress, cancel)?;
    if let Some(path) = &job.results_path {
        result.to_record().save(path)?;
    }
    Ok(result)
}

/// Load a list of jobs from a JSON array.
pub fn load_jobs(path: &Path) -> Result<Vec<VideoJob>> {
    let json = std::fs::read_to_string(path)?;
    serde_json::from_str(&json)
        .map_err(|e| TrackError::Serialization(format!("{}: {e}", path.display())))
}

//! Subcommand implementations.

use crate::worker::{run_on_worker, ProgressLine};
use crate::{BackgroundArgs, TrackArgs};
use anyhow::{Context, Result};
use larvatrack_media::{FrameSource, MediaProbe, VideoDecoder, VideoWriter};
use larvatrack_tracking::{
    compute_background, load_jobs, run_batch, Background, BackgroundOptions, CancelToken,
    FrameRange, TrackingParameters, TrackingRecord, TrackingSession,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

impl BackgroundArgs {
    fn options(&self) -> BackgroundOptions {
        let mut options = BackgroundOptions::new(self.method).with_frame_stride(self.stride);
        if let Some((width, height)) = self.chunk {
            options = options.with_chunk_size(width, height);
        }
        options
    }
}

pub fn background(video: &Path, args: &BackgroundArgs, output: Option<PathBuf>) -> Result<()> {
    let options = args.options();
    options.validate()?;
    let output = output.unwrap_or_else(|| Background::default_path(video));
    let video = video.to_path_buf();

    let mut line = ProgressLine::new();
    let background = run_on_worker(
        "background",
        move |tx| {
            let mut source = VideoDecoder::open(&video)?;
            compute_background(
                &mut source,
                &options,
                |update| {
                    tx.send(update).ok();
                },
                &CancelToken::new(),
            )
        },
        |update| line.update(update.label(), update.fraction()),
    )?;
    line.finish();

    background
        .save_png(&output)
        .with_context(|| format!("failed to save {}", output.display()))?;
    info!(path = %output.display(), "Background saved");
    Ok(())
}

fn tracking_parameters(args: &TrackArgs) -> Result<TrackingParameters> {
    let mut params = match &args.params {
        Some(path) => TrackingParameters::load(path)
            .with_context(|| format!("failed to load parameters from {}", path.display()))?,
        None => TrackingParameters::default(),
    };
    if let Some(method) = args.method {
        params.method = method;
    }
    if let Some(polarity) = args.initial_pixel_search {
        params.initial_pixel_search = polarity;
    }
    if let Some(n) = args.n_tail_points {
        params.n_tail_points = n;
    }
    if args.extended_eyes {
        params.extended_eyes_calculation = true;
    }
    params.validate()?;
    Ok(params)
}

pub fn track(args: TrackArgs) -> Result<()> {
    let params = tracking_parameters(&args)?;
    let background = match &args.background {
        Some(path) => Some(
            Background::load(path)
                .with_context(|| format!("failed to load background {}", path.display()))?,
        ),
        None => None,
    };
    let options = args.background_options.options();
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| TrackingRecord::default_path(&args.video));
    let background_output = args
        .save_background
        .then(|| Background::default_path(&args.video));
    let range = FrameRange::new(args.start, args.frames);
    let video = args.video.clone();
    let annotated = args.annotated.clone();
    let codec = args.codec;

    let mut line = ProgressLine::new();
    let result = run_on_worker(
        "tracking",
        move |tx| {
            let source = VideoDecoder::open(&video)?;
            let frame_rate = source.frame_rate();
            let mut session = TrackingSession::new(source, params).with_range(range);
            session = match background {
                Some(background) => session.with_background(background),
                None => session.with_background_options(options),
            };
            if let Some(path) = background_output {
                session = session.with_background_output(path);
            }
            if let Some(path) = annotated {
                session = session.with_sink(Box::new(VideoWriter::new(path, frame_rate, codec)));
            }
            session.run(
                |update| {
                    tx.send(update).ok();
                },
                &CancelToken::new(),
            )
        },
        |update| line.update(update.label(), update.fraction()),
    )?;
    line.finish();

    for adjustment in &result.adjustments {
        warn!(%adjustment, "Frame range was corrected");
    }
    result
        .to_record()
        .save(&output)
        .with_context(|| format!("failed to save {}", output.display()))?;
    info!(
        path = %output.display(),
        frames = result.len(),
        fresh = result.stats.fresh,
        reused = result.stats.reused,
        degraded = result.stats.degraded,
        "Results saved"
    );
    Ok(())
}

pub fn batch(jobs_path: &Path) -> Result<()> {
    let jobs = load_jobs(jobs_path)
        .with_context(|| format!("failed to load jobs from {}", jobs_path.display()))?;
    let total = jobs.len();

    let mut line = ProgressLine::new();
    let outcomes = run_on_worker(
        "batch",
        move |tx| {
            Ok(run_batch(
                &jobs,
                |progress| {
                    tx.send(progress).ok();
                },
                &CancelToken::new(),
            ))
        },
        |progress| line.update("Batch", progress.fraction()),
    )?;
    line.finish();

    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(result) => info!(video = %outcome.video.display(), frames = result.len(), "Tracked"),
            Err(e) => {
                failed += 1;
                warn!(video = %outcome.video.display(), category = ?e.category(), error = %e, "Failed");
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {total} videos failed");
    }
    Ok(())
}

pub fn probe(video: &Path) -> Result<()> {
    let probe = MediaProbe::probe(video)?;
    println!("{}", serde_json::to_string_pretty(&probe)?);
    if !probe.has_video() {
        anyhow::bail!("{} has no video stream", video.display());
    }
    Ok(())
}

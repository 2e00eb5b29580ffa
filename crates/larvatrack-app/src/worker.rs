//! Long-running work on a dedicated thread, with progress sent back over a
//! channel so the main thread only prints.

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{unbounded, Sender};
use std::io::Write;

/// Run `work` on a named worker thread, handing every message it sends to
/// `on_progress` on the calling thread. Returns once the worker finishes.
pub fn run_on_worker<T, M, W>(name: &str, work: W, mut on_progress: impl FnMut(M)) -> Result<T>
where
    T: Send + 'static,
    M: Send + 'static,
    W: FnOnce(Sender<M>) -> larvatrack_core::Result<T> + Send + 'static,
{
    let (sender, receiver) = unbounded::<M>();
    let handle = std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || work(sender))
        .context("failed to spawn worker thread")?;

    // Ends when the worker drops its sender
    for message in receiver.iter() {
        on_progress(message);
    }

    let result = handle
        .join()
        .map_err(|_| anyhow!("{name} worker panicked"))?;
    Ok(result?)
}

/// One-line percentage display on stderr.
#[derive(Debug, Default)]
pub struct ProgressLine {
    shown: Option<(String, u32)>,
}

impl ProgressLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `fraction` under `label`, redrawing only when the whole percent
    /// or the label changes.
    pub fn update(&mut self, label: &str, fraction: f64) {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0).floor() as u32;
        match &self.shown {
            Some((shown, p)) if shown == label && *p == percent => return,
            Some((shown, _)) if shown != label => eprintln!(),
            _ => {}
        }
        eprint!("\r{label}: {percent:>3}%");
        std::io::stderr().flush().ok();
        self.shown = Some((label.to_string(), percent));
    }

    /// End the line, if anything was drawn.
    pub fn finish(&mut self) {
        if self.shown.take().is_some() {
            eprintln!();
        }
    }
}

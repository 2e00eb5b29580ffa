//! Background estimation.
//!
//! Reduces the sampled frames of a video to one static grayscale image,
//! either as a running per-pixel extremum or as a per-pixel mode. The modal
//! reducer keeps a 256-bin histogram per pixel, so the frame is split into
//! tiles and the video is re-read once per tile to bound memory.

use crate::progress::{units, CancelToken, Phase, ProgressMeter, ProgressUpdate};
use larvatrack_core::{FrameBuffer, PixelFormat, PixelRect, Result, TrackError};
use larvatrack_media::FrameSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// How sampled frames are reduced to a background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundMethod {
    /// Per-pixel maximum, for dark animals on a bright field.
    #[default]
    Brightest,
    /// Per-pixel minimum, for bright animals on a dark field.
    Darkest,
    /// Per-pixel most frequent value.
    Modal,
}

impl BackgroundMethod {
    /// Units charged per frame read.
    pub fn units_per_frame(self) -> u64 {
        match self {
            Self::Brightest | Self::Darkest => units::EXTREMUM_BACKGROUND_FRAME,
            Self::Modal => units::MODAL_BACKGROUND_FRAME,
        }
    }
}

impl FromStr for BackgroundMethod {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "brightest" => Ok(Self::Brightest),
            "darkest" => Ok(Self::Darkest),
            "modal" | "mode" => Ok(Self::Modal),
            other => Err(TrackError::InvalidParameter(format!(
                "unknown background method {other:?} (expected brightest, darkest or modal)"
            ))),
        }
    }
}

impl fmt::Display for BackgroundMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Brightest => "brightest",
            Self::Darkest => "darkest",
            Self::Modal => "modal",
        })
    }
}

/// Configuration for a background calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundOptions {
    pub method: BackgroundMethod,
    /// Tile `(width, height)` for the modal reducer; `None` uses the whole
    /// frame as one tile.
    pub chunk_size: Option<(u32, u32)>,
    /// Use every `frame_stride`-th frame, starting at frame 0.
    pub frame_stride: usize,
}

impl Default for BackgroundOptions {
    fn default() -> Self {
        Self {
            method: BackgroundMethod::Brightest,
            chunk_size: None,
            frame_stride: 1,
        }
    }
}

impl BackgroundOptions {
    pub fn new(method: BackgroundMethod) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    pub fn with_chunk_size(mut self, width: u32, height: u32) -> Self {
        self.chunk_size = Some((width, height));
        self
    }

    pub fn with_frame_stride(mut self, stride: usize) -> Self {
        self.frame_stride = stride;
        self
    }

    /// Reject unusable options before any frame is read.
    pub fn validate(&self) -> Result<()> {
        if self.frame_stride == 0 {
            return Err(TrackError::InvalidParameter(
                "frame stride must be at least 1".into(),
            ));
        }
        if let Some((w, h)) = self.chunk_size {
            if w == 0 || h == 0 {
                return Err(TrackError::InvalidParameter(format!(
                    "chunk size must be positive, got {w}x{h}"
                )));
            }
        }
        Ok(())
    }

    /// Number of frames sampled from a video of `frame_count` frames.
    pub fn sampled_frames(&self, frame_count: usize) -> usize {
        frame_count.div_ceil(self.frame_stride.max(1))
    }

    /// Tiles covering a `width` x `height` frame.
    pub fn tiles(&self, width: u32, height: u32) -> Vec<PixelRect> {
        match (self.method, self.chunk_size) {
            (BackgroundMethod::Modal, Some((tw, th))) => PixelRect::tiles(width, height, tw, th),
            _ => vec![PixelRect::new(0, 0, width, height)],
        }
    }

    /// Total progress units the calculation will charge.
    pub fn work_units(&self, frame_count: usize, width: u32, height: u32) -> u64 {
        let passes = self.tiles(width, height).len() as u64;
        passes * self.sampled_frames(frame_count) as u64 * self.method.units_per_frame()
    }
}

/// A computed background image (`Gray8`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Background {
    frame: FrameBuffer,
}

impl Background {
    /// Wrap a frame, converting it to grayscale.
    pub fn new(frame: FrameBuffer) -> Self {
        Self {
            frame: frame.to_gray(),
        }
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn into_frame(self) -> FrameBuffer {
        self.frame
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.frame.dimensions()
    }

    /// `<dir>/<video stem>_background.png` next to the video.
    pub fn default_path(video: &Path) -> PathBuf {
        let stem = video
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".into());
        video.with_file_name(format!("{stem}_background.png"))
    }

    /// Save as an 8-bit grayscale PNG.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        let (width, height) = self.frame.dimensions();
        let image = image::GrayImage::from_raw(width, height, self.frame.data().to_vec())
            .ok_or_else(|| TrackError::Image("background buffer has the wrong size".into()))?;
        image
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| TrackError::Image(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), "Background saved");
        Ok(())
    }

    /// Load a background image, converting it to grayscale.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TrackError::NotFound(format!(
                "background image not found: {}",
                path.display()
            )));
        }
        let image = image::open(path)
            .map_err(|e| TrackError::Image(format!("{}: {e}", path.display())))?
            .into_luma8();
        let (width, height) = image.dimensions();
        let frame = FrameBuffer::from_raw(width, height, PixelFormat::Gray8, image.into_raw())?;
        Ok(Self { frame })
    }
}

/// Compute the background of `source`.
///
/// `progress` is called once per frame read; `cancel` is checked before each
/// read. Read failures abort with [`TrackError::Background`]; nothing partial
/// is returned.
pub fn compute_background<S: FrameSource + ?Sized>(
    source: &mut S,
    options: &BackgroundOptions,
    mut progress: impl FnMut(ProgressUpdate),
    cancel: &CancelToken,
) -> Result<Background> {
    options.validate()?;
    let (width, height) = source.dimensions();
    let mut meter = ProgressMeter::new(options.work_units(source.frame_count(), width, height));
    compute_background_metered(source, options, &mut meter, &mut progress, cancel)
}

/// [`compute_background`] charging progress to an existing meter.
pub(crate) fn compute_background_metered<S: FrameSource + ?Sized>(
    source: &mut S,
    options: &BackgroundOptions,
    meter: &mut ProgressMeter,
    progress: &mut dyn FnMut(ProgressUpdate),
    cancel: &CancelToken,
) -> Result<Background> {
    options.validate()?;
    let frame_count = source.frame_count();
    if frame_count == 0 {
        return Err(TrackError::InvalidParameter("video has no frames".into()));
    }

    let (width, height) = source.dimensions();
    let tiles = options.tiles(width, height);
    let sampled = options.sampled_frames(frame_count);
    info!(
        method = %options.method,
        frames = frame_count,
        sampled,
        tiles = tiles.len(),
        "Calculating background"
    );

    let mut reader = SampleReader {
        source,
        options,
        meter,
        progress,
        cancel,
        total_reads: tiles.len() * sampled,
        reads: 0,
    };

    let result = match options.method {
        BackgroundMethod::Brightest | BackgroundMethod::Darkest => reader.extremum(),
        BackgroundMethod::Modal => reader.modal(&tiles),
    };

    result.map_err(|e| match e {
        TrackError::Cancelled | TrackError::Background(_) => e,
        other => TrackError::Background(other.to_string()),
    })
}

/// Walks the sampled frames of a source, charging progress per read.
struct SampleReader<'a, S: FrameSource + ?Sized> {
    source: &'a mut S,
    options: &'a BackgroundOptions,
    meter: &'a mut ProgressMeter,
    progress: &'a mut dyn FnMut(ProgressUpdate),
    cancel: &'a CancelToken,
    total_reads: usize,
    reads: usize,
}

impl<S: FrameSource + ?Sized> SampleReader<'_, S> {
    /// Rewind and call `visit` with every sampled frame, as grayscale.
    fn pass(&mut self, mut visit: impl FnMut(&FrameBuffer) -> Result<()>) -> Result<()> {
        let stride = self.options.frame_stride;
        let frame_count = self.source.frame_count();
        let last_sampled = (frame_count - 1) / stride * stride;
        let expected = self.source.dimensions();

        self.source.seek(0)?;
        for index in 0..=last_sampled {
            if index % stride == 0 && self.cancel.is_cancelled() {
                info!(frame = index, "Background calculation cancelled");
                return Err(TrackError::Cancelled);
            }
            let frame = self
                .source
                .next_frame()?
                .ok_or_else(|| TrackError::Background(format!("video ended before frame {index}")))?;
            if index % stride != 0 {
                continue;
            }
            if frame.dimensions() != expected {
                return Err(TrackError::DimensionMismatch {
                    expected,
                    actual: frame.dimensions(),
                });
            }

            visit(&frame.to_gray())?;

            self.reads += 1;
            let update = self.meter.advance(
                self.options.method.units_per_frame(),
                Phase::CalculatingBackground,
                self.reads,
                self.total_reads,
            );
            (self.progress)(update);
        }
        Ok(())
    }

    fn extremum(&mut self) -> Result<Background> {
        let brighter = self.options.method == BackgroundMethod::Brightest;
        let mut acc: Option<Vec<u8>> = None;

        self.pass(|frame| {
            match acc.as_mut() {
                None => acc = Some(frame.data().to_vec()),
                Some(acc) => {
                    for (bg, &v) in acc.iter_mut().zip(frame.data()) {
                        if (brighter && v > *bg) || (!brighter && v < *bg) {
                            *bg = v;
                        }
                    }
                }
            }
            Ok(())
        })?;

        let (width, height) = self.source.dimensions();
        let data = acc.ok_or_else(|| TrackError::Background("no frames were sampled".into()))?;
        Ok(Background::new(FrameBuffer::from_raw(
            width,
            height,
            PixelFormat::Gray8,
            data,
        )?))
    }

    fn modal(&mut self, tiles: &[PixelRect]) -> Result<Background> {
        let (width, height) = self.source.dimensions();
        let mut out = FrameBuffer::new(width, height, PixelFormat::Gray8);

        for (i, &tile) in tiles.iter().enumerate() {
            debug!(tile = i, x = tile.x, y = tile.y, w = tile.width, h = tile.height, "Modal tile");
            let mut counts = vec![[0u32; 256]; tile.area()];

            self.pass(|frame| {
                let data = frame.data();
                for ty in 0..tile.height as usize {
                    let row = (tile.y as usize + ty) * width as usize + tile.x as usize;
                    let hist_row = ty * tile.width as usize;
                    for tx in 0..tile.width as usize {
                        counts[hist_row + tx][data[row + tx] as usize] += 1;
                    }
                }
                Ok(())
            })?;

            for ty in 0..tile.height {
                for tx in 0..tile.width {
                    let hist = &counts[(ty * tile.width + tx) as usize];
                    out.set(tile.x + tx, tile.y + ty, mode(hist));
                }
            }
        }
        Ok(Background::new(out))
    }
}

/// Most frequent value; ties go to the lowest intensity.
fn mode(hist: &[u32; 256]) -> u8 {
    let mut best = 0usize;
    for (value, &count) in hist.iter().enumerate().skip(1) {
        if count > hist[best] {
            best = value;
        }
    }
    best as u8
}

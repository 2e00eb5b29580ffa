//! Frame sinks for annotated output video.
//!
//! Uses FFmpeg via a piped subprocess for encoding: raw RGB frames are
//! written to its stdin.

use larvatrack_core::{FrameBuffer, FrameRate, Result, TrackError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Destination for rendered frames.
pub trait FrameSink: Send {
    /// Append one frame. All frames must share the same dimensions.
    fn write_frame(&mut self, frame: &FrameBuffer) -> Result<()>;

    /// Flush and close the output. Frames written after this are an error.
    fn finish(&mut self) -> Result<()>;
}

/// Output video codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    #[default]
    H264,
    Mjpeg,
    /// Lossless FFV1, for archiving annotated output.
    Ffv1,
}

impl VideoCodec {
    /// FFmpeg encoder name.
    pub fn ffmpeg_encoder(self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::Mjpeg => "mjpeg",
            Self::Ffv1 => "ffv1",
        }
    }

    /// File extension for this codec.
    pub fn extension(self) -> &'static str {
        match self {
            Self::H264 => "mp4",
            Self::Mjpeg | Self::Ffv1 => "avi",
        }
    }

    /// Output pixel format for a frame size. yuv420p needs even dimensions.
    fn pixel_format(self, width: u32, height: u32) -> &'static str {
        match self {
            Self::H264 if width % 2 == 0 && height % 2 == 0 => "yuv420p",
            Self::H264 => "yuv444p",
            Self::Mjpeg => "yuvj444p",
            Self::Ffv1 => "rgb24",
        }
    }
}

impl FromStr for VideoCodec {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "h264" | "x264" => Ok(Self::H264),
            "mjpeg" => Ok(Self::Mjpeg),
            "ffv1" => Ok(Self::Ffv1),
            other => Err(TrackError::UnsupportedFormat(format!(
                "unknown codec '{other}' (expected h264, mjpeg or ffv1)"
            ))),
        }
    }
}

/// Writes frames to a video file through an FFmpeg subprocess.
///
/// The process is started lazily on the first frame, since the frame size
/// is only known then.
pub struct VideoWriter {
    output_path: PathBuf,
    frame_rate: FrameRate,
    codec: VideoCodec,
    size: Option<(u32, u32)>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    frames_written: usize,
    finished: bool,
}

impl VideoWriter {
    /// Create a writer for `output_path`.
    pub fn new(output_path: impl Into<PathBuf>, frame_rate: FrameRate, codec: VideoCodec) -> Self {
        Self {
            output_path: output_path.into(),
            frame_rate,
            codec,
            size: None,
            child: None,
            stdin: None,
            frames_written: 0,
            finished: false,
        }
    }

    /// Output file path.
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Number of frames accepted so far.
    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Build the FFmpeg command arguments for a frame size.
    pub fn ffmpeg_args(&self, width: u32, height: u32) -> Vec<String> {
        vec![
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pixel_format".into(),
            "rgb24".into(),
            "-video_size".into(),
            format!("{}x{}", width, height),
            "-framerate".into(),
            format!("{}/{}", self.frame_rate.numerator, self.frame_rate.denominator),
            "-i".into(),
            "pipe:0".into(),
            "-c:v".into(),
            self.codec.ffmpeg_encoder().into(),
            "-pix_fmt".into(),
            self.codec.pixel_format(width, height).into(),
            self.output_path.to_string_lossy().into_owned(),
        ]
    }

    fn start(&mut self, width: u32, height: u32) -> Result<()> {
        let args = self.ffmpeg_args(width, height);
        debug!(args = ?args, "Starting ffmpeg encoder");
        let mut child = Command::new(ffmpeg_sidecar::paths::ffmpeg_path())
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TrackError::Encoder(format!("Failed to spawn ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TrackError::Encoder("Failed to open ffmpeg stdin".into()))?;

        self.size = Some((width, height));
        self.child = Some(child);
        self.stdin = Some(stdin);
        Ok(())
    }

    fn abort(&mut self) {
        self.stdin = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl FrameSink for VideoWriter {
    fn write_frame(&mut self, frame: &FrameBuffer) -> Result<()> {
        if self.finished {
            return Err(TrackError::Encoder("writer already finished".into()));
        }
        let (width, height) = frame.dimensions();
        match self.size {
            None => self.start(width, height)?,
            Some(expected) if expected != (width, height) => {
                return Err(TrackError::DimensionMismatch {
                    expected,
                    actual: (width, height),
                });
            }
            Some(_) => {}
        }

        let rgb = frame.to_rgb();
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| TrackError::Encoder("ffmpeg stdin closed".into()))?;
        stdin
            .write_all(rgb.data())
            .map_err(|e| TrackError::Encoder(format!("Failed to write frame: {e}")))?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        // Close stdin to signal end-of-stream
        self.stdin = None;
        let Some(child) = self.child.take() else {
            warn!(path = %self.output_path.display(), "No frames written; no video produced");
            return Ok(());
        };

        let output = child
            .wait_with_output()
            .map_err(|e| TrackError::Encoder(format!("Failed to wait for ffmpeg: {e}")))?;
        if !output.status.success() {
            return Err(TrackError::Encoder(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        info!(
            path = %self.output_path.display(),
            frames = self.frames_written,
            "Annotated video written"
        );
        Ok(())
    }
}

impl Drop for VideoWriter {
    fn drop(&mut self) {
        if !self.finished && self.child.is_some() {
            warn!(path = %self.output_path.display(), "Video writer dropped before finish; output discarded");
            self.abort();
        }
    }
}

/// In-memory sink that keeps every frame it receives.
///
/// Clones share the same storage, so a handle kept by the caller sees the
/// frames written through a boxed clone.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    frames: Arc<Mutex<Vec<FrameBuffer>>>,
    finished: Arc<Mutex<bool>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the frames written so far.
    pub fn frames(&self) -> Vec<FrameBuffer> {
        self.frames.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    /// Whether `finish` has been called.
    pub fn is_finished(&self) -> bool {
        *self.finished.lock()
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &FrameBuffer) -> Result<()> {
        if self.is_finished() {
            return Err(TrackError::Encoder("sink already finished".into()));
        }
        let mut frames = self.frames.lock();
        if let Some(first) = frames.first() {
            first.ensure_same_size(frame)?;
        }
        frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        *self.finished.lock() = true;
        Ok(())
    }
}

//! Video decoder using FFmpeg via ffmpeg-sidecar.

use crate::probe::MediaProbe;
use crate::source::FrameSource;
use ffmpeg_sidecar::child::FfmpegChild;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};
use ffmpeg_sidecar::iter::FfmpegIterator;
use larvatrack_core::{FrameBuffer, FrameRate, PixelFormat, Result, TrackError};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A running FFmpeg process streaming raw frames from some start index.
struct Stream {
    child: FfmpegChild,
    events: FfmpegIterator,
}

impl Stream {
    fn spawn(path: &Path, start: usize) -> Result<Self> {
        let mut command = FfmpegCommand::new();
        command.hide_banner().input(path);
        if start > 0 {
            // select on the decoded frame number keeps the seek frame-exact
            command.arg("-vf").arg(format!("select=gte(n\\,{start})"));
        }
        command.args(["-vsync", "passthrough"]).rawvideo();

        let mut child = command
            .spawn()
            .map_err(|e| TrackError::Decoder(format!("Failed to spawn ffmpeg: {e}")))?;
        let events = child
            .iter()
            .map_err(|e| TrackError::Decoder(format!("Failed to read ffmpeg output: {e}")))?;
        Ok(Self { child, events })
    }

    fn stop(mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Video decoder using FFmpeg.
///
/// Spawns FFmpeg as a subprocess and reads decoded RGB frames from its
/// stdout, converting each to 8-bit grayscale. Seeking restarts the
/// subprocess at the requested frame.
pub struct VideoDecoder {
    path: PathBuf,
    width: u32,
    height: u32,
    frame_rate: FrameRate,
    frame_count: usize,
    current_frame: usize,
    stream: Option<Stream>,
}

impl VideoDecoder {
    /// Open a video file for decoding.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let probe = MediaProbe::probe(path)?;
        let stream = probe
            .video
            .ok_or_else(|| TrackError::UnsupportedFormat(format!("{} has no video stream", path.display())))?;

        info!(
            path = %path.display(),
            width = stream.width,
            height = stream.height,
            frames = stream.frame_count,
            fps = %stream.frame_rate,
            "Opened video file"
        );

        Ok(Self {
            path: path.to_path_buf(),
            width: stream.width,
            height: stream.height,
            frame_rate: stream.frame_rate,
            frame_count: stream.frame_count,
            current_frame: 0,
            stream: None,
        })
    }

    /// Index of the next frame to be decoded.
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    fn take_stream(&mut self) -> Result<Stream> {
        match self.stream.take() {
            Some(stream) => Ok(stream),
            None => {
                debug!(start = self.current_frame, "Starting ffmpeg decode stream");
                Stream::spawn(&self.path, self.current_frame)
            }
        }
    }
}

impl FrameSource for VideoDecoder {
    fn frame_count(&self) -> usize {
        self.frame_count
    }

    fn frame_rate(&self) -> FrameRate {
        self.frame_rate
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn seek(&mut self, index: usize) -> Result<()> {
        if index >= self.frame_count {
            return Err(TrackError::InvalidParameter(format!(
                "Frame {} out of range (0-{})",
                index,
                self.frame_count.saturating_sub(1)
            )));
        }
        if index != self.current_frame || self.stream.is_none() {
            if let Some(stream) = self.stream.take() {
                stream.stop();
            }
            self.current_frame = index;
        }
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<FrameBuffer>> {
        if self.current_frame >= self.frame_count {
            return Ok(None);
        }
        let index = self.current_frame;
        let (width, height) = (self.width, self.height);
        let mut stream = self.take_stream()?;

        while let Some(event) = stream.events.next() {
            match event {
                FfmpegEvent::OutputFrame(frame) => {
                    if frame.width != width || frame.height != height {
                        stream.stop();
                        return Err(TrackError::DimensionMismatch {
                            expected: (width, height),
                            actual: (frame.width, frame.height),
                        });
                    }
                    let rgb = FrameBuffer::from_raw(width, height, PixelFormat::Rgb8, frame.data)?;
                    self.current_frame += 1;
                    self.stream = Some(stream);
                    return Ok(Some(rgb.to_gray()));
                }
                FfmpegEvent::Error(message) | FfmpegEvent::Log(LogLevel::Fatal, message) => {
                    stream.stop();
                    return Err(TrackError::Decoder(format!("frame {index}: {message}")));
                }
                FfmpegEvent::Log(LogLevel::Error, message) => {
                    warn!(frame = index, "ffmpeg: {}", message);
                }
                FfmpegEvent::Done => break,
                _ => {}
            }
        }

        warn!(frame = index, expected = self.frame_count, "Video ended early");
        self.frame_count = index;
        stream.stop();
        Ok(None)
    }
}

impl Drop for VideoDecoder {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.stop();
        }
    }
}

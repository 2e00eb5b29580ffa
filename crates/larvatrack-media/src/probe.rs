//! Media file probing to get metadata without full decode.

use larvatrack_core::{FrameRate, Result, TrackError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Information about a media file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaProbe {
    /// File path
    pub path: String,
    /// First video stream, if any
    pub video: Option<VideoStreamInfo>,
}

/// Information about a video stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    pub frame_count: usize,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    #[serde(default)]
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    r_frame_rate: Option<String>,
    #[serde(default)]
    avg_frame_rate: Option<String>,
    #[serde(default)]
    nb_frames: Option<String>,
    #[serde(default)]
    nb_read_packets: Option<String>,
}

impl MediaProbe {
    /// Probe a media file with ffprobe.
    pub fn probe<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.to_string_lossy().to_string();

        if !path.exists() {
            return Err(TrackError::NotFound(format!("File not found: {}", path_str)));
        }

        let output = Command::new(ffmpeg_sidecar::ffprobe::ffprobe_path())
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-count_packets",
                "-show_entries",
                "stream=codec_name,width,height,r_frame_rate,avg_frame_rate,nb_frames,nb_read_packets",
                "-of",
                "json",
            ])
            .arg(path)
            .output()
            .map_err(|e| TrackError::Decoder(format!("Failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(TrackError::Decoder(format!(
                "ffprobe failed on {}: {}",
                path_str,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let json = String::from_utf8_lossy(&output.stdout);
        debug!(path = %path_str, "ffprobe output: {}", json);
        Self::from_ffprobe_json(path_str, &json)
    }

    /// Build a probe result from ffprobe's JSON output.
    pub fn from_ffprobe_json(path: String, json: &str) -> Result<Self> {
        let parsed: FfprobeOutput = serde_json::from_str(json)
            .map_err(|e| TrackError::Serialization(format!("Bad ffprobe output: {e}")))?;

        let video = match parsed.streams.into_iter().next() {
            Some(stream) => Some(stream.into_info()?),
            None => None,
        };
        Ok(Self { path, video })
    }

    /// Check if the file has video.
    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }
}

impl FfprobeStream {
    fn into_info(self) -> Result<VideoStreamInfo> {
        let (width, height) = match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
            _ => {
                return Err(TrackError::UnsupportedFormat(
                    "video stream has no frame size".into(),
                ))
            }
        };

        // avg_frame_rate is "0/0" for some containers
        let frame_rate = [self.avg_frame_rate.as_deref(), self.r_frame_rate.as_deref()]
            .into_iter()
            .flatten()
            .filter_map(|s| s.parse::<FrameRate>().ok())
            .find(|r| r.numerator > 0)
            .unwrap_or_default();

        let frame_count = [self.nb_read_packets.as_deref(), self.nb_frames.as_deref()]
            .into_iter()
            .flatten()
            .filter_map(|s| s.parse::<usize>().ok())
            .find(|&n| n > 0)
            .ok_or_else(|| TrackError::UnsupportedFormat("could not count video frames".into()))?;

        Ok(VideoStreamInfo {
            codec: self.codec_name.unwrap_or_default(),
            width,
            height,
            frame_rate,
            frame_count,
        })
    }
}

//! Tracking results and their persisted record.

use crate::params::TrackingParameters;
use crate::pose::Pose;
use crate::session::RangeAdjustment;
use crate::tracker::TrackerStats;
use larvatrack_core::{unwrap_angles, Colours, FrameRate, Point, Result, TrackError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Output of one tracking run: the pose sequence plus echoed metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingResult {
    /// One pose per tracked frame, in frame order.
    pub poses: Vec<Pose>,
    pub video_path: Option<PathBuf>,
    /// Frames in the whole video, not just the tracked range.
    pub video_n_frames: usize,
    pub frame_rate: FrameRate,
    /// Index of the frame `poses[0]` belongs to.
    pub starting_frame: usize,
    pub params: TrackingParameters,
    pub colours: Colours,
    pub stats: TrackerStats,
    /// Corrections applied to the requested frame range.
    pub adjustments: Vec<RangeAdjustment>,
}

impl TrackingResult {
    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Heading angles with 2π jumps removed. NaN frames stay NaN.
    pub fn heading_angles_unwrapped(&self) -> Vec<f64> {
        unwrap_angles(&self.poses.iter().map(|p| p.heading_angle).collect::<Vec<_>>())
    }

    /// Unwrapped `(first, second)` eye angle series.
    pub fn eye_angles_unwrapped(&self) -> (Vec<f64>, Vec<f64>) {
        let first: Vec<f64> = self.poses.iter().map(|p| p.first_eye_angle).collect();
        let second: Vec<f64> = self.poses.iter().map(|p| p.second_eye_angle).collect();
        (unwrap_angles(&first), unwrap_angles(&second))
    }

    /// Presentation time in seconds of each tracked frame.
    pub fn timestamps(&self) -> Vec<f64> {
        (0..self.poses.len())
            .map(|i| self.frame_rate.timestamp(self.starting_frame + i))
            .collect()
    }

    /// Flatten into the persisted record.
    pub fn to_record(&self) -> TrackingRecord {
        TrackingRecord {
            eye_coord_array: self
                .poses
                .iter()
                .map(|p| [coord(p.first_eye), coord(p.second_eye)])
                .collect(),
            eye_angle_array: self
                .poses
                .iter()
                .map(|p| [finite(p.first_eye_angle), finite(p.second_eye_angle)])
                .collect(),
            tail_coord_array: self
                .poses
                .iter()
                .map(|p| p.tail_points.iter().copied().map(coord).collect())
                .collect(),
            body_coord_array: self.poses.iter().map(|p| coord(p.body_center)).collect(),
            swim_bladder_coord_array: self.poses.iter().map(|p| coord(p.swim_bladder)).collect(),
            heading_angle_array: self.poses.iter().map(|p| finite(p.heading_angle)).collect(),
            timestamp_array: self.timestamps(),
            video_path: self
                .video_path
                .as_ref()
                .map(|p| p.display().to_string()),
            video_n_frames: self.video_n_frames,
            video_fps: self.frame_rate.to_fps_f64(),
            starting_frame: self.starting_frame,
            dist_tail_points: self.params.dist_tail_points,
            dist_eyes: self.params.dist_eyes,
            dist_swim_bladder: self.params.dist_swim_bladder,
            eyes_threshold: self.params.eyes_threshold,
            pixel_threshold: self.params.pixel_threshold,
            frame_change_threshold: self.params.frame_change_threshold,
            colours: self.colours.clone(),
        }
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// `[row, col]`, with undefined components as `None`.
fn coord(point: Point) -> [Option<f64>; 2] {
    [finite(point.row), finite(point.col)]
}

/// Flat, serializable form of a [`TrackingResult`], as handed to plotting
/// and analysis tools. Undefined values are written as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    /// Per frame: `[[row, col] first eye, [row, col] second eye]`.
    pub eye_coord_array: Vec<[[Option<f64>; 2]; 2]>,
    pub eye_angle_array: Vec<[Option<f64>; 2]>,
    /// Per frame: one `[row, col]` per tail point.
    pub tail_coord_array: Vec<Vec<[Option<f64>; 2]>>,
    pub body_coord_array: Vec<[Option<f64>; 2]>,
    #[serde(default)]
    pub swim_bladder_coord_array: Vec<[Option<f64>; 2]>,
    pub heading_angle_array: Vec<Option<f64>>,
    /// Seconds from the start of the video, per frame.
    #[serde(default)]
    pub timestamp_array: Vec<f64>,
    pub video_path: Option<String>,
    pub video_n_frames: usize,
    pub video_fps: f64,
    #[serde(default)]
    pub starting_frame: usize,
    pub dist_tail_points: f64,
    pub dist_eyes: f64,
    pub dist_swim_bladder: f64,
    pub eyes_threshold: u8,
    pub pixel_threshold: u8,
    pub frame_change_threshold: u8,
    pub colours: Colours,
}

impl TrackingRecord {
    /// Number of frames in the record.
    pub fn len(&self) -> usize {
        self.heading_angle_array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heading_angle_array.is_empty()
    }

    /// Default output path for a video: `<stem>_results.json` beside it.
    pub fn default_path(video: &Path) -> PathBuf {
        let stem = video
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".into());
        video.with_file_name(format!("{stem}_results.json"))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| TrackError::Serialization(format!("Failed to serialize results: {e}")))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| TrackError::Serialization(format!("Failed to parse results: {e}")))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TrackError::NotFound(path.display().to_string()));
        }
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

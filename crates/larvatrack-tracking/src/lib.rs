//! LarvaTrack Tracking - Background estimation and larval fish pose tracking.

pub mod annotate;
pub mod background;
pub mod batch;
pub mod blob;
pub mod params;
pub mod pose;
pub mod preprocess;
pub mod progress;
pub mod radial;
pub mod result;
pub mod session;
pub mod tracker;

pub use annotate::annotate;
pub use background::{compute_background, Background, BackgroundMethod, BackgroundOptions};
pub use batch::{
    load_jobs, run_batch, run_batch_with, BatchProgress, JobBackground, JobOutcome, VideoJob,
};
pub use blob::Blob;
pub use params::{Polarity, TrackingMethod, TrackingParameters};
pub use pose::{DegradeReason, FrameOutcome, Pose};
pub use progress::{CancelToken, Phase, ProgressMeter, ProgressUpdate, SharedProgress};
pub use radial::RadialSearch;
pub use result::{TrackingRecord, TrackingResult};
pub use session::{BackgroundSource, FrameRange, RangeAdjustment, TrackingSession};
pub use tracker::{PoseTracker, TrackerState, TrackerStats};

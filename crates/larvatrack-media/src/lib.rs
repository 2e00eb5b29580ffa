//! LarvaTrack Media - FFmpeg integration for video frame I/O
//!
//! This crate handles:
//! - Frame sources (FFmpeg-decoded files and in-memory sequences)
//! - Media file probing
//! - Frame sinks (FFmpeg-encoded files and in-memory capture)

pub mod decoder;
pub mod probe;
pub mod source;
pub mod writer;

pub use decoder::VideoDecoder;
pub use probe::MediaProbe;
pub use source::{FrameSource, MemorySource};
pub use writer::{FrameSink, MemorySink, VideoCodec, VideoWriter};

/// Check that the FFmpeg binaries can be found (call once at startup).
pub fn init() -> bool {
    let found = ffmpeg_sidecar::command::ffmpeg_is_installed();
    if found {
        tracing::info!("LarvaTrack media initialized");
    } else {
        tracing::warn!("ffmpeg not found on PATH; only in-memory sources are usable");
    }
    found
}

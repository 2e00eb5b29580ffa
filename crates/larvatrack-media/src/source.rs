//! Frame sources: random-access access to decoded video frames.

use larvatrack_core::{FrameBuffer, FrameRate, Result, TrackError};
use std::path::Path;

/// A decoded video that can be read frame by frame.
///
/// Reads are sequential from a cursor; `seek` moves the cursor. Frames are
/// handed to the caller by value and owned by it for one iteration.
pub trait FrameSource {
    /// Total number of frames in the video.
    fn frame_count(&self) -> usize;

    /// Frame rate of the video.
    fn frame_rate(&self) -> FrameRate;

    /// (width, height) of every frame.
    fn dimensions(&self) -> (u32, u32);

    /// Path of the underlying file, if there is one.
    fn path(&self) -> Option<&Path> {
        None
    }

    /// Move the read cursor so the next frame returned is `index`.
    fn seek(&mut self, index: usize) -> Result<()>;

    /// Read the frame at the cursor and advance. `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<FrameBuffer>>;

    /// Random-access read of a single frame.
    fn read_frame(&mut self, index: usize) -> Result<FrameBuffer> {
        self.seek(index)?;
        self.next_frame()?.ok_or_else(|| {
            TrackError::Decoder(format!("frame {index} not available"))
        })
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn frame_count(&self) -> usize {
        (**self).frame_count()
    }

    fn frame_rate(&self) -> FrameRate {
        (**self).frame_rate()
    }

    fn dimensions(&self) -> (u32, u32) {
        (**self).dimensions()
    }

    fn path(&self) -> Option<&Path> {
        (**self).path()
    }

    fn seek(&mut self, index: usize) -> Result<()> {
        (**self).seek(index)
    }

    fn next_frame(&mut self) -> Result<Option<FrameBuffer>> {
        (**self).next_frame()
    }
}

/// A frame source backed by frames held in memory.
///
/// Used for synthetic videos and for replaying frames that were decoded
/// elsewhere.
#[derive(Debug, Clone)]
pub struct MemorySource {
    frames: Vec<FrameBuffer>,
    frame_rate: FrameRate,
    cursor: usize,
    fail_at: Option<usize>,
}

impl MemorySource {
    /// Create a source from a non-empty list of equally sized frames.
    pub fn new(frames: Vec<FrameBuffer>, frame_rate: FrameRate) -> Result<Self> {
        let first = frames
            .first()
            .ok_or_else(|| TrackError::InvalidParameter("memory source has no frames".into()))?;
        for frame in &frames {
            first.ensure_same_size(frame)?;
        }
        Ok(Self {
            frames,
            frame_rate,
            cursor: 0,
            fail_at: None,
        })
    }

    /// Make every read of frame `index` fail with a decoder error.
    pub fn with_read_failure(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Index of the next frame to be read.
    pub fn position(&self) -> usize {
        self.cursor
    }
}

impl FrameSource for MemorySource {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn frame_rate(&self) -> FrameRate {
        self.frame_rate
    }

    fn dimensions(&self) -> (u32, u32) {
        self.frames[0].dimensions()
    }

    fn seek(&mut self, index: usize) -> Result<()> {
        if index >= self.frames.len() {
            return Err(TrackError::InvalidParameter(format!(
                "frame {} out of range (0-{})",
                index,
                self.frames.len() - 1
            )));
        }
        self.cursor = index;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<FrameBuffer>> {
        if self.fail_at == Some(self.cursor) {
            return Err(TrackError::Decoder(format!(
                "failed to decode frame {}",
                self.cursor
            )));
        }
        let frame = self.frames.get(self.cursor).cloned();
        if frame.is_some() {
            self.cursor += 1;
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larvatrack_core::PixelFormat;

    fn frames(n: u8) -> Vec<FrameBuffer> {
        (0..n)
            .map(|i| FrameBuffer::gray_from_fn(4, 3, move |_, _| i))
            .collect()
    }

    #[test]
    fn test_sequential_reads() {
        let mut source = MemorySource::new(frames(3), FrameRate::FPS_30).unwrap();
        assert_eq!(source.frame_count(), 3);
        assert_eq!(source.dimensions(), (4, 3));
        for i in 0..3 {
            assert_eq!(source.next_frame().unwrap().unwrap().get(0, 0), i);
        }
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_random_access() {
        let mut source = MemorySource::new(frames(5), FrameRate::FPS_30).unwrap();
        assert_eq!(source.read_frame(3).unwrap().get(1, 1), 3);
        assert_eq!(source.position(), 4);
        assert!(source.seek(5).is_err());
    }

    #[test]
    fn test_rejects_mixed_sizes() {
        let mixed = vec![
            FrameBuffer::new(4, 3, PixelFormat::Gray8),
            FrameBuffer::new(3, 4, PixelFormat::Gray8),
        ];
        assert!(MemorySource::new(mixed, FrameRate::FPS_30).is_err());
        assert!(MemorySource::new(Vec::new(), FrameRate::FPS_30).is_err());
    }

    #[test]
    fn test_injected_failure() {
        let mut source = MemorySource::new(frames(3), FrameRate::FPS_30)
            .unwrap()
            .with_read_failure(1);
        assert!(source.next_frame().is_ok());
        assert!(matches!(source.next_frame(), Err(TrackError::Decoder(_))));
    }
}

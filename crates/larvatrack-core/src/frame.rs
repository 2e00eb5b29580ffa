//! Frame buffer types for video frames in CPU memory.
//!
//! Tracking works on single-channel 8-bit frames; decoded input and annotated
//! output use packed 8-bit RGB.

use crate::error::{Result, TrackError};
use serde::{Deserialize, Serialize};

/// Pixel format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit grayscale
    #[default]
    Gray8,
    /// 8-bit packed RGB (24 bits per pixel)
    Rgb8,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::Rgb8 => 3,
        }
    }

    /// Calculate total bytes needed for a frame of this format.
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }
}

/// Integer luma of an RGB triple (ITU-R BT.601 weights, rounded).
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32 + 500) / 1000) as u8
}

/// A video frame in CPU memory, tightly packed row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    /// Pixel format
    pub format: PixelFormat,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    data: Vec<u8>,
}

impl FrameBuffer {
    /// Create a zero-filled frame buffer with the given dimensions and format.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            format,
            width,
            height,
            data: vec![0u8; format.frame_size(width, height)],
        }
    }

    /// Wrap existing pixel data, checking its length against the dimensions.
    pub fn from_raw(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        let expected = format.frame_size(width, height);
        if data.len() != expected {
            return Err(TrackError::InvalidParameter(format!(
                "{:?} frame of {}x{} needs {} bytes, got {}",
                format,
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            format,
            width,
            height,
            data,
        })
    }

    /// Build a grayscale frame by evaluating `f(x, y)` for every pixel.
    pub fn gray_from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> u8) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            format: PixelFormat::Gray8,
            width,
            height,
            data,
        }
    }

    /// Raw pixel data.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Raw pixel data, mutably.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume the frame, returning its pixel data.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// (width, height)
    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Total memory usage of this frame in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len()
    }

    /// Whether `(x, y)` lies inside the frame. Accepts signed coordinates.
    #[inline]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.format.bytes_per_pixel()
    }

    /// Sample of a grayscale pixel. Panics when out of bounds.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        debug_assert_eq!(self.format, PixelFormat::Gray8);
        self.data[self.offset(x, y)]
    }

    /// Sample of a grayscale pixel, or `None` outside the frame.
    #[inline]
    pub fn get_checked(&self, x: i64, y: i64) -> Option<u8> {
        if self.contains(x, y) {
            Some(self.get(x as u32, y as u32))
        } else {
            None
        }
    }

    /// Set a grayscale pixel. Out-of-bounds writes are ignored.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        debug_assert_eq!(self.format, PixelFormat::Gray8);
        if x < self.width && y < self.height {
            let i = self.offset(x, y);
            self.data[i] = value;
        }
    }

    /// RGB triple of a pixel; grayscale frames replicate the sample.
    #[inline]
    pub fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        let i = self.offset(x, y);
        match self.format {
            PixelFormat::Gray8 => [self.data[i]; 3],
            PixelFormat::Rgb8 => [self.data[i], self.data[i + 1], self.data[i + 2]],
        }
    }

    /// Grayscale value of a pixel in either format.
    #[inline]
    pub fn luma_at(&self, x: u32, y: u32) -> u8 {
        let i = self.offset(x, y);
        match self.format {
            PixelFormat::Gray8 => self.data[i],
            PixelFormat::Rgb8 => luma(self.data[i], self.data[i + 1], self.data[i + 2]),
        }
    }

    /// Convert to a grayscale frame (copies when already grayscale).
    pub fn to_gray(&self) -> Self {
        match self.format {
            PixelFormat::Gray8 => self.clone(),
            PixelFormat::Rgb8 => {
                let data = self
                    .data
                    .chunks_exact(3)
                    .map(|px| luma(px[0], px[1], px[2]))
                    .collect();
                Self {
                    format: PixelFormat::Gray8,
                    width: self.width,
                    height: self.height,
                    data,
                }
            }
        }
    }

    /// Convert to a packed RGB frame (copies when already RGB).
    pub fn to_rgb(&self) -> Self {
        match self.format {
            PixelFormat::Rgb8 => self.clone(),
            PixelFormat::Gray8 => {
                let data = self.data.iter().flat_map(|&v| [v, v, v]).collect();
                Self {
                    format: PixelFormat::Rgb8,
                    width: self.width,
                    height: self.height,
                    data,
                }
            }
        }
    }

    /// Fail unless this is a grayscale frame.
    pub fn ensure_gray(&self) -> Result<()> {
        if self.format == PixelFormat::Gray8 {
            Ok(())
        } else {
            Err(TrackError::UnsupportedFormat(format!(
                "expected Gray8 frame, got {:?}",
                self.format
            )))
        }
    }

    /// Fail unless `other` has the same width and height.
    pub fn ensure_same_size(&self, other: &Self) -> Result<()> {
        if self.dimensions() == other.dimensions() {
            Ok(())
        } else {
            Err(TrackError::DimensionMismatch {
                expected: self.dimensions(),
                actual: other.dimensions(),
            })
        }
    }

    /// Largest grayscale sample (0 for an empty frame).
    pub fn max_value(&self) -> u8 {
        self.data.iter().copied().max().unwrap_or(0)
    }

    /// Smallest grayscale sample (255 for an empty frame).
    pub fn min_value(&self) -> u8 {
        self.data.iter().copied().min().unwrap_or(u8::MAX)
    }
}

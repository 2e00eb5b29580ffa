//! LarvaTrack Core - Foundation types for larval fish pose tracking
//!
//! This crate provides the fundamental types used throughout LarvaTrack:
//! - Frame buffers and pixel formats
//! - Points, angles and pixel rectangles
//! - Annotation colour palettes
//! - Frame rates
//! - The shared error type

pub mod color;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod time;

pub use color::{Colour, Colours};
pub use error::{ErrorCategory, Result, TrackError};
pub use frame::{FrameBuffer, PixelFormat};
pub use geometry::{same_value, unwrap_angles, wrap_angle, PixelRect, Point};
pub use time::FrameRate;

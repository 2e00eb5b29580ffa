//! Error types for LarvaTrack.

use thiserror::Error;

/// Main error type for LarvaTrack operations.
#[derive(Error, Debug)]
pub enum TrackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decoder error: {0}")]
    Decoder(String),

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Frame size mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Background calculation failed: {0}")]
    Background(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a terminal failure, for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected before any frame was read.
    Configuration,
    /// Reading or writing media or files failed.
    Io,
    /// The caller cancelled the operation.
    Cancelled,
    /// A worker failed in a way no input explains.
    Internal,
}

impl TrackError {
    /// Which class of failure this is.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidParameter(_)
            | Self::DimensionMismatch { .. }
            | Self::UnsupportedFormat(_) => ErrorCategory::Configuration,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::Internal(_) => ErrorCategory::Internal,
            Self::Io(_)
            | Self::Decoder(_)
            | Self::Encoder(_)
            | Self::Background(_)
            | Self::NotFound(_)
            | Self::Image(_)
            | Self::Serialization(_) => ErrorCategory::Io,
        }
    }

    /// Whether this error is the result of cooperative cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type alias for LarvaTrack operations.
pub type Result<T> = std::result::Result<T, TrackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            TrackError::InvalidParameter("x".into()).category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            TrackError::Background("read failed".into()).category(),
            ErrorCategory::Io
        );
        assert!(TrackError::Cancelled.is_cancelled());
    }

    #[test]
    fn test_background_message() {
        let err = TrackError::Background("frame 3 unreadable".into());
        assert_eq!(
            err.to_string(),
            "Background calculation failed: frame 3 unreadable"
        );
    }
}

//! Segment download error type for retry classification.

use std::fmt;

/// Error returned by a single segment download attempt (curl failure, HTTP
/// error, or a response that didn't honor the requested range).
#[derive(Debug)]
pub enum SegmentError {
    /// Curl reported an error (timeout, connection, etc.).
    Curl(curl::Error),
    /// HTTP response had a non-2xx, non-206 status.
    Http(u32),
    /// Response was not a valid 206 Partial Content honoring the requested
    /// range (section 4.5) — treated as transient, not trusted blindly.
    InvalidRangeResponse { expected: String, got: Option<String> },
    /// Transfer completed but fewer bytes were written than the segment
    /// length (server closed early).
    PartialTransfer { expected: u64, received: u64 },
    /// Disk/storage write failed (e.g. disk full, permission denied). Not retried.
    Storage(std::io::Error),
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentError::Curl(e) => write!(f, "{}", e),
            SegmentError::Http(code) => write!(f, "HTTP {}", code),
            SegmentError::InvalidRangeResponse { expected, got } => {
                write!(f, "range not honored: expected {}, got {:?}", expected, got)
            }
            SegmentError::PartialTransfer { expected, received } => {
                write!(f, "partial transfer: expected {} bytes, got {}", expected, received)
            }
            SegmentError::Storage(e) => write!(f, "storage: {}", e),
        }
    }
}

impl std::error::Error for SegmentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SegmentError::Curl(e) => Some(e),
            SegmentError::Storage(e) => Some(e),
            SegmentError::Http(_)
            | SegmentError::InvalidRangeResponse { .. }
            | SegmentError::PartialTransfer { .. } => None,
        }
    }
}

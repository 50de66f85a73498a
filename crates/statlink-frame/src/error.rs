/// Errors that can occur while reading or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// A payload that does not match the shape its type tag promises.
///
/// Only the offending frame is dropped; framing stays aligned because the
/// reassembler already consumed exactly `length` bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    /// The payload ended before the value was complete.
    #[error("{kind} payload truncated (need {needed} bytes, have {available})")]
    Truncated {
        kind: &'static str,
        needed: usize,
        available: usize,
    },

    /// The value decoded cleanly but bytes were left over.
    #[error("{kind} payload length mismatch (declared {declared} bytes, decoded {consumed})")]
    LengthMismatch {
        kind: &'static str,
        declared: usize,
        consumed: usize,
    },

    /// Text payload is not valid UTF-8.
    #[error("text payload is not valid UTF-8: {0}")]
    InvalidText(#[from] std::str::Utf8Error),
}

//! Error types for the sidewinder-core crate.

/// Errors from frame and payload codecs.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("frame too short: need at least {min} bytes, got {actual}")]
    TooShort { min: usize, actual: usize },

    #[error("frame too large: {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(usize),

    #[error("unknown frame type: {0}")]
    UnknownFrameType(u8),

    #[error("invalid varu64 encoding")]
    InvalidVaru64,

    #[error("buffer too small for payload: need {need} bytes, got {have}")]
    BufferTooSmall { need: usize, have: usize },

    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
}

/// Error returned when a byte slice has the wrong length for a newtype.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid length: expected {expected} bytes, got {actual}")]
pub struct InvalidLength {
    pub expected: usize,
    pub actual: usize,
}

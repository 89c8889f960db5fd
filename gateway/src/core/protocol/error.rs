use thiserror::Error;

/// Errors produced while decoding a wire frame.
///
/// None of these are fatal to a session on their own: the relay either
/// forwards the original bytes or drops the single frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("Frame truncated: field at offset {offset} needs {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Invalid header size: {0}")]
    InvalidHeaderSize(u8),

    #[error("Payload length mismatch: declared {declared} bytes, {remaining} remaining")]
    LengthMismatch { declared: usize, remaining: usize },

    #[error("Payload decompression failed: {0}")]
    Decompress(String),
}

impl FrameError {
    pub fn is_truncated(&self) -> bool {
        matches!(self, FrameError::Truncated { .. })
    }
}

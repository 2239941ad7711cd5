/// Errors that can occur during message encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Fewer bytes are available than the header or declared length requires.
    #[error("frame truncated (need {declared} bytes, {available} available)")]
    Truncated { declared: usize, available: usize },

    /// The declared length cannot even hold the header.
    #[error("declared length {declared} is smaller than the {header}-byte header")]
    LengthBelowHeader { declared: usize, header: usize },

    /// The frame exceeds the maximum transport frame size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The transport accepted only part of a datagram.
    #[error("short write ({written} of {expected} bytes)")]
    ShortWrite { written: usize, expected: usize },

    /// The underlying transport failed.
    #[error("frame transport error: {0}")]
    Transport(#[from] modemboot_transport::TransportError),
}

pub type Result<T> = std::result::Result<T, FrameError>;

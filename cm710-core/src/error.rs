//! Error types for cm710-core

use crate::frame::FrameError;

/// Result type alias for cm710 protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Data does not fit in the 16-bit length field
    #[error("Frame too large: {size} data bytes (max: {max} bytes)")]
    FrameTooLarge {
        size: usize,
        max: usize,
    },

    /// Header, length, trailer or checksum did not match
    #[error("Invalid frame: {0}")]
    InvalidFrame(#[from] FrameError),

    /// Frame was valid but its data is too short for the fields it should carry
    #[error("Malformed 0x{command:02X} payload: expected at least {expected} bytes, got {actual}")]
    MalformedPayload {
        command: u8,
        expected: usize,
        actual: usize,
    },

    /// A field carries a value the protocol does not allow
    #[error("Invalid {field} in 0x{command:02X} payload: {value}")]
    InvalidField {
        command: u8,
        field: &'static str,
        value: u32,
    },

    /// Unknown command code
    #[error("Unknown command code: 0x{0:02X}")]
    UnknownCommand(u8),

    /// Operation not allowed in the current session state
    #[error("Invalid session state: {0}")]
    InvalidSessionState(String),
}

impl Error {
    /// Check if the stream can continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidFrame(_)
                | Self::MalformedPayload { .. }
                | Self::InvalidField { .. }
                | Self::UnknownCommand(_)
        )
    }
}

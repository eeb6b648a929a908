//! Transport errors

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not open")]
    NotOpen,

    #[error("Already open")]
    AlreadyOpen,

    #[error("No device found at {0}")]
    NoDeviceFound(String),

    #[error("Read timeout")]
    ReadTimeout,

    #[error("Connection closed by remote")]
    ConnectionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error("Module power control failed: {0}")]
    Power(String),
}

impl Error {
    /// Check if this is an idle read rather than a failure
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ReadTimeout)
    }
}

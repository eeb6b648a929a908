//! High-level error types

use cm710_core::Command;
use cm710_types::Setting;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] cm710_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] cm710_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] cm710_types::Error),

    #[error("No {command} response within {waited_ms} ms")]
    Timeout { command: Command, waited_ms: u64 },

    #[error("Lost frame sync waiting for {command}: {failures} invalid frames in a row")]
    ProtocolDesync { command: Command, failures: usize },

    #[error("Failed to access {setting}: {source}")]
    Setting {
        setting: Setting,
        source: Box<Error>,
    },
}

impl Error {
    /// Attribute an error to the setting being read or written
    pub fn setting(setting: Setting, error: impl Into<Error>) -> Self {
        Self::Setting {
            setting,
            source: Box::new(error.into()),
        }
    }

    /// Setting the error is attributed to, if any
    pub fn failed_setting(&self) -> Option<Setting> {
        match self {
            Self::Setting { setting, .. } => Some(*setting),
            _ => None,
        }
    }

    /// Innermost error, looking through setting attribution
    pub fn root(&self) -> &Error {
        match self {
            Self::Setting { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), Self::Timeout { .. })
    }
}

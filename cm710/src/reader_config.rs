//! Reader configuration

use std::time::Duration;

use cm710_core::constants::{
    DEFAULT_BAUD_RATE, DEFAULT_CALL_TIMEOUT, DEFAULT_READ_TIMEOUT, POWER_UP_DELAY, STOP_DRAIN_DELAY,
};

use crate::error::{Error, Result};

/// Environment variable naming the serial device
pub const ENV_PORT: &str = "CM710_PORT";
pub const ENV_BAUD: &str = "CM710_BAUD";
pub const ENV_DEVICE_ID: &str = "CM710_DEVICE_ID";
pub const ENV_CALL_TIMEOUT_MS: &str = "CM710_CALL_TIMEOUT_MS";
pub const ENV_READ_TIMEOUT_MS: &str = "CM710_READ_TIMEOUT_MS";

/// Settings for a [`ReaderSession`](crate::ReaderSession)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Serial device path
    pub port: String,

    pub baud_rate: u32,

    /// Identifier stamped on every reading
    pub device_id: String,

    /// Wait for a command reply
    pub call_timeout: Duration,

    /// Wait for each stream read; an empty read is an idle tick
    pub read_timeout: Duration,

    /// Wait after switching module power on
    pub power_up_delay: Duration,

    /// Time to let the stream drain after the stop command
    pub stop_drain: Duration,

    /// Only report EPCs of this many bytes
    pub epc_len: Option<usize>,
}

impl ReaderConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    /// Read overrides from `CM710_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns a parse error when a variable is set but not a number.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(port) = lookup(ENV_PORT) {
            config.port = port;
        }
        if let Some(device_id) = lookup(ENV_DEVICE_ID) {
            config.device_id = device_id;
        }
        if let Some(baud) = parse(&lookup, ENV_BAUD)? {
            config.baud_rate = baud;
        }
        if let Some(ms) = parse(&lookup, ENV_CALL_TIMEOUT_MS)? {
            config.call_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse(&lookup, ENV_READ_TIMEOUT_MS)? {
            config.read_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_power_up_delay(mut self, delay: Duration) -> Self {
        self.power_up_delay = delay;
        self
    }

    pub fn with_stop_drain(mut self, drain: Duration) -> Self {
        self.stop_drain = drain;
        self
    }

    pub fn with_epc_len(mut self, bytes: usize) -> Self {
        self.epc_len = Some(bytes);
        self
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            device_id: "cm710".to_string(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            power_up_delay: POWER_UP_DELAY,
            stop_drain: STOP_DRAIN_DELAY,
            epc_len: None,
        }
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|value| {
            value.trim().parse::<T>().map_err(|e| {
                Error::from(cm710_types::Error::Parse(format!(
                    "{}={:?}: {}",
                    key, value, e
                )))
            })
        })
        .transpose()
}

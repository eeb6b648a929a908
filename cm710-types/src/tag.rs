//! Tag inventory events

use std::fmt;

use chrono::{DateTime, Local};

/// Context stamped onto every reading decoded from one chunk of stream bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadContext {
    /// Identity of the reader host (usually its MAC address)
    pub device_id: String,

    /// Moment the bytes were received
    pub timestamp: DateTime<Local>,
}

impl ReadContext {
    pub fn new(device_id: impl Into<String>, timestamp: DateTime<Local>) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp,
        }
    }

    /// Context for bytes received right now
    pub fn now(device_id: impl Into<String>) -> Self {
        Self::new(device_id, Local::now())
    }
}

/// One tag observation from a continuous inventory stream
#[derive(Debug, Clone, PartialEq)]
pub struct TagReading {
    pub device_id: String,
    pub timestamp: DateTime<Local>,

    /// EPC as uppercase hex (always an even number of digits)
    pub epc: String,

    /// Antenna port, 1 to 4
    pub antenna: u8,

    /// Received signal strength in dBm
    pub rssi: f64,
}

impl TagReading {
    pub fn new(context: &ReadContext, epc: String, antenna: u8, rssi: f64) -> Self {
        Self {
            device_id: context.device_id.clone(),
            timestamp: context.timestamp,
            epc,
            antenna,
            rssi,
        }
    }

    /// EPC length in bytes
    pub fn epc_len(&self) -> usize {
        self.epc.len() / 2
    }
}

/// Log-line form: `2024-05-01 12:00:00.123 AA:BB:CC:DD:EE:FF E2801160 2  -61.5`
impl fmt::Display for TagReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {:6.1}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.device_id,
            self.epc,
            self.antenna,
            self.rssi
        )
    }
}

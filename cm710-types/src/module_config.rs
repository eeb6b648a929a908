//! Module configuration snapshot

use std::fmt;

use crate::antenna::AntennaMask;
use crate::region::Region;

/// Firmware version reported by the module
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Firmware {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl Firmware {
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self { major, minor, patch }
    }
}

/// Rendered as `v2.01.0`; the minor number is always two digits
impl fmt::Display for Firmware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{:02}.{}", self.major, self.minor, self.patch)
    }
}

/// FastID state as reported by the module
///
/// The query itself can fail on the module side, in which case no on/off
/// value is available.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FastIdStatus {
    Enabled,
    Disabled,
    Unknown,
}

impl FastIdStatus {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Enabled => Some(true),
            Self::Disabled => Some(false),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for FastIdStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Enabled => "on",
            Self::Disabled => "off",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Settings read back from the module
///
/// Each field is independent; a field is `None` when it was not read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleConfig {
    pub firmware: Option<Firmware>,

    /// Module temperature in degrees Celsius
    pub temperature_c: Option<f64>,

    /// Write power in dBm
    pub power_dbm: Option<f64>,

    pub region: Option<Region>,

    pub antennas: Option<AntennaMask>,

    pub fastid: Option<FastIdStatus>,
}

impl ModuleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn region_description(&self) -> Option<String> {
        self.region.map(Region::description)
    }

    pub fn antennas_description(&self) -> Option<String> {
        self.antennas.map(AntennaMask::description)
    }
}

impl fmt::Display for ModuleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn field<T: fmt::Display>(value: &Option<T>) -> String {
            value
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string())
        }

        write!(
            f,
            "Module[FW: {}, temp: {} C, power: {} dBm, region: {}, antennas: {}, fastid: {}]",
            field(&self.firmware),
            field(&self.temperature_c),
            field(&self.power_dbm),
            field(&self.region),
            field(&self.antennas),
            field(&self.fastid)
        )
    }
}

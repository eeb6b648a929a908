//! Frequency band regions

use std::fmt;

use crate::error::{Error, Result};

/// Region codes known to the CM710-4 firmware
const REGIONS: &[(u8, &str)] = &[
    (0x01, "China 920-925 MHz"),
    (0x02, "China 840-845 MHz"),
    (0x04, "Europe 865-868 MHz"),
    (0x08, "USA 902-928 MHz"),
    (0x16, "Korea"),
    (0x32, "Japan"),
    (0x3C, "Brazil 902-928 MHz"),
    (0x3D, "ETSI Upper"),
    (0x3E, "Australia"),
    (0x40, "Israel"),
    (0x41, "Hong Kong"),
    (0x43, "880-930 MHz"),
    (0x45, "Thailand"),
];

/// Frequency band region as the raw one-byte code the module stores
///
/// Codes outside the table are kept as-is; the module may report bands this
/// table does not know about.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Region(u8);

impl Region {
    pub const CHINA_920: Self = Self(0x01);
    pub const CHINA_840: Self = Self(0x02);
    pub const EUROPE: Self = Self(0x04);
    pub const USA: Self = Self(0x08);
    pub const KOREA: Self = Self(0x16);
    pub const JAPAN: Self = Self(0x32);
    pub const BRAZIL: Self = Self(0x3C);
    pub const ETSI_UPPER: Self = Self(0x3D);
    pub const AUSTRALIA: Self = Self(0x3E);
    pub const ISRAEL: Self = Self(0x40);
    pub const HONG_KONG: Self = Self(0x41);
    pub const BAND_880_930: Self = Self(0x43);
    pub const THAILAND: Self = Self(0x45);

    pub const fn from_code(code: u8) -> Self {
        Self(code)
    }

    /// Parse the two-digit hex form used in configuration files (`"3C"`)
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        u8::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|e| Error::Parse(format!("region code {:?}: {}", s, e)))
    }

    pub const fn code(self) -> u8 {
        self.0
    }

    /// Table name, if the code is a known region
    pub fn name(self) -> Option<&'static str> {
        REGIONS
            .iter()
            .find(|(code, _)| *code == self.0)
            .map(|(_, name)| *name)
    }

    pub fn is_known(self) -> bool {
        self.name().is_some()
    }

    /// Human-readable description, including unknown codes
    pub fn description(self) -> String {
        match self.name() {
            Some(name) => name.to_string(),
            None => format!("Unknown Region (0x{:02X})", self.0),
        }
    }

    /// All regions in the table
    pub fn known() -> impl Iterator<Item = Region> {
        REGIONS.iter().map(|(code, _)| Region(*code))
    }
}

impl From<u8> for Region {
    fn from(code: u8) -> Self {
        Self(code)
    }
}

impl From<Region> for u8 {
    fn from(region: Region) -> u8 {
        region.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} ({})", self.0, self.description())
    }
}

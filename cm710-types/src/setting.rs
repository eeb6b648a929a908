//! Writable module settings and their accepted ranges

use std::fmt;

use crate::antenna::AntennaMask;
use crate::error::{Error, Result};
use crate::region::Region;

/// Module setting addressed by a configuration operation
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Setting {
    Firmware,
    Temperature,
    Power,
    Region,
    Antennas,
    Frequency,
    FastId,
}

impl Setting {
    pub fn name(self) -> &'static str {
        match self {
            Self::Firmware => "firmware",
            Self::Temperature => "temperature",
            Self::Power => "power",
            Self::Region => "region",
            Self::Antennas => "antennas",
            Self::Frequency => "frequency",
            Self::FastId => "fastid",
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Transmit power in whole dBm, 5 to 30
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxPower(u8);

impl TxPower {
    pub const MIN_DBM: u8 = 5;
    pub const MAX_DBM: u8 = 30;

    pub fn new(dbm: u8) -> Result<Self> {
        if !(Self::MIN_DBM..=Self::MAX_DBM).contains(&dbm) {
            return Err(Error::UnsupportedValue {
                setting: Setting::Power,
                value: format!("{} dBm", dbm),
                expected: "5..=30 dBm",
            });
        }
        Ok(Self(dbm))
    }

    pub const fn dbm(self) -> u8 {
        self.0
    }

    /// Wire value in hundredths of a dBm
    pub const fn centi_dbm(self) -> u16 {
        self.0 as u16 * 100
    }
}

impl TryFrom<u8> for TxPower {
    type Error = Error;

    fn try_from(dbm: u8) -> Result<Self> {
        Self::new(dbm)
    }
}

impl fmt::Display for TxPower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} dBm", self.0)
    }
}

/// Fixed carrier frequency in kHz, 840000 to 928000
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Frequency(u32);

impl Frequency {
    pub const MIN_KHZ: u32 = 840_000;
    pub const MAX_KHZ: u32 = 928_000;

    pub fn new(khz: u32) -> Result<Self> {
        if !(Self::MIN_KHZ..=Self::MAX_KHZ).contains(&khz) {
            return Err(Error::UnsupportedValue {
                setting: Setting::Frequency,
                value: format!("{} kHz", khz),
                expected: "840000..=928000 kHz",
            });
        }
        Ok(Self(khz))
    }

    pub const fn khz(self) -> u32 {
        self.0
    }

    /// Three-byte wire form, most significant byte first
    pub const fn to_wire(self) -> [u8; 3] {
        let [_, hi, mid, lo] = self.0.to_be_bytes();
        [hi, mid, lo]
    }
}

impl TryFrom<u32> for Frequency {
    type Error = Error;

    fn try_from(khz: u32) -> Result<Self> {
        Self::new(khz)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} kHz", self.0)
    }
}

/// Batch of settings to write, applied in declaration order
///
/// Unset fields are left untouched on the module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSettings {
    pub power: Option<TxPower>,
    pub region: Option<Region>,
    pub antennas: Option<AntennaMask>,
    pub frequency: Option<Frequency>,
    pub fastid: Option<bool>,
}

impl ModuleSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_power(mut self, power: TxPower) -> Self {
        self.power = Some(power);
        self
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_antennas(mut self, antennas: AntennaMask) -> Self {
        self.antennas = Some(antennas);
        self
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = Some(frequency);
        self
    }

    pub fn with_fastid(mut self, enabled: bool) -> Self {
        self.fastid = Some(enabled);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_range() {
        assert_eq!(TxPower::new(5).unwrap().dbm(), 5);
        assert_eq!(TxPower::new(30).unwrap().dbm(), 30);
        assert!(TxPower::new(4).is_err());

        let err = TxPower::new(35).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedValue { setting: Setting::Power, .. }
        ));
    }

    #[test]
    fn test_power_wire_value() {
        assert_eq!(TxPower::new(20).unwrap().centi_dbm(), 2000);
        assert_eq!(TxPower::new(30).unwrap().centi_dbm(), 0x0BB8);
    }

    #[test]
    fn test_frequency_range() {
        assert!(Frequency::new(839_999).is_err());
        assert!(Frequency::new(928_001).is_err());
        assert_eq!(Frequency::new(915_250).unwrap().khz(), 915_250);
    }

    #[test]
    fn test_frequency_wire_order() {
        // 915250 = 0x0DF732
        assert_eq!(Frequency::new(915_250).unwrap().to_wire(), [0x0D, 0xF7, 0x32]);
    }

    #[test]
    fn test_settings_builder() {
        assert!(ModuleSettings::new().is_empty());

        let settings = ModuleSettings::new()
            .with_power(TxPower::new(20).unwrap())
            .with_region(Region::BRAZIL)
            .with_fastid(true);

        assert!(!settings.is_empty());
        assert_eq!(settings.region, Some(Region::BRAZIL));
        assert_eq!(settings.antennas, None);
    }
}

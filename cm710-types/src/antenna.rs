//! Antenna port selection

use std::fmt;

bitflags::bitflags! {
    /// Enabled antenna ports (antennas 1 to 8 byte of the antenna settings)
    ///
    /// Bits outside the four CM710-4 ports are retained so that masks read
    /// back from the module round-trip unchanged.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct AntennaMask: u8 {
        const ANT1 = 0x01;
        const ANT2 = 0x02;
        const ANT3 = 0x04;
        const ANT4 = 0x08;
        const ALL = Self::ANT1.bits() | Self::ANT2.bits() | Self::ANT3.bits() | Self::ANT4.bits();
    }
}

impl AntennaMask {
    /// Mask for a single port (1 to 4)
    pub fn single(port: u8) -> Option<Self> {
        match port {
            1..=4 => Some(Self::from_bits_retain(1 << (port - 1))),
            _ => None,
        }
    }

    pub const fn from_raw(raw: u8) -> Self {
        Self::from_bits_retain(raw)
    }

    /// Description for the canonical masks, `None` for custom ones
    pub fn name(self) -> Option<&'static str> {
        match self.bits() {
            0x01 => Some("Antenna 1 only"),
            0x02 => Some("Antenna 2 only"),
            0x04 => Some("Antenna 3 only"),
            0x08 => Some("Antenna 4 only"),
            0x0F => Some("All antennas (1, 2, 3, 4)"),
            _ => None,
        }
    }

    pub fn description(self) -> String {
        match self.name() {
            Some(name) => name.to_string(),
            None => format!("Custom mask (0x{:02X})", self.bits()),
        }
    }

    /// Enabled ports among 1 to 4
    pub fn ports(self) -> impl Iterator<Item = u8> {
        (1..=4u8).filter(move |port| self.bits() & (1 << (port - 1)) != 0)
    }
}

impl fmt::Display for AntennaMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} ({})", self.bits(), self.description())
    }
}

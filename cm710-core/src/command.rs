//! CM710 command codes

use std::fmt;

use crate::error::{Error, Result};

/// Protocol command codes
///
/// Request codes are sent by the host; the module answers each solicited
/// request with `request + 1`. Inventory data frames are unsolicited.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    // Module information
    GetFirmware = 0x02,
    FirmwareReply = 0x03,
    GetTemperature = 0x34,
    TemperatureReply = 0x35,

    // Transmit power
    SetPower = 0x10,
    SetPowerAck = 0x11,
    GetPower = 0x12,
    PowerReply = 0x13,

    // Fixed frequency
    SetFrequency = 0x14,
    SetFrequencyAck = 0x15,

    // Antennas
    SetAntennas = 0x28,
    SetAntennasAck = 0x29,
    GetAntennas = 0x2A,
    AntennasReply = 0x2B,

    // Frequency band region
    SetRegion = 0x2C,
    SetRegionAck = 0x2D,
    GetRegion = 0x2E,
    RegionReply = 0x2F,

    // FastID
    SetFastId = 0x5C,
    SetFastIdAck = 0x5D,
    GetFastId = 0x5E,
    FastIdReply = 0x5F,

    // Continuous inventory
    StartInventory = 0x82,
    InventoryData = 0x83,
    StopInventory = 0x8C,
}

impl Command {
    /// Response code expected for a solicited request
    ///
    /// Returns `None` for responses and for the fire-and-forget inventory
    /// commands.
    pub fn response(self) -> Option<Command> {
        match self {
            Self::GetFirmware => Some(Self::FirmwareReply),
            Self::GetTemperature => Some(Self::TemperatureReply),
            Self::SetPower => Some(Self::SetPowerAck),
            Self::GetPower => Some(Self::PowerReply),
            Self::SetFrequency => Some(Self::SetFrequencyAck),
            Self::SetAntennas => Some(Self::SetAntennasAck),
            Self::GetAntennas => Some(Self::AntennasReply),
            Self::SetRegion => Some(Self::SetRegionAck),
            Self::GetRegion => Some(Self::RegionReply),
            Self::SetFastId => Some(Self::SetFastIdAck),
            Self::GetFastId => Some(Self::FastIdReply),
            _ => None,
        }
    }

    /// Check if this is a request command (from host to module)
    pub fn is_request(self) -> bool {
        !self.is_response()
    }

    /// Check if this is a response command (from module to host)
    pub fn is_response(self) -> bool {
        matches!(
            self,
            Self::FirmwareReply
                | Self::TemperatureReply
                | Self::SetPowerAck
                | Self::PowerReply
                | Self::SetFrequencyAck
                | Self::SetAntennasAck
                | Self::AntennasReply
                | Self::SetRegionAck
                | Self::RegionReply
                | Self::SetFastIdAck
                | Self::FastIdReply
                | Self::InventoryData
        )
    }

    /// Check if the module streams this command without being asked
    pub fn is_unsolicited(self) -> bool {
        matches!(self, Self::InventoryData)
    }

    /// Get command name
    pub fn name(self) -> &'static str {
        match self {
            Self::GetFirmware => "GET_FIRMWARE",
            Self::FirmwareReply => "FIRMWARE_REPLY",
            Self::GetTemperature => "GET_TEMPERATURE",
            Self::TemperatureReply => "TEMPERATURE_REPLY",
            Self::SetPower => "SET_POWER",
            Self::SetPowerAck => "SET_POWER_ACK",
            Self::GetPower => "GET_POWER",
            Self::PowerReply => "POWER_REPLY",
            Self::SetFrequency => "SET_FREQUENCY",
            Self::SetFrequencyAck => "SET_FREQUENCY_ACK",
            Self::SetAntennas => "SET_ANTENNAS",
            Self::SetAntennasAck => "SET_ANTENNAS_ACK",
            Self::GetAntennas => "GET_ANTENNAS",
            Self::AntennasReply => "ANTENNAS_REPLY",
            Self::SetRegion => "SET_REGION",
            Self::SetRegionAck => "SET_REGION_ACK",
            Self::GetRegion => "GET_REGION",
            Self::RegionReply => "REGION_REPLY",
            Self::SetFastId => "SET_FASTID",
            Self::SetFastIdAck => "SET_FASTID_ACK",
            Self::GetFastId => "GET_FASTID",
            Self::FastIdReply => "FASTID_REPLY",
            Self::StartInventory => "START_INVENTORY",
            Self::InventoryData => "INVENTORY_DATA",
            Self::StopInventory => "STOP_INVENTORY",
        }
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> u8 {
        cmd as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x02 => Ok(Self::GetFirmware),
            0x03 => Ok(Self::FirmwareReply),
            0x34 => Ok(Self::GetTemperature),
            0x35 => Ok(Self::TemperatureReply),
            0x10 => Ok(Self::SetPower),
            0x11 => Ok(Self::SetPowerAck),
            0x12 => Ok(Self::GetPower),
            0x13 => Ok(Self::PowerReply),
            0x14 => Ok(Self::SetFrequency),
            0x15 => Ok(Self::SetFrequencyAck),
            0x28 => Ok(Self::SetAntennas),
            0x29 => Ok(Self::SetAntennasAck),
            0x2A => Ok(Self::GetAntennas),
            0x2B => Ok(Self::AntennasReply),
            0x2C => Ok(Self::SetRegion),
            0x2D => Ok(Self::SetRegionAck),
            0x2E => Ok(Self::GetRegion),
            0x2F => Ok(Self::RegionReply),
            0x5C => Ok(Self::SetFastId),
            0x5D => Ok(Self::SetFastIdAck),
            0x5E => Ok(Self::GetFastId),
            0x5F => Ok(Self::FastIdReply),
            0x82 => Ok(Self::StartInventory),
            0x83 => Ok(Self::InventoryData),
            0x8C => Ok(Self::StopInventory),
            _ => Err(Error::UnknownCommand(value)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}

//! Protocol constants

use std::time::Duration;

/// Frame header
pub const FRAME_HEADER: [u8; 2] = [0xC8, 0x8C];

/// Frame trailer (CR LF)
pub const FRAME_TRAILER: [u8; 2] = [0x0D, 0x0A];

/// Header + length + command + BCC + trailer
pub const FRAME_OVERHEAD: usize = 8;

/// Largest value the length field can carry
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// Largest data payload a frame can carry
pub const MAX_DATA_LEN: usize = MAX_FRAME_LEN - FRAME_OVERHEAD;

/// Length limit applied to frames on the inventory stream
pub const MAX_INVENTORY_FRAME_LEN: usize = 256;

/// Length limit applied to command replies; anything longer is a corrupt length field
pub const MAX_REPLY_FRAME_LEN: usize = 64;

/// Default serial baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default deadline for a request/response call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default wait for a single read while streaming
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1000);

/// Time the module needs after its enable line goes high
pub const POWER_UP_DELAY: Duration = Duration::from_secs(2);

/// Time to let in-flight inventory frames drain after a stop command
pub const STOP_DRAIN_DELAY: Duration = Duration::from_millis(100);

/// Consecutive invalid frames tolerated during a call
pub const MAX_CONSECUTIVE_INVALID: usize = 3;

/// Configuration flags carried in request payloads
pub mod flags {
    /// "Save to flash" flag for region and antenna writes
    pub const SAVE: u8 = 0x01;

    /// Status byte of a set-power write that should persist
    pub const POWER_SAVE: u8 = 0x02;

    /// Antenna number field of a set-power write
    pub const POWER_ANTENNA: u8 = 0x01;

    /// Channel count of a fixed-frequency write
    pub const SINGLE_CHANNEL: u8 = 0x01;

    /// Reserved byte
    pub const RESERVED: u8 = 0x00;

    pub const ON: u8 = 0x01;
    pub const OFF: u8 = 0x00;

    /// Status byte reported by the module on success
    pub const STATUS_OK: u8 = 0x01;
}

/// Fixed field offsets inside response data
///
/// Offsets count from the first data byte (wire byte 5).
pub mod offsets {
    /// Major, minor, patch
    pub const FIRMWARE: usize = 2;

    /// Signed hundredths of a degree, 2 bytes
    pub const TEMPERATURE: usize = 1;

    /// Write power in hundredths of a dBm, 2 bytes
    pub const WRITE_POWER: usize = 4;

    pub const REGION: usize = 1;

    /// Antennas 1 to 8 byte
    pub const ANTENNAS: usize = 2;

    /// Status byte followed by the on/off byte
    pub const FASTID: usize = 2;
}

//! CM710 block check character (BCC)
//!
//! The BCC is a plain XOR over every byte between the frame header and the
//! checksum itself:
//! 1. Length field (2 bytes, big-endian)
//! 2. Command byte
//! 3. Data bytes
//!
//! Header (`C8 8C`) and trailer (`0D 0A`) are not covered.

use tracing::trace;

/// XOR of all bytes in `bytes`
pub fn bcc(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Calculate the BCC for a frame
///
/// # Examples
///
/// ```
/// use cm710_core::checksum;
///
/// // Firmware version request: C8 8C 00 08 02 0A 0D 0A
/// assert_eq!(checksum::calculate(0x0008, 0x02, &[]), 0x0A);
/// ```
pub fn calculate(length: u16, command: u8, data: &[u8]) -> u8 {
    let [len_hi, len_lo] = length.to_be_bytes();
    let checksum = len_hi ^ len_lo ^ command ^ bcc(data);

    trace!(
        length = length,
        command = format!("0x{:02X}", command),
        data_len = data.len(),
        checksum = format!("0x{:02X}", checksum),
        "Calculated BCC"
    );

    checksum
}

/// Verify a received BCC
pub fn verify(length: u16, command: u8, data: &[u8], expected: u8) -> bool {
    calculate(length, command, data) == expected
}

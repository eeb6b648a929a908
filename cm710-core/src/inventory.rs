//! Continuous inventory stream decoding
//!
//! Once continuous inventory is started the module streams one `0x83` frame
//! per tag observation:
//!
//! ```text
//! ┌─────────┬─────────┬─────────┬─────────┬─────────┐
//! │   PC    │   EPC   │  RSSI   │ Antenna │  (...)  │
//! │ 2 bytes │ N bytes │ 2 bytes │ 1 byte  │         │
//! │ (BE u16)│         │ (BE i16)│         │         │
//! └─────────┴─────────┴─────────┴─────────┴─────────┘
//! ```
//!
//! `N` is taken from the top five bits of PC (EPC length in 16-bit words).
//! Broken frames are expected on a live serial line; they are counted and
//! skipped, never surfaced as stream failures.

use byteorder::{BigEndian, ByteOrder};
use tracing::debug;

use cm710_types::{ReadContext, TagReading};

use crate::command::Command;
use crate::constants::MAX_INVENTORY_FRAME_LEN;
use crate::error::{Error, Result};
use crate::frame_buffer::FrameBuffer;

const INVENTORY: u8 = Command::InventoryData as u8;

/// Tag fields decoded from one inventory frame
#[derive(Debug, Clone, PartialEq)]
pub struct RawTag {
    /// Protocol control word
    pub pc: u16,

    /// EPC as uppercase hex
    pub epc: String,

    /// Signal strength in dBm
    pub rssi: f64,

    /// Antenna port folded onto 1 to 4
    pub antenna: u8,
}

/// EPC length in bytes encoded in a PC word
pub fn epc_len(pc: u16) -> usize {
    (((pc >> 11) & 0x1F) as usize) * 2
}

/// Convert a raw RSSI field (tenths of a dBm, two's complement) to dBm
pub fn rssi_dbm(raw: u16) -> f64 {
    f64::from(raw as i16) / 10.0
}

/// Fold a raw antenna index onto the four CM710-4 ports
///
/// `1..=4` map to themselves, `5..=8` to `1..=4` again, and so on.
pub fn fold_antenna(raw: u8) -> u8 {
    ((i16::from(raw) - 1).rem_euclid(4) + 1) as u8
}

/// Decode the data of an inventory frame
///
/// # Errors
///
/// - [`Error::InvalidField`] when PC declares an empty EPC
/// - [`Error::MalformedPayload`] when the data is too short for the EPC,
///   RSSI and antenna fields
pub fn decode_tag(data: &[u8]) -> Result<RawTag> {
    if data.len() < 2 {
        return Err(Error::MalformedPayload {
            command: INVENTORY,
            expected: 2,
            actual: data.len(),
        });
    }

    let pc = BigEndian::read_u16(&data[0..2]);
    let epc_len = epc_len(pc);
    if epc_len == 0 {
        return Err(Error::InvalidField {
            command: INVENTORY,
            field: "epc length",
            value: 0,
        });
    }

    let rssi_at = 2 + epc_len;
    let antenna_at = rssi_at + 2;
    if data.len() <= antenna_at {
        return Err(Error::MalformedPayload {
            command: INVENTORY,
            expected: antenna_at + 1,
            actual: data.len(),
        });
    }

    Ok(RawTag {
        pc,
        epc: hex::encode_upper(&data[2..rssi_at]),
        rssi: rssi_dbm(BigEndian::read_u16(&data[rssi_at..antenna_at])),
        antenna: fold_antenna(data[antenna_at]),
    })
}

/// Counters kept while decoding a stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InventoryStats {
    /// Valid frames of any kind
    pub frames: u64,

    /// Readings handed out
    pub readings: u64,

    /// Frames failing header, length, trailer or checksum validation
    pub invalid_frames: u64,

    /// Inventory frames whose tag fields could not be decoded
    pub malformed_tags: u64,

    /// Valid frames that were not inventory data
    pub ignored_frames: u64,

    /// Readings dropped by the EPC length filter
    pub filtered: u64,
}

/// Decoder for the continuous inventory stream
///
/// Holds only the rolling decode buffer; bytes not yet forming a complete
/// frame are kept for the next [`feed`](Self::feed).
#[derive(Debug)]
pub struct InventoryParser {
    buffer: FrameBuffer,
    epc_filter: Option<usize>,
    stats: InventoryStats,
}

impl InventoryParser {
    pub fn new() -> Self {
        Self {
            buffer: FrameBuffer::with_max_frame_len(MAX_INVENTORY_FRAME_LEN),
            epc_filter: None,
            stats: InventoryStats::default(),
        }
    }

    /// Only emit readings whose EPC has exactly `bytes` bytes
    pub fn with_epc_len(mut self, bytes: usize) -> Self {
        self.epc_filter = Some(bytes);
        self
    }

    /// Append received bytes and decode the readings they complete
    ///
    /// The returned iterator is lazy. Readings it does not get to are left in
    /// the buffer and come out of the next `feed`.
    pub fn feed<'a>(&'a mut self, bytes: &[u8], context: &'a ReadContext) -> Readings<'a> {
        self.buffer.extend(bytes);
        Readings {
            parser: self,
            context,
        }
    }

    pub fn stats(&self) -> InventoryStats {
        self.stats
    }

    /// Bytes waiting for the rest of their frame
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop buffered bytes and counters
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.stats = InventoryStats::default();
    }

    fn next_reading(&mut self, context: &ReadContext) -> Option<TagReading> {
        loop {
            let frame = match self.buffer.next_frame()? {
                Ok(frame) => frame,
                Err(e) => {
                    self.stats.invalid_frames += 1;
                    debug!("Skipping invalid inventory frame: {}", e);
                    continue;
                }
            };

            self.stats.frames += 1;

            if frame.command != INVENTORY {
                self.stats.ignored_frames += 1;
                debug!("Ignoring {} while streaming", frame);
                continue;
            }

            let tag = match decode_tag(&frame.data) {
                Ok(tag) => tag,
                Err(e) => {
                    self.stats.malformed_tags += 1;
                    debug!("Dropping inventory frame: {}", e);
                    continue;
                }
            };

            if let Some(len) = self.epc_filter {
                if tag.epc.len() / 2 != len {
                    self.stats.filtered += 1;
                    continue;
                }
            }

            self.stats.readings += 1;
            return Some(TagReading::new(context, tag.epc, tag.antenna, tag.rssi));
        }
    }
}

impl Default for InventoryParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy sequence of readings produced by [`InventoryParser::feed`]
pub struct Readings<'a> {
    parser: &'a mut InventoryParser,
    context: &'a ReadContext,
}

impl Iterator for Readings<'_> {
    type Item = TagReading;

    fn next(&mut self) -> Option<TagReading> {
        self.parser.next_reading(self.context)
    }
}

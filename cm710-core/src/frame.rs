//! CM710 wire frame encoding/decoding

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    checksum,
    command::Command,
    constants::{FRAME_HEADER, FRAME_OVERHEAD, FRAME_TRAILER, MAX_DATA_LEN, MAX_FRAME_LEN},
    error::{Error, Result},
};

/// CM710 protocol frame
///
/// # Frame Structure
///
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Header  │ Length  │ Command │  Data   │   BCC   │ Trailer │
/// │  C8 8C  │ 2 bytes │ 1 byte  │ N bytes │ 1 byte  │  0D 0A  │
/// │         │ (BE u16)│         │         │  (XOR)  │         │
/// └─────────┴─────────┴─────────┴─────────┴─────────┴─────────┘
/// ```
///
/// The length field holds the size of the whole frame, header and trailer
/// included (`8 + N`). The BCC covers length, command and data.
///
/// # Examples
///
/// ```
/// use cm710_core::{Command, Frame};
///
/// let frame = Frame::new(Command::GetFirmware, Vec::new());
/// let encoded = frame.encode().unwrap();
/// assert_eq!(&encoded[..], &[0xC8, 0x8C, 0x00, 0x08, 0x02, 0x0A, 0x0D, 0x0A]);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw command code (module replies may carry codes this crate does not know)
    pub command: u8,

    /// Command-specific data
    pub data: Bytes,
}

/// Outcome of a single decode attempt over a byte buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A valid frame; `consumed` counts from the start of the buffer,
    /// including any noise in front of the header
    Frame { frame: Frame, consumed: usize },

    /// The buffer holds no complete frame yet
    NeedMoreData,

    /// A header was found but the frame behind it is broken; dropping
    /// `discard` bytes moves past that header so decoding can realign
    Invalid { error: FrameError, discard: usize },
}

/// Reason a frame failed validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("length field {length} is shorter than the {min}-byte frame overhead")]
    LengthTooShort { length: usize, min: usize },

    #[error("length field {length} exceeds the {max}-byte limit")]
    LengthTooLong { length: usize, max: usize },

    #[error("trailer mismatch: expected 0D 0A, found {:02X} {:02X}", found[0], found[1])]
    BadTrailer { found: [u8; 2] },

    #[error("checksum mismatch: expected 0x{expected:02X}, received 0x{received:02X}")]
    ChecksumMismatch { expected: u8, received: u8 },
}

impl Frame {
    /// Create a frame
    pub fn new(command: impl Into<u8>, data: impl Into<Bytes>) -> Self {
        Self {
            command: command.into(),
            data: data.into(),
        }
    }

    /// Create a frame with no data
    pub fn empty(command: impl Into<u8>) -> Self {
        Self::new(command, Bytes::new())
    }

    /// Known command for this frame, if any
    pub fn known_command(&self) -> Option<Command> {
        Command::try_from(self.command).ok()
    }

    pub fn is(&self, command: Command) -> bool {
        self.command == u8::from(command)
    }

    /// Value of the length field for this frame
    pub fn wire_len(&self) -> usize {
        FRAME_OVERHEAD + self.data.len()
    }

    /// Calculate the BCC for this frame
    pub fn checksum(&self) -> u8 {
        checksum::calculate(self.wire_len() as u16, self.command, &self.data)
    }

    /// Encode frame to bytes
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`] when the data cannot be described by
    /// the 16-bit length field.
    pub fn encode(&self) -> Result<BytesMut> {
        if self.data.len() > MAX_DATA_LEN {
            return Err(Error::FrameTooLarge {
                size: self.data.len(),
                max: MAX_DATA_LEN,
            });
        }

        let length = self.wire_len();
        let mut buf = BytesMut::with_capacity(length);

        buf.put_slice(&FRAME_HEADER);
        buf.put_u16(length as u16);
        buf.put_u8(self.command);
        buf.put_slice(&self.data);
        buf.put_u8(self.checksum());
        buf.put_slice(&FRAME_TRAILER);

        Ok(buf)
    }

    /// Decode exactly one frame occupying the whole buffer
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFrame`] when validation fails, or
    /// [`FrameError::LengthTooShort`] wrapped likewise when the buffer holds
    /// an incomplete frame.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        match try_decode(buf) {
            Decoded::Frame { frame, .. } => Ok(frame),
            Decoded::Invalid { error, .. } => Err(error.into()),
            Decoded::NeedMoreData => Err(FrameError::LengthTooShort {
                length: buf.len(),
                min: FRAME_OVERHEAD,
            }
            .into()),
        }
    }
}

/// Encode a command frame in one step
pub fn encode(command: Command, data: &[u8]) -> Result<BytesMut> {
    Frame::new(command, Bytes::copy_from_slice(data)).encode()
}

/// Position of the first frame header in `buf`
pub fn find_header(buf: &[u8]) -> Option<usize> {
    buf.windows(FRAME_HEADER.len())
        .position(|window| window == FRAME_HEADER)
}

/// Try to decode the first frame in `buf`
///
/// Noise before the first header is skipped and counted in the returned
/// `consumed`/`discard` sizes.
pub fn try_decode(buf: &[u8]) -> Decoded {
    try_decode_with_limit(buf, MAX_FRAME_LEN)
}

/// [`try_decode`] with an upper bound on the length field
///
/// A bounded length keeps a corrupted length field from making the caller
/// wait for up to 64 KiB that will never arrive.
pub fn try_decode_with_limit(buf: &[u8], max_frame_len: usize) -> Decoded {
    let Some(start) = find_header(buf) else {
        return Decoded::NeedMoreData;
    };

    let frame = &buf[start..];
    if frame.len() < FRAME_OVERHEAD {
        return Decoded::NeedMoreData;
    }

    let invalid = |error| Decoded::Invalid {
        error,
        discard: start + 1,
    };

    let length = BigEndian::read_u16(&frame[2..4]) as usize;
    if length < FRAME_OVERHEAD {
        return invalid(FrameError::LengthTooShort {
            length,
            min: FRAME_OVERHEAD,
        });
    }
    if length > max_frame_len {
        return invalid(FrameError::LengthTooLong {
            length,
            max: max_frame_len,
        });
    }
    if frame.len() < length {
        return Decoded::NeedMoreData;
    }

    let found = [frame[length - 2], frame[length - 1]];
    if found != FRAME_TRAILER {
        return invalid(FrameError::BadTrailer { found });
    }

    let command = frame[4];
    let data = &frame[5..length - 3];
    let received = frame[length - 3];
    let expected = checksum::calculate(length as u16, command, data);
    if expected != received {
        return invalid(FrameError::ChecksumMismatch { expected, received });
    }

    Decoded::Frame {
        frame: Frame {
            command,
            data: Bytes::copy_from_slice(data),
        },
        consumed: start + length,
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("command", &format!("0x{:02X}", self.command))
            .field("checksum", &format!("0x{:02X}", self.checksum()))
            .field("data", &format!("{:02X?}", &self.data[..]))
            .finish()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.known_command() {
            Some(command) => write!(f, "Frame[{}](len={})", command, self.data.len()),
            None => write!(f, "Frame[0x{:02X}](len={})", self.command, self.data.len()),
        }
    }
}

//! Rolling decode buffer for serial reads.
//!
//! Serial reads split frames at arbitrary byte boundaries and may carry line
//! noise between frames. `FrameBuffer` accumulates bytes, drops noise that
//! cannot start a frame, and hands out one frame (or one decode failure) at a
//! time so callers can apply their own recovery policy.

use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::constants::{FRAME_HEADER, MAX_FRAME_LEN};
use crate::frame::{self, Decoded, Frame, FrameError};

/// Buffer for accumulating incoming bytes and extracting complete frames
#[derive(Debug)]
pub struct FrameBuffer {
    buffer: BytesMut,
    max_frame_len: usize,
}

impl FrameBuffer {
    /// Create a buffer accepting any frame the length field can describe
    pub fn new() -> Self {
        Self::with_max_frame_len(MAX_FRAME_LEN)
    }

    /// Create a buffer that treats longer length fields as corruption
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(1024),
            max_frame_len,
        }
    }

    /// Append received bytes
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Extract the next frame
    ///
    /// Returns:
    /// - `Some(Ok(frame))` if a complete, valid frame was extracted
    /// - `Some(Err(error))` if a broken frame was skipped; call again to continue
    /// - `None` if more data is needed
    pub fn next_frame(&mut self) -> Option<Result<Frame, FrameError>> {
        self.discard_noise();

        match frame::try_decode_with_limit(&self.buffer, self.max_frame_len) {
            Decoded::Frame { frame, consumed } => {
                self.buffer.advance(consumed);
                Some(Ok(frame))
            }
            Decoded::NeedMoreData => None,
            Decoded::Invalid { error, discard } => {
                trace!("Skipping {} bytes after invalid frame: {}", discard, error);
                self.buffer.advance(discard);
                Some(Err(error))
            }
        }
    }

    /// Number of buffered bytes
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Drop bytes that cannot belong to a frame
    ///
    /// A trailing first header byte is kept since its partner may still be
    /// in flight.
    fn discard_noise(&mut self) {
        let noise = match frame::find_header(&self.buffer) {
            Some(start) => start,
            None if self.buffer.last() == Some(&FRAME_HEADER[0]) => self.buffer.len() - 1,
            None => self.buffer.len(),
        };

        if noise > 0 {
            trace!("Dropping {} noise bytes: {:02X?}", noise, &self.buffer[..noise.min(16)]);
            self.buffer.advance(noise);
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

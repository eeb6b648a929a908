//! In-memory transport
//!
//! Stands in for a module when no hardware is attached. The transport is a
//! cheap handle: clones share the same queues, so a test keeps one clone to
//! script replies and inspect what was written while the session owns the
//! other.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tracing::{debug, trace};

use cm710_core::frame::{self, Decoded, Frame};

use crate::{error::*, Transport};

#[derive(Debug)]
enum Incoming {
    Data(Bytes),
    Fault(io::ErrorKind),
}

#[derive(Debug)]
struct State {
    present: bool,
    open: bool,
    remote_closed: bool,
    clear_fault: Option<io::ErrorKind>,
    incoming: VecDeque<Incoming>,
    replies: HashMap<u8, VecDeque<Bytes>>,
    sent: Vec<Bytes>,
}

/// Scriptable in-memory transport
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    name: String,
    state: Arc<Mutex<State>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::named("memory")
    }

    /// Create with a device name used in logs
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(State {
                present: true,
                open: false,
                remote_closed: false,
                clear_fault: None,
                incoming: VecDeque::new(),
                replies: HashMap::new(),
                sent: Vec::new(),
            })),
        }
    }

    /// Make `open` fail as if the device node were missing
    pub fn set_absent(&self) {
        self.state.lock().present = false;
    }

    /// Queue bytes to be returned by the next `receive`
    pub fn push_incoming(&self, bytes: impl AsRef<[u8]>) {
        self.state
            .lock()
            .incoming
            .push_back(Incoming::Data(Bytes::copy_from_slice(bytes.as_ref())));
    }

    /// Queue raw reply bytes for the next request carrying `command`
    ///
    /// Replies are released when the matching request is sent, in the order
    /// they were queued.
    pub fn reply_to(&self, command: impl Into<u8>, bytes: impl AsRef<[u8]>) {
        self.state
            .lock()
            .replies
            .entry(command.into())
            .or_default()
            .push_back(Bytes::copy_from_slice(bytes.as_ref()));
    }

    /// Make a later `receive` fail with an I/O error
    pub fn inject_error(&self, kind: io::ErrorKind) {
        self.state.lock().incoming.push_back(Incoming::Fault(kind));
    }

    /// Make every later `clear_input` fail with an I/O error
    pub fn fail_clear_input(&self, kind: io::ErrorKind) {
        self.state.lock().clear_fault = Some(kind);
    }

    /// Make `receive` report end of stream once the queue is drained
    pub fn close_remote(&self) {
        self.state.lock().remote_closed = true;
    }

    /// Everything written so far, one entry per `send`
    pub fn sent(&self) -> Vec<Bytes> {
        self.state.lock().sent.clone()
    }

    /// Written frames that decode cleanly
    pub fn sent_frames(&self) -> Vec<Frame> {
        self.sent()
            .iter()
            .filter_map(|bytes| Frame::decode(bytes).ok())
            .collect()
    }

    /// Chunks queued for `receive`
    pub fn pending(&self) -> usize {
        self.state.lock().incoming.len()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn request_command(bytes: &[u8]) -> Option<u8> {
    match frame::try_decode(bytes) {
        Decoded::Frame { frame, .. } => Some(frame.command),
        _ => None,
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open(&mut self) -> Result<()> {
        let mut state = self.state.lock();

        if !state.present {
            return Err(Error::NoDeviceFound(self.name.clone()));
        }
        if state.open {
            return Err(Error::AlreadyOpen);
        }

        state.open = true;
        debug!("Opened {}", self.name);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.state.lock().open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(Error::NotOpen);
        }

        trace!("Sending {} bytes: {:02X?}", data.len(), data);
        state.sent.push(Bytes::copy_from_slice(data));

        let reply = match request_command(data) {
            Some(command) => state.replies.get_mut(&command).and_then(VecDeque::pop_front),
            None => None,
        };

        if let Some(reply) = reply {
            state.incoming.push_back(Incoming::Data(reply));
        }

        Ok(())
    }

    async fn receive(&mut self, timeout: Duration) -> Result<BytesMut> {
        let next = {
            let mut state = self.state.lock();
            if !state.open {
                return Err(Error::NotOpen);
            }

            match state.incoming.pop_front() {
                Some(next) => Some(next),
                None if state.remote_closed => return Err(Error::ConnectionClosed),
                None => None,
            }
        };

        match next {
            Some(Incoming::Data(bytes)) => {
                trace!("Received {} bytes: {:02X?}", bytes.len(), &bytes[..]);
                Ok(BytesMut::from(&bytes[..]))
            }
            Some(Incoming::Fault(kind)) => Err(Error::Io(io::Error::from(kind))),
            None => {
                tokio::time::sleep(timeout).await;
                Err(Error::ReadTimeout)
            }
        }
    }

    async fn clear_input(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(Error::NotOpen);
        }
        if let Some(kind) = state.clear_fault {
            return Err(Error::Io(io::Error::from(kind)));
        }

        state
            .incoming
            .retain(|incoming| matches!(incoming, Incoming::Fault(_)));
        Ok(())
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cm710_core::Command;

    fn firmware_request() -> BytesMut {
        frame::encode(Command::GetFirmware, &[]).unwrap()
    }

    #[tokio::test]
    async fn test_open_close() {
        let mut transport = MemoryTransport::new();
        assert!(!transport.is_open());

        transport.open().await.unwrap();
        assert!(transport.is_open());
        assert!(matches!(transport.open().await, Err(Error::AlreadyOpen)));

        transport.close().await.unwrap();
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_absent_device() {
        let mut transport = MemoryTransport::named("/dev/ttyUSB0");
        transport.set_absent();

        let result = transport.open().await;
        assert!(matches!(result, Err(Error::NoDeviceFound(name)) if name == "/dev/ttyUSB0"));
    }

    #[tokio::test]
    async fn test_not_open() {
        let mut transport = MemoryTransport::new();

        assert!(matches!(transport.send(&[0x00]).await, Err(Error::NotOpen)));
        assert!(matches!(
            transport.receive(Duration::from_millis(1)).await,
            Err(Error::NotOpen)
        ));
    }

    #[tokio::test]
    async fn test_reply_released_by_matching_request() {
        let mut transport = MemoryTransport::new();
        let handle = transport.clone();
        handle.reply_to(Command::GetFirmware, [0xAA, 0xBB]);
        transport.open().await.unwrap();

        // Other commands leave the reply queued
        transport
            .send(&frame::encode(Command::GetRegion, &[]).unwrap())
            .await
            .unwrap();
        assert_eq!(handle.pending(), 0);

        transport.send(&firmware_request()).await.unwrap();
        assert_eq!(handle.pending(), 1);

        let received = transport.receive(Duration::from_secs(1)).await.unwrap();
        assert_eq!(&received[..], &[0xAA, 0xBB]);

        assert_eq!(handle.sent().len(), 2);
        assert!(handle.sent_frames()[1].is(Command::GetFirmware));
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_times_out_when_idle() {
        let mut transport = MemoryTransport::new();
        transport.open().await.unwrap();

        let started = tokio::time::Instant::now();
        let result = transport.receive(Duration::from_millis(250)).await;

        assert!(matches!(result, Err(Error::ReadTimeout)));
        assert_eq!(started.elapsed(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_injected_error_and_remote_close() {
        let mut transport = MemoryTransport::new();
        let handle = transport.clone();
        transport.open().await.unwrap();

        handle.push_incoming([0x01]);
        handle.inject_error(io::ErrorKind::BrokenPipe);
        handle.close_remote();

        assert!(transport.receive(Duration::from_millis(1)).await.is_ok());
        assert!(matches!(
            transport.receive(Duration::from_millis(1)).await,
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::BrokenPipe
        ));
        assert!(matches!(
            transport.receive(Duration::from_millis(1)).await,
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_clear_input_keeps_faults() {
        let mut transport = MemoryTransport::new();
        let handle = transport.clone();
        transport.open().await.unwrap();

        handle.push_incoming([0x01, 0x02]);
        handle.inject_error(io::ErrorKind::Other);
        handle.push_incoming([0x03]);

        transport.clear_input().await.unwrap();
        assert_eq!(handle.pending(), 1);
    }

    #[tokio::test]
    async fn test_clear_input_failure() {
        let mut transport = MemoryTransport::new();
        let handle = transport.clone();
        transport.open().await.unwrap();

        handle.push_incoming([0x01]);
        handle.fail_clear_input(io::ErrorKind::TimedOut);

        assert!(matches!(
            transport.clear_input().await,
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::TimedOut
        ));
        assert_eq!(handle.pending(), 1);
    }
}

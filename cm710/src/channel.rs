//! Request/response correlation over a transport

use std::time::Duration;

use bytes::BytesMut;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use cm710_core::constants::{DEFAULT_CALL_TIMEOUT, MAX_CONSECUTIVE_INVALID, MAX_REPLY_FRAME_LEN};
use cm710_core::{frame, Command, Frame, FrameBuffer};
use cm710_transport::Transport;

use crate::error::{Error, Result};

/// Command channel to a module
///
/// Owns the transport and a decode buffer. Calls assume the module is not
/// streaming inventory; unrelated frames that arrive while waiting are
/// dropped.
pub struct CommandChannel {
    transport: Box<dyn Transport>,
    buffer: FrameBuffer,
    call_timeout: Duration,
}

impl CommandChannel {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            buffer: FrameBuffer::with_max_frame_len(MAX_REPLY_FRAME_LEN),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Set the default wait for [`call`](Self::call)
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    pub fn name(&self) -> String {
        self.transport.name()
    }

    pub async fn open(&mut self) -> Result<()> {
        self.transport.open().await?;
        self.buffer.clear();
        Ok(())
    }

    pub async fn close(&mut self) -> Result<()> {
        self.buffer.clear();
        self.transport.close().await?;
        Ok(())
    }

    /// Write a command without waiting for an answer
    pub async fn send(&mut self, command: Command, data: &[u8]) -> Result<()> {
        let encoded = frame::encode(command, data)?;

        trace!("Sending {}: {:02X?}", command, &encoded[..]);

        self.transport.send(&encoded).await?;
        Ok(())
    }

    /// Send `command` and wait for the `expected` reply using the default timeout
    pub async fn call(&mut self, command: Command, data: &[u8], expected: Command) -> Result<Frame> {
        self.call_with_timeout(command, data, expected, self.call_timeout)
            .await
    }

    /// Send `command` and wait up to `timeout` for a frame carrying `expected`
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] when no matching frame arrives in time
    /// - [`Error::ProtocolDesync`] after three invalid frames in a row
    /// - [`Error::Transport`] on I/O failure
    pub async fn call_with_timeout(
        &mut self,
        command: Command,
        data: &[u8],
        expected: Command,
        timeout: Duration,
    ) -> Result<Frame> {
        self.send(command, data).await?;

        let deadline = Instant::now() + timeout;
        let mut failures = 0;

        loop {
            while let Some(decoded) = self.buffer.next_frame() {
                match decoded {
                    Ok(frame) if frame.is(expected) => {
                        trace!("Received {}", frame);
                        return Ok(frame);
                    }
                    Ok(frame) => {
                        failures = 0;
                        debug!("Discarding {} while waiting for {}", frame, expected);
                    }
                    Err(e) => {
                        failures += 1;
                        warn!("Invalid frame while waiting for {}: {}", expected, e);

                        if failures >= MAX_CONSECUTIVE_INVALID {
                            return Err(Error::ProtocolDesync {
                                command: expected,
                                failures,
                            });
                        }
                    }
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout {
                    command: expected,
                    waited_ms: timeout.as_millis() as u64,
                });
            }

            match self.transport.receive(remaining).await {
                Ok(chunk) => self.buffer.extend(&chunk),
                Err(e) if e.is_timeout() => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Read one raw chunk, bypassing the decode buffer
    pub async fn receive(&mut self, timeout: Duration) -> cm710_transport::Result<BytesMut> {
        self.transport.receive(timeout).await
    }

    /// Drop buffered and pending input
    pub async fn purge(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            debug!("Purging {} buffered bytes", self.buffer.len());
        }
        self.buffer.clear();
        self.transport.clear_input().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cm710_transport::MemoryTransport;
    use pretty_assertions::assert_eq;

    async fn open_channel() -> (CommandChannel, MemoryTransport) {
        let transport = MemoryTransport::new();
        let mut channel = CommandChannel::new(Box::new(transport.clone()))
            .with_call_timeout(Duration::from_millis(500));
        channel.open().await.unwrap();
        (channel, transport)
    }

    fn reply(command: Command, data: &[u8]) -> Vec<u8> {
        frame::encode(command, data).unwrap().to_vec()
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_returns_matching_frame() {
        let (mut channel, module) = open_channel().await;
        module.reply_to(Command::GetFirmware, reply(Command::FirmwareReply, &[0x00, 0x00, 0x02, 0x01, 0x00]));

        let frame = channel
            .call(Command::GetFirmware, &[], Command::FirmwareReply)
            .await
            .unwrap();

        assert!(frame.is(Command::FirmwareReply));
        assert_eq!(&frame.data[2..5], &[0x02, 0x01, 0x00]);
        assert_eq!(
            &module.sent()[0][..],
            &[0xC8, 0x8C, 0x00, 0x08, 0x02, 0x0A, 0x0D, 0x0A]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_skips_unrelated_frames() {
        let (mut channel, module) = open_channel().await;
        let mut bytes = vec![0x00, 0x13];
        bytes.extend(reply(Command::InventoryData, &[0x30, 0x00]));
        bytes.extend(reply(Command::RegionReply, &[0x01, 0x08]));
        module.reply_to(Command::GetRegion, bytes);

        let frame = channel
            .call(Command::GetRegion, &[], Command::RegionReply)
            .await
            .unwrap();

        assert_eq!(&frame.data[..], &[0x01, 0x08]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_reassembles_split_reply() {
        let (mut channel, module) = open_channel().await;
        let bytes = reply(Command::TemperatureReply, &[0x00, 0x0A, 0x8C]);
        module.push_incoming(&bytes[..4]);
        module.reply_to(Command::GetTemperature, &bytes[4..]);

        let frame = channel
            .call(Command::GetTemperature, &[], Command::TemperatureReply)
            .await
            .unwrap();

        assert_eq!(&frame.data[..], &[0x00, 0x0A, 0x8C]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_times_out() {
        let (mut channel, _module) = open_channel().await;
        let started = Instant::now();

        let err = channel
            .call(Command::GetRegion, &[], Command::RegionReply)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Timeout { command: Command::RegionReply, waited_ms: 500 }
        ));
        assert_eq!(started.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_desyncs_after_three_invalid_frames() {
        let (mut channel, module) = open_channel().await;
        let mut corrupted = reply(Command::RegionReply, &[0x01, 0x08]);
        let bcc = corrupted.len() - 3;
        corrupted[bcc] ^= 0xFF;
        module.reply_to(Command::GetRegion, corrupted.repeat(3));

        let err = channel
            .call(Command::GetRegion, &[], Command::RegionReply)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ProtocolDesync { failures: 3, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_frame_resets_invalid_count() {
        let (mut channel, module) = open_channel().await;
        let mut corrupted = reply(Command::RegionReply, &[0x01, 0x08]);
        let bcc = corrupted.len() - 3;
        corrupted[bcc] ^= 0xFF;

        let mut bytes = corrupted.repeat(2);
        bytes.extend(reply(Command::AntennasReply, &[0x01, 0x00, 0x0F]));
        bytes.extend(corrupted.repeat(2));
        bytes.extend(reply(Command::RegionReply, &[0x01, 0x3C]));
        module.reply_to(Command::GetRegion, bytes);

        let frame = channel
            .call(Command::GetRegion, &[], Command::RegionReply)
            .await
            .unwrap();

        assert_eq!(frame.data[1], 0x3C);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_realigns_after_corrupted_length() {
        let (mut channel, module) = open_channel().await;
        let mut bytes = reply(Command::RegionReply, &[0x01, 0x08]);
        bytes[2] = 0x40;
        bytes.extend(reply(Command::RegionReply, &[0x01, 0x3C]));
        module.reply_to(Command::GetRegion, bytes);

        let frame = channel
            .call(Command::GetRegion, &[], Command::RegionReply)
            .await
            .unwrap();

        assert_eq!(&frame.data[..], &[0x01, 0x3C]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_desyncs_on_repeated_oversized_length() {
        let (mut channel, module) = open_channel().await;
        let mut corrupted = reply(Command::RegionReply, &[0x01, 0x08]);
        corrupted[3] = 0xFF;
        module.reply_to(Command::GetRegion, corrupted.repeat(3));

        let err = channel
            .call(Command::GetRegion, &[], Command::RegionReply)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ProtocolDesync { failures: 3, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_propagates_transport_error() {
        let (mut channel, module) = open_channel().await;
        module.inject_error(std::io::ErrorKind::BrokenPipe);

        let err = channel
            .call(Command::GetRegion, &[], Command::RegionReply)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport(cm710_transport::Error::Io(_))));
    }

    #[tokio::test]
    async fn test_send_is_fire_and_forget() {
        let (mut channel, module) = open_channel().await;

        channel
            .send(Command::StartInventory, &[0x00, 0x00])
            .await
            .unwrap();

        assert_eq!(
            &module.sent()[0][..],
            &[0xC8, 0x8C, 0x00, 0x0A, 0x82, 0x00, 0x00, 0x88, 0x0D, 0x0A]
        );
    }

    #[tokio::test]
    async fn test_purge_drops_pending_input() {
        let (mut channel, module) = open_channel().await;
        module.push_incoming(reply(Command::RegionReply, &[0x01, 0x08]));

        channel.purge().await.unwrap();
        assert_eq!(module.pending(), 0);
    }

    #[tokio::test]
    async fn test_send_when_closed() {
        let mut channel = CommandChannel::new(Box::new(MemoryTransport::new()));

        let err = channel.send(Command::GetRegion, &[]).await.unwrap_err();
        assert!(matches!(err, Error::Transport(cm710_transport::Error::NotOpen)));
    }
}

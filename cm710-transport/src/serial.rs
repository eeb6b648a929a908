//! Serial transport
//!
//! The CM710-4 is wired to a USB-UART bridge (`/dev/ttyUSB*` or
//! `/dev/ttyACM*`) running 115200 8N1.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, trace, warn};

use cm710_core::constants::DEFAULT_BAUD_RATE;

use crate::{error::*, Transport};

/// Serial transport for CM710 modules
pub struct SerialTransport {
    path: String,
    baud_rate: u32,
    stream: Option<SerialStream>,
}

impl SerialTransport {
    /// Create new serial transport at the default 115200 baud
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            stream: None,
        }
    }

    /// Set baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Err(Error::AlreadyOpen);
        }

        if !Path::new(&self.path).exists() {
            return Err(Error::NoDeviceFound(self.path.clone()));
        }

        debug!("Opening {} at {} baud...", self.path, self.baud_rate);

        let stream = tokio_serial::new(&self.path, self.baud_rate)
            .open_native_async()
            .map_err(|e| match e.kind {
                tokio_serial::ErrorKind::NoDevice => Error::NoDeviceFound(self.path.clone()),
                _ => Error::Serial(e),
            })?;

        debug!("Opened {}", self.path);

        self.stream = Some(stream);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            debug!("Closing {}...", self.path);

            let _ = stream.flush().await;
        }

        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotOpen)?;

        trace!("Sending {} bytes: {:02X?}", data.len(), &data[..data.len().min(32)]);

        stream.write_all(data).await?;
        stream.flush().await?;

        Ok(())
    }

    async fn receive(&mut self, read_timeout: Duration) -> Result<BytesMut> {
        let stream = self.stream.as_mut().ok_or(Error::NotOpen)?;

        let mut buf = BytesMut::with_capacity(512);

        let n = timeout(read_timeout, stream.read_buf(&mut buf))
            .await
            .map_err(|_| Error::ReadTimeout)?
            .map_err(Error::Io)?;

        if n == 0 {
            warn!("Serial device {} returned end of stream", self.path);
            return Err(Error::ConnectionClosed);
        }

        trace!("Received {} bytes: {:02X?}", n, &buf[..n.min(32)]);

        Ok(buf)
    }

    async fn clear_input(&mut self) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotOpen)?;
        stream.clear(tokio_serial::ClearBuffer::Input)?;
        Ok(())
    }

    fn name(&self) -> String {
        self.path.clone()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.is_open() {
            warn!("Serial transport dropped while still open");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serial_transport_create() {
        let transport = SerialTransport::new("/dev/ttyUSB0").with_baud_rate(57_600);
        assert!(!transport.is_open());
        assert_eq!(transport.baud_rate(), 57_600);
        assert_eq!(transport.name(), "/dev/ttyUSB0");
    }

    #[tokio::test]
    async fn test_serial_transport_missing_device() {
        let mut transport = SerialTransport::new("/dev/cm710-does-not-exist");

        let result = transport.open().await;
        assert!(matches!(result, Err(Error::NoDeviceFound(path)) if path == "/dev/cm710-does-not-exist"));
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_serial_transport_not_open() {
        let mut transport = SerialTransport::new("/dev/ttyUSB0");

        assert!(matches!(transport.send(&[0x00]).await, Err(Error::NotOpen)));
        assert!(matches!(
            transport.receive(Duration::from_millis(10)).await,
            Err(Error::NotOpen)
        ));
    }
}

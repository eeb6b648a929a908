//! Transport layer for the CM710 protocol
//!
//! Provides the byte channel to the module (serial port or in-memory) and the
//! module power capability.

pub mod error;
pub mod memory;
pub mod power;
pub mod serial;

pub use error::{Error, Result};
pub use memory::MemoryTransport;
pub use power::{ModulePower, NoPowerControl};
pub use serial::SerialTransport;

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;

/// Bidirectional byte channel to a module
#[async_trait]
pub trait Transport: Send + Sync {
    /// Acquire the underlying device
    async fn open(&mut self) -> Result<()>;

    /// Release the underlying device
    async fn close(&mut self) -> Result<()>;

    /// Check if open
    fn is_open(&self) -> bool;

    /// Send raw bytes
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive whatever bytes are available, waiting at most `timeout`
    ///
    /// Returns [`Error::ReadTimeout`] when nothing arrived in time.
    async fn receive(&mut self, timeout: Duration) -> Result<BytesMut>;

    /// Discard input received but not yet read
    async fn clear_input(&mut self) -> Result<()>;

    /// Device name for logs
    fn name(&self) -> String;
}

//! # cm710
//!
//! Async driver for CM710-4 UHF RFID reader modules on a serial link.
//!
//! ## Features
//!
//! - Continuous inventory decoding into timestamped tag readings
//! - Module configuration: power, region, antennas, fixed frequency, FastID
//! - Request/response correlation with frame resynchronisation
//! - Async/await API using Tokio
//!
//! ## Quick Start
//!
//! ```no_run
//! use cm710::{ModuleSettings, ReaderConfig, ReaderSession, TxPower};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> cm710::Result<()> {
//!     let config = ReaderConfig::from_env()?;
//!     let mut reader = ReaderSession::new(config);
//!
//!     let settings = ModuleSettings::new().with_power(TxPower::new(26)?);
//!     let cancel = CancellationToken::new();
//!
//!     let stats = reader
//!         .run(&settings, |tag| println!("{}", tag), &cancel)
//!         .await?;
//!     println!("{} readings", stats.readings);
//!
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod reader;
pub mod reader_config;

// Re-exports
pub use channel::CommandChannel;
pub use config::{ConfigSnapshot, ConfigurationManager, SetOutcome};
pub use error::{Error, Result};
pub use reader::{ChannelSink, ReaderSession, ReadingSink};
pub use reader_config::ReaderConfig;

// Re-export protocol and value types
pub use cm710_core::{Command, Frame, InventoryStats, SessionState};
pub use cm710_transport::{MemoryTransport, ModulePower, NoPowerControl, SerialTransport, Transport};
pub use cm710_types::{
    AntennaMask, FastIdStatus, Firmware, Frequency, ModuleConfig, ModuleSettings, Region, Setting,
    TagReading, TxPower,
};

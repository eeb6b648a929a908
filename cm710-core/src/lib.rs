//! # cm710-core
//!
//! Core protocol implementation for CM710-4 UHF RFID reader modules.
//!
//! This crate provides the low-level protocol primitives:
//! - Frame structure and encoding/decoding
//! - BCC checksum calculation
//! - Command definitions
//! - Continuous inventory stream decoding
//! - Session state tracking

pub mod checksum;
pub mod command;
pub mod constants;
pub mod error;
pub mod frame;
pub mod frame_buffer;
pub mod inventory;
pub mod session;

pub use command::Command;
pub use error::{Error, Result};
pub use frame::{Decoded, Frame, FrameError};
pub use frame_buffer::FrameBuffer;
pub use inventory::{InventoryParser, InventoryStats, Readings};
pub use session::{Session, SessionState};

//! Type definitions for cm710

pub mod antenna;
pub mod error;
pub mod module_config;
pub mod region;
pub mod setting;
pub mod tag;

pub use antenna::AntennaMask;
pub use error::{Error, Result};
pub use module_config::{FastIdStatus, Firmware, ModuleConfig};
pub use region::Region;
pub use setting::{Frequency, ModuleSettings, Setting, TxPower};
pub use tag::{ReadContext, TagReading};

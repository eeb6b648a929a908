//! Module power control
//!
//! The CM710-4 is powered through a GPIO line on the host board. Driving that
//! line is the job of the host integration; the reader only asks for power
//! before opening the port and releases it after closing.

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;

/// Power line of the module
#[async_trait]
pub trait ModulePower: Send + Sync {
    /// Switch the module on
    async fn enable(&mut self) -> Result<()>;

    /// Switch the module off
    async fn disable(&mut self) -> Result<()>;
}

/// Power control for modules that are permanently powered
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPowerControl;

#[async_trait]
impl ModulePower for NoPowerControl {
    async fn enable(&mut self) -> Result<()> {
        debug!("Module power is not switchable, assuming on");
        Ok(())
    }

    async fn disable(&mut self) -> Result<()> {
        Ok(())
    }
}

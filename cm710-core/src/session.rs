//! Reader session state
//!
//! A session tracks where the reader is in its lifecycle:
//!
//! ```text
//! Closed -> Open -> Configuring -> Open -> Streaming -> Stopping -> Open -> Closed
//! ```
//!
//! Request/response calls assume no unsolicited inventory frames are in
//! flight, so configuration is only allowed from `Open`.

use std::sync::Arc;

use crate::error::{Error, Result};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport released
    Closed,

    /// Transport held, module idle
    Open,

    /// Configuration calls in progress
    Configuring,

    /// Continuous inventory running
    Streaming,

    /// Stop command sent, draining the stream
    Stopping,
}

/// Session state holder
///
/// Thread-safe and can be cloned cheaply (Arc internally), so a
/// configuration guard can hand the state back when it is dropped.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<parking_lot::RwLock<SessionState>>,
}

impl Session {
    /// Create a closed session
    pub fn new() -> Self {
        Self {
            inner: Arc::new(parking_lot::RwLock::new(SessionState::Closed)),
        }
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        *self.inner.read()
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.state(), SessionState::Closed)
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.state(), SessionState::Streaming)
    }

    /// Transport acquired
    pub fn open(&self) -> Result<()> {
        self.transition(&[SessionState::Closed], SessionState::Open, "open")
    }

    /// Enter configuration; refused while streaming
    pub fn begin_configure(&self) -> Result<()> {
        self.transition(&[SessionState::Open], SessionState::Configuring, "configure")
    }

    /// Leave configuration
    pub fn end_configure(&self) {
        let mut state = self.inner.write();
        if *state == SessionState::Configuring {
            *state = SessionState::Open;
        }
    }

    /// Continuous inventory started
    pub fn start_streaming(&self) -> Result<()> {
        self.transition(&[SessionState::Open], SessionState::Streaming, "start inventory")
    }

    /// Stop command about to be sent
    pub fn begin_stop(&self) -> Result<()> {
        self.transition(&[SessionState::Streaming], SessionState::Stopping, "stop inventory")
    }

    /// Stream drained
    pub fn finish_stop(&self) -> Result<()> {
        self.transition(&[SessionState::Stopping], SessionState::Open, "finish stop")
    }

    /// Fail unless the session is in `expected`
    pub fn require(&self, expected: SessionState) -> Result<()> {
        let state = self.state();
        if state != expected {
            return Err(Error::InvalidSessionState(format!(
                "Expected {:?}, session is {:?}",
                expected, state
            )));
        }
        Ok(())
    }

    /// Close session from any state
    pub fn close(&self) {
        *self.inner.write() = SessionState::Closed;
    }

    fn transition(&self, from: &[SessionState], to: SessionState, action: &str) -> Result<()> {
        let mut state = self.inner.write();

        if !from.contains(&*state) {
            return Err(Error::InvalidSessionState(format!(
                "Cannot {} from state: {:?}",
                action, *state
            )));
        }

        *state = to;
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

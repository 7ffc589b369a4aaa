//! Session lifecycle signal.
//!
//! The pipeline reports teardown here instead of driving navigation itself.
//! Whatever owns the UI subscribes and reacts to the transition; redundant
//! teardown signals collapse, so an already signed-out session is never
//! "signed out" twice.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// Whether the process currently holds a usable session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    SignedOut,
}

/// Broadcast handle for session state transitions.
/// Clone is cheap - clones share the same underlying channel.
#[derive(Debug, Clone)]
pub struct SessionMonitor {
    tx: Arc<watch::Sender<SessionState>>,
}

impl SessionMonitor {
    pub fn new(initial: SessionState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn state(&self) -> SessionState {
        *self.tx.borrow()
    }

    /// Subscribe to state transitions. The receiver sees the current state
    /// immediately and every transition afterward.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Mark the session signed out.
    ///
    /// Returns true when this call performed the transition, false when the
    /// session was already signed out and nothing was broadcast.
    pub fn sign_out(&self) -> bool {
        let changed = self.tx.send_if_modified(|state| {
            if *state == SessionState::SignedOut {
                false
            } else {
                *state = SessionState::SignedOut;
                true
            }
        });
        if changed {
            info!("Session signed out");
        }
        changed
    }

    /// Mark the session active, after a login or a restored session.
    pub fn activate(&self) {
        self.tx.send_if_modified(|state| {
            if *state == SessionState::Active {
                false
            } else {
                *state = SessionState::Active;
                true
            }
        });
    }
}

impl Default for SessionMonitor {
    fn default() -> Self {
        Self::new(SessionState::SignedOut)
    }
}

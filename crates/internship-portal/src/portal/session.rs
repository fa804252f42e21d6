use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

/// Lifecycle of a signed-in student session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    /// The backend answered 401; the holder must sign in again.
    Expired,
    /// Explicit logout.
    Ended,
}

/// Bearer-token holder for one student. Created at sign-in, torn down at logout or on the
/// first 401 from the backend.
#[derive(Debug)]
pub struct Session {
    token: RwLock<Option<String>>,
    state: watch::Sender<SessionState>,
}

impl Session {
    pub fn start(token: impl Into<String>) -> Arc<Self> {
        let (state, _) = watch::channel(SessionState::Active);
        Arc::new(Self {
            token: RwLock::new(Some(token.into())),
            state,
        })
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Token to attach to outgoing requests; `None` once the session is no longer active.
    pub fn bearer(&self) -> Option<String> {
        if !self.is_active() {
            return None;
        }
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Observers (CLI, views) use this to force a redirect to sign-in.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Called when the backend rejects the token.
    pub fn expire(&self) {
        if self.close(SessionState::Expired) {
            warn!("session expired, bearer token discarded");
        }
    }

    pub fn end(&self) {
        if self.close(SessionState::Ended) {
            info!("session ended");
        }
    }

    fn close(&self, next: SessionState) -> bool {
        self.token
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.state.send_if_modified(|state| {
            if *state == SessionState::Active {
                *state = next;
                true
            } else {
                false
            }
        })
    }
}

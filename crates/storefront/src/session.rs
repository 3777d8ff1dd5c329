//! Session boundary.
//!
//! The [`Session`] is the only cross-store coordination point. Its state is a
//! watched value for observers that care about transitions, and logout runs
//! every registered [`SessionListener`] synchronously, in registration order,
//! exactly once per call.

use std::sync::{Arc, PoisonError, RwLock};

use pzafira_core::UserId;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, instrument};

use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};

/// The signed-in user as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub is_staff: bool,
}

/// Session state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated(CurrentUser),
}

impl SessionState {
    #[must_use]
    pub const fn user(&self) -> Option<&CurrentUser> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(user) => Some(user),
        }
    }
}

/// Something that must forget per-user state on logout.
///
/// Implementations must not block or perform I/O beyond local snapshot
/// removal.
pub trait SessionListener: Send + Sync {
    fn on_logout(&self);
}

/// Shared session context.
pub struct Session {
    state: watch::Sender<SessionState>,
    listeners: RwLock<Vec<Arc<dyn SessionListener>>>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Anonymous);
        Self {
            state,
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a listener to run on every logout.
    pub fn register(&self, listener: Arc<dyn SessionListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Watch state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn current_user(&self) -> Option<CurrentUser> {
        self.state.borrow().user().cloned()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().user().is_some()
    }

    /// Whether the signed-in user may change order statuses.
    #[must_use]
    pub fn is_staff(&self) -> bool {
        self.state.borrow().user().is_some_and(|user| user.is_staff)
    }

    /// Mark the session as authenticated.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub fn login(&self, user: CurrentUser) {
        set_sentry_user(&user.id, user.email.as_deref());
        info!("Session authenticated");
        self.state.send_replace(SessionState::Authenticated(user));
    }

    /// End the session and clear every listener's state.
    #[instrument(skip(self))]
    pub fn logout(&self) {
        self.state.send_replace(SessionState::Anonymous);

        // Snapshot the list so listeners may register others without deadlock.
        let listeners: Vec<_> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in &listeners {
            listener.on_logout();
        }

        clear_sentry_user();
        add_breadcrumb("session", "user-logged-out", sentry::Level::Info, None);
        info!(listeners = listeners.len(), "Session ended");
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &*self.state.borrow())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

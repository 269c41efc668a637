//! Remote identity session models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authenticated identity as reported by the remote identity service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    /// Stable identifier; partitions remote records
    pub id: String,
    pub email: String,
}

/// An active remote session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub user: Identity,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Kind of session change pushed by the identity service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    UserUpdated,
    PasswordRecovery,
}

/// Session change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    /// Session after the change; `None` once signed out
    pub session: Option<Session>,
}

/// Whether the visitor is using local-only or remote-backed storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionMode {
    Guest,
    Authenticated,
}

/// Surfaces the portal can send a visitor to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    /// Entry surface (login / sign-up / guest entry)
    Auth,
    /// Protected application home
    Home,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Auth => "/auth",
            Route::Home => "/",
        }
    }
}

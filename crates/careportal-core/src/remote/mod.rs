//! Contracts with the hosted backend: identity, record store and blob store.
//!
//! The portal never talks to the backend directly; everything goes through
//! these traits so the data access layer and the access guard can run against
//! [`MemoryBackend`] in tests or any other implementation in production.

mod memory;
pub mod schema;

pub use memory::*;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::models::{AuthEvent, Identity, Session};

/// Postgres-style code for unique constraint violations.
pub const CODE_UNIQUE_VIOLATION: &str = "23505";
/// Postgres-style code for NOT NULL violations.
pub const CODE_NOT_NULL_VIOLATION: &str = "23502";
/// Postgres-style code for row-level security rejections.
pub const CODE_INSUFFICIENT_PRIVILEGE: &str = "42501";
/// Postgres-style code for unknown collections.
pub const CODE_UNDEFINED_TABLE: &str = "42P01";

/// Remote backend errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("{message}")]
    Service {
        code: Option<String>,
        message: String,
    },

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Malformed {collection} record: {reason}")]
    MalformedRecord { collection: String, reason: String },
}

impl RemoteError {
    pub fn service(code: &str, message: impl Into<String>) -> Self {
        RemoteError::Service {
            code: Some(code.to_string()),
            message: message.into(),
        }
    }

    /// Whether this is a duplicate-key rejection.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            RemoteError::Service { code, message } => {
                code.as_deref() == Some(CODE_UNIQUE_VIOLATION)
                    || message.to_lowercase().contains("duplicate")
            }
            _ => false,
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// An untyped record as returned by the backend.
pub type Row = Map<String, Value>;

/// Equality filter on one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self {
            column: column.to_string(),
            value: value.into(),
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        row.get(&self.column) == Some(&self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

/// Select query: equality filters, optional ordering and limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Result of a sign-up request.
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpOutcome {
    pub identity: Identity,
    /// Absent when the service requires email confirmation first
    pub session: Option<Session>,
}

/// Live subscription to session changes.
///
/// Dropping the subscription unsubscribes.
pub struct SessionSubscription {
    receiver: broadcast::Receiver<AuthEvent>,
}

impl SessionSubscription {
    pub fn new(receiver: broadcast::Receiver<AuthEvent>) -> Self {
        Self { receiver }
    }

    /// Wait for the next session change. `None` once the service shuts down.
    pub async fn recv(&mut self) -> Option<AuthEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "session subscription lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next change if one is already queued.
    pub fn try_recv(&mut self) -> Option<AuthEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

/// Remote identity service.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Current session, if any.
    async fn get_session(&self) -> RemoteResult<Option<Session>>;

    /// Identity behind the current session, if any.
    async fn get_user(&self) -> RemoteResult<Option<Identity>>;

    /// Subscribe to session changes.
    fn subscribe(&self) -> SessionSubscription;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> RemoteResult<Session>;

    async fn sign_up(&self, email: &str, password: &str) -> RemoteResult<SignUpOutcome>;

    async fn sign_out(&self) -> RemoteResult<()>;

    /// Change the signed-in identity's password.
    async fn update_password(&self, new_password: &str) -> RemoteResult<()>;

    /// Send a password-reset link.
    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> RemoteResult<()>;
}

/// Remote record store, organized in named collections.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn select(&self, collection: &str, query: &Query) -> RemoteResult<Vec<Row>>;

    /// Insert rows; returns them as stored (with server-generated columns).
    async fn insert(&self, collection: &str, rows: Vec<Row>) -> RemoteResult<Vec<Row>>;

    /// Apply `patch` to every matching row; returns the number updated.
    async fn update(&self, collection: &str, filters: &[Filter], patch: Row)
        -> RemoteResult<usize>;

    /// Delete every matching row; returns the number deleted.
    async fn delete(&self, collection: &str, filters: &[Filter]) -> RemoteResult<usize>;
}

/// Remote blob store, organized in buckets.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> RemoteResult<()>;

    fn public_url(&self, bucket: &str, path: &str) -> String;

    async fn remove(&self, bucket: &str, paths: &[String]) -> RemoteResult<()>;
}

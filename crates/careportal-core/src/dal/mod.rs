//! Data access layer.
//!
//! Appointment operations switch between the local store (guest) and the
//! remote record store (authenticated) on every call. Profiles and diary
//! entries are remote-only.

mod appointments;
mod diary;
mod profiles;

pub use appointments::*;
pub use diary::*;
pub use profiles::*;

use thiserror::Error;

use crate::db::DbError;
use crate::remote::RemoteError;

/// Data access errors.
#[derive(Error, Debug)]
pub enum DalError {
    #[error("No authenticated identity")]
    NoIdentity,

    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Local store error: {0}")]
    Local(#[from] DbError),

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl<T> From<std::sync::PoisonError<T>> for DalError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        DalError::Local(e.into())
    }
}

impl DalError {
    /// Failures the portal degrades through instead of surfacing.
    pub fn is_expected(&self) -> bool {
        matches!(self, DalError::NoIdentity | DalError::Remote(_))
    }
}

pub type DalResult<T> = Result<T, DalError>;

//! Session classification.
//!
//! A visitor is a guest iff the local store holds the guest flag with the
//! exact value `"true"`. The flag is re-read on every call so a guest→login
//! transition is visible immediately to every component sharing the store.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::db::{DbResult, LocalStore, SharedStore, KEY_GUEST};
use crate::models::{Identity, SessionMode};
use crate::remote::IdentityService;

/// Guest-mode flag key.
pub const GUEST_KEY: &str = KEY_GUEST;

/// Whether the store marks the current visitor as a guest.
///
/// Missing, unreadable or non-`"true"` values all classify as not guest.
pub fn is_guest_session(store: &LocalStore) -> bool {
    matches!(store.get_item(GUEST_KEY), Ok(Some(value)) if value == "true")
}

/// Explicit session context shared by the data access layer, the access
/// guard and the entry flows.
///
/// Built once at boot. It carries handles, not a cached verdict: the mode is
/// recomputed from the store on each query.
#[derive(Clone)]
pub struct SessionContext {
    store: SharedStore,
    identity: Arc<dyn IdentityService>,
}

impl SessionContext {
    pub fn new(store: SharedStore, identity: Arc<dyn IdentityService>) -> Self {
        Self { store, identity }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn identity_service(&self) -> &Arc<dyn IdentityService> {
        &self.identity
    }

    pub fn is_guest_session(&self) -> bool {
        match self.store.lock() {
            Ok(store) => is_guest_session(&store),
            Err(_) => {
                warn!("local store lock poisoned; classifying as not guest");
                false
            }
        }
    }

    pub fn mode(&self) -> SessionMode {
        if self.is_guest_session() {
            SessionMode::Guest
        } else {
            SessionMode::Authenticated
        }
    }

    /// Set the guest flag.
    pub fn enter_guest(&self) -> DbResult<()> {
        self.store.lock()?.set_item(GUEST_KEY, "true")?;
        debug!("guest flag set");
        Ok(())
    }

    /// Remove the guest flag. Guest data stays in the store.
    pub fn clear_guest(&self) -> DbResult<()> {
        self.store.lock()?.remove_item(GUEST_KEY)?;
        debug!("guest flag cleared");
        Ok(())
    }

    /// Resolve the remote identity. Lookup failures count as no identity.
    pub async fn current_identity(&self) -> Option<Identity> {
        match self.identity.get_user().await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "identity lookup failed");
                None
            }
        }
    }
}

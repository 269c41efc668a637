//! Careportal Core Library
//!
//! Patient portal core with dual-mode data access: guests keep everything in
//! a local store, signed-in visitors use a remote backend partitioned by
//! identity.
//!
//! # Architecture
//!
//! ```text
//!                      ┌──────────────── Entry flows (auth) ────────────────┐
//!                      │ login / sign-up / enter as guest / logout          │
//!                      └───────────────┬─────────────────────┬──────────────┘
//!                                      │ guest flag          │ remote session
//!                                      ▼                     ▼
//!                              ┌───────────────┐     ┌────────────────┐
//!                              │  LocalStore   │     │ IdentityService│
//!                              └───────┬───────┘     └───────┬────────┘
//!                                      └──── SessionContext ─┘
//!                                                │
//!                          ┌─────────────────────┼─────────────────────┐
//!                          ▼                     ▼                     ▼
//!                    Access Guard        Appointment DAL         Diary / Profiles
//!                 (redirect/onboard)   guest ⇒ local store      remote only
//!                                      auth  ⇒ RecordStore
//! ```
//!
//! # Core Principle
//!
//! **The session mode is never cached.** Every data access re-reads the guest
//! flag, so switching between guest and account takes effect immediately.
//!
//! # Modules
//!
//! - [`db`]: SQLite-backed local key-value store
//! - [`models`]: Domain types (Appointment, Username, Session, settings, diary)
//! - [`session`]: Session classifier and [`SessionContext`]
//! - [`remote`]: Backend contracts plus the in-process [`MemoryBackend`]
//! - [`dal`]: Appointment, profile and diary repositories
//! - [`guard`]: Access guard state machine and onboarding
//! - [`auth`]: Entry-surface flows
//! - [`schedule`]: Upcoming list and calendar grid
//! - [`config`], [`logging`]: Ambient setup

pub mod auth;
pub mod config;
pub mod dal;
pub mod db;
pub mod guard;
pub mod logging;
pub mod models;
pub mod remote;
pub mod schedule;
pub mod session;

// Re-export commonly used types
pub use auth::{AuthError, AuthFlow, AuthOutcome};
pub use config::{ConfigError, PortalConfig};
pub use dal::{AppointmentRepository, DalError, DiaryRepository, ProfileLookup, ProfileRepository};
pub use db::{DbError, LocalStore, SharedStore};
pub use guard::{AccessGuard, GuardConfig, GuardState, GuardView, OnboardingError};
pub use models::{
    Appointment, BookingError, BookingRequest, DiaryDraft, DiaryEntry, Identity,
    NotificationSettings, Profile, Route, SecuritySettings, Session, SessionMode,
    UserProfileSettings, Username,
};
pub use remote::{BlobStore, IdentityService, MemoryBackend, RecordStore, RemoteError};
pub use schedule::{upcoming, CalendarDay, CalendarMonth};
pub use session::SessionContext;

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

// =========================================================================
// Error Type
// =========================================================================

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("Local store error: {0}")]
    Local(#[from] DbError),

    #[error("{0}")]
    Remote(#[from] RemoteError),

    #[error("{0}")]
    Data(#[from] DalError),

    #[error("{0}")]
    Booking(#[from] BookingError),

    #[error("{0}")]
    Onboarding(#[from] OnboardingError),

    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Config(#[from] ConfigError),
}

impl<T> From<std::sync::PoisonError<T>> for PortalError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        PortalError::Local(e.into())
    }
}

pub type PortalResult<T> = Result<T, PortalError>;

// =========================================================================
// Portal
// =========================================================================

/// Boot-time wiring: one local store, one session context, one backend.
pub struct Portal {
    store: SharedStore,
    session: SessionContext,
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    config: PortalConfig,
}

impl Portal {
    /// Open the local store named by `config` (in-memory when unset) and
    /// attach `backend` for identity, records and blobs.
    pub fn open<B>(config: PortalConfig, backend: Arc<B>) -> PortalResult<Self>
    where
        B: IdentityService + RecordStore + BlobStore + 'static,
    {
        let store = match &config.local_store_path {
            Some(path) => LocalStore::open(path)?,
            None => LocalStore::open_in_memory()?,
        }
        .into_shared();

        let identity: Arc<dyn IdentityService> = backend.clone();
        let records: Arc<dyn RecordStore> = backend.clone();
        let blobs: Arc<dyn BlobStore> = backend;
        info!(
            local_store = ?config.local_store_path,
            "portal opened"
        );

        Ok(Self {
            session: SessionContext::new(store.clone(), identity),
            store,
            records,
            blobs,
            config,
        })
    }

    /// Portal over an in-memory store with default settings (for testing).
    pub fn open_in_memory<B>(backend: Arc<B>) -> PortalResult<Self>
    where
        B: IdentityService + RecordStore + BlobStore + 'static,
    {
        Self::open(PortalConfig::default(), backend)
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn appointments(&self) -> AppointmentRepository {
        AppointmentRepository::new(self.session.clone(), self.records.clone())
    }

    pub fn profiles(&self) -> ProfileRepository {
        ProfileRepository::new(self.records.clone())
    }

    pub fn diary(&self) -> DiaryRepository {
        DiaryRepository::new(self.session.clone(), self.records.clone(), self.blobs.clone())
    }

    /// A fresh guard for one mount of the protected surface.
    pub fn guard(&self) -> AccessGuard {
        AccessGuard::new(self.session.clone(), self.profiles(), self.config.guard.clone())
    }

    pub fn auth(&self) -> AuthFlow {
        AuthFlow::new(self.session.clone(), self.profiles())
    }

    // =========================================================================
    // Booking
    // =========================================================================

    /// Validate a booking form and store the appointment in the current mode.
    pub async fn book(&self, request: BookingRequest, today: NaiveDate) -> PortalResult<Appointment> {
        let appointment = request.into_appointment(today)?;
        Ok(self.appointments().try_add(&appointment).await?)
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub fn profile_settings(&self) -> PortalResult<UserProfileSettings> {
        Ok(self.store.lock()?.load_user_profile()?)
    }

    /// Save profile settings locally, then mirror the display name to the
    /// remote profile for signed-in visitors.
    ///
    /// Returns whether the remote profile was updated. A display name that is
    /// not a valid username, or a failed remote update, leaves only the local
    /// copy changed.
    pub async fn save_profile_settings(&self, settings: &UserProfileSettings) -> PortalResult<bool> {
        self.store.lock()?.save_user_profile(settings)?;

        if self.session.is_guest_session() {
            return Ok(false);
        }
        let Some(identity) = self.session.current_identity().await else {
            return Ok(false);
        };
        let username = match Username::parse(&settings.display_name()) {
            Ok(username) => username,
            Err(e) => {
                warn!(error = %e, "display name not usable as username; remote profile unchanged");
                return Ok(false);
            }
        };

        match self.profiles().update_username(&identity.id, &username).await {
            Ok(updated) => Ok(updated),
            Err(e) if e.is_expected() => {
                warn!(error = %e, "remote username update failed");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn notification_settings(&self) -> PortalResult<NotificationSettings> {
        Ok(self.store.lock()?.load_notification_settings()?)
    }

    pub fn save_notification_settings(&self, settings: &NotificationSettings) -> PortalResult<()> {
        Ok(self.store.lock()?.save_notification_settings(settings)?)
    }

    pub fn security_settings(&self) -> PortalResult<SecuritySettings> {
        Ok(self.store.lock()?.load_security_settings()?)
    }

    pub fn save_security_settings(&self, settings: &SecuritySettings) -> PortalResult<()> {
        Ok(self.store.lock()?.save_security_settings(settings)?)
    }

    /// Wipe every local key, guest flag and guest data included.
    pub fn clear_local_data(&self) -> PortalResult<usize> {
        let removed = self.store.lock()?.clear()?;
        info!(removed, "local data cleared");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portal() -> (Portal, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::default());
        (Portal::open_in_memory(backend.clone()).unwrap(), backend)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 20).unwrap()
    }

    #[tokio::test]
    async fn test_guest_booking_stays_local() {
        let (portal, backend) = portal();
        portal.auth().enter_as_guest().unwrap();

        let request = BookingRequest {
            doctor_id: models::DOCTORS[0].id.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 6, 1),
            time: "09:00 AM".into(),
            notes: String::new(),
        };
        let booked = portal.book(request, today()).await.unwrap();
        assert!(booked.is_confirmed());
        assert_eq!(portal.appointments().fetch().await.unwrap(), vec![booked]);
        assert_eq!(backend.stats().insert, 0);
    }

    #[tokio::test]
    async fn test_booking_validation() {
        let (portal, backend) = portal();
        let request = BookingRequest {
            doctor_id: String::new(),
            date: None,
            time: String::new(),
            notes: String::new(),
        };
        assert!(matches!(
            portal.book(request, today()).await,
            Err(PortalError::Booking(BookingError::MissingFields(_)))
        ));
        assert_eq!(backend.stats(), Default::default());
    }

    #[tokio::test]
    async fn test_save_profile_settings_guest_is_local_only() {
        let (portal, backend) = portal();
        portal.auth().enter_as_guest().unwrap();

        let mut settings = portal.profile_settings().unwrap();
        settings.first_name = "Pat".into();
        assert!(!portal.save_profile_settings(&settings).await.unwrap());
        assert_eq!(portal.profile_settings().unwrap().first_name, "Pat");
        assert_eq!(backend.stats(), Default::default());
    }

    #[tokio::test]
    async fn test_save_profile_settings_updates_remote_username() {
        let (portal, backend) = portal();
        portal
            .auth()
            .sign_up("pat", "pat@example.com", "secret123")
            .await
            .unwrap();

        let settings = UserProfileSettings {
            first_name: "Pat".into(),
            last_name: String::new(),
            ..Default::default()
        };
        assert!(portal.save_profile_settings(&settings).await.unwrap());

        // A display name with a space is not a valid username
        let settings = UserProfileSettings {
            first_name: "Pat".into(),
            last_name: "Smith".into(),
            ..Default::default()
        };
        assert!(!portal.save_profile_settings(&settings).await.unwrap());
        assert_eq!(backend.stats().update, 1);
        assert_eq!(portal.profile_settings().unwrap().last_name, "Smith");
    }

    #[test]
    fn test_clear_local_data() {
        let (portal, _) = portal();
        portal.auth().enter_as_guest().unwrap();
        portal
            .save_security_settings(&SecuritySettings { two_factor_auth: true })
            .unwrap();

        assert_eq!(portal.clear_local_data().unwrap(), 3);
        assert!(!portal.session().is_guest_session());
        assert!(!portal.security_settings().unwrap().two_factor_auth);
    }
}

//! Access guard: the single authorization chokepoint in front of the
//! protected surface.
//!
//! ```text
//!   Initializing ──guest──────────────────────────────────────────► Ready
//!        │
//!        └─subscribe + get_session ─► (session?)
//!                                      │ none ─► Unauthenticated (redirect /auth)
//!                                      └ some ─► Authenticated ─► CheckingProfile
//!                                                                  │ found ─► Ready
//!                                                                  └ absent/error ─► AwaitingOnboarding
//!                                                                                     │ username saved
//!                                                                                     ▼
//!                                                                                   Ready
//! ```

mod onboarding;

pub use onboarding::*;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dal::{ProfileLookup, ProfileRepository};
use crate::models::{Identity, Route, Session};
use crate::remote::SessionSubscription;
use crate::session::SessionContext;

/// Guard tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Profile lookups attempted before a failing lookup is treated as
    /// "no profile" and onboarding is shown
    pub profile_check_attempts: u32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            profile_check_attempts: 2,
        }
    }
}

/// Guard lifecycle. Every transition is logged at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Initializing,
    CheckingProfile,
    /// Transient: a session was found and the profile check starts in the
    /// same step, so callers only see it in the transition log.
    Authenticated,
    Unauthenticated,
    AwaitingOnboarding,
    Ready,
}

/// What the guarded surface should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardView {
    /// Spinner while checks are in flight
    Loading,
    /// Nothing rendered; navigate away
    Redirect(Route),
    /// Onboarding form only
    Onboarding,
    /// Protected content
    Protected,
}

impl GuardState {
    pub fn view(&self) -> GuardView {
        match self {
            GuardState::Initializing | GuardState::Authenticated | GuardState::CheckingProfile => {
                GuardView::Loading
            }
            GuardState::Unauthenticated => GuardView::Redirect(Route::Auth),
            GuardState::AwaitingOnboarding => GuardView::Onboarding,
            GuardState::Ready => GuardView::Protected,
        }
    }
}

pub struct AccessGuard {
    session: SessionContext,
    profiles: ProfileRepository,
    config: GuardConfig,
    state: GuardState,
    identity: Option<Identity>,
    subscription: Option<SessionSubscription>,
}

impl AccessGuard {
    pub fn new(session: SessionContext, profiles: ProfileRepository, config: GuardConfig) -> Self {
        Self {
            session,
            profiles,
            config,
            state: GuardState::Initializing,
            identity: None,
            subscription: None,
        }
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    pub fn view(&self) -> GuardView {
        self.state.view()
    }

    /// Identity the guard last resolved from a session.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    fn set_state(&mut self, next: GuardState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "guard transition");
            self.state = next;
        }
    }

    /// Run the mount-time checks.
    ///
    /// Guests go straight to `Ready` without touching the identity service.
    /// Everyone else is subscribed to session changes first and then gets one
    /// session lookup; both feed [`handle_session`](Self::handle_session).
    pub async fn mount(&mut self) -> GuardView {
        self.subscription = None;
        self.identity = None;
        self.set_state(GuardState::Initializing);

        if self.session.is_guest_session() {
            info!("guest session; protected surface unlocked");
            self.set_state(GuardState::Ready);
            return self.view();
        }

        self.subscription = Some(self.session.identity_service().subscribe());
        let current = match self.session.identity_service().get_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "session lookup failed; treating as signed out");
                None
            }
        };
        self.handle_session(current).await
    }

    /// Wait for the next session change and apply it. `None` when not
    /// subscribed or the identity service went away.
    pub async fn next_event(&mut self) -> Option<GuardView> {
        let event = self.subscription.as_mut()?.recv().await?;
        debug!(kind = ?event.kind, "session change received");
        Some(self.handle_session(event.session).await)
    }

    /// Apply every session change already queued, without waiting.
    pub async fn process_pending_events(&mut self) -> GuardView {
        while let Some(event) = self.subscription.as_mut().and_then(|s| s.try_recv()) {
            debug!(kind = ?event.kind, "session change received");
            self.handle_session(event.session).await;
        }
        self.view()
    }

    /// Shared handler for the initial lookup and every pushed change.
    pub async fn handle_session(&mut self, session: Option<Session>) -> GuardView {
        let Some(session) = session else {
            self.identity = None;
            self.set_state(GuardState::Unauthenticated);
            info!(to = Route::Auth.path(), "no active session; redirecting");
            return self.view();
        };

        let identity = session.user;
        self.set_state(GuardState::Authenticated);
        self.set_state(GuardState::CheckingProfile);
        let has_profile = self.check_profile(&identity.id).await;
        self.identity = Some(identity);

        if has_profile {
            self.set_state(GuardState::Ready);
        } else {
            self.set_state(GuardState::AwaitingOnboarding);
        }
        self.view()
    }

    /// Lookup failures are retried, then counted as "no profile" so the
    /// visitor lands on onboarding instead of an endless spinner.
    async fn check_profile(&self, identity_id: &str) -> bool {
        let attempts = self.config.profile_check_attempts.max(1);
        for attempt in 1..=attempts {
            match self.profiles.lookup(identity_id).await {
                Ok(ProfileLookup::Found(_)) => return true,
                Ok(ProfileLookup::Absent) => return false,
                Err(e) => warn!(attempt, attempts, error = %e, "profile lookup failed"),
            }
        }
        false
    }

    /// Submit the onboarding form.
    ///
    /// On success the guard enters `Ready` using the identity it already
    /// holds; the session is not looked up again.
    pub async fn submit_username(&mut self, input: &str) -> Result<GuardView, OnboardingError> {
        if self.state != GuardState::AwaitingOnboarding {
            return Err(OnboardingError::NotAwaitingOnboarding);
        }
        let identity_id = self
            .identity
            .as_ref()
            .map(|i| i.id.clone())
            .ok_or(OnboardingError::NoIdentity)?;

        match register_username(&self.profiles, &identity_id, input).await {
            Ok(profile) => {
                info!(username = %profile.username, "onboarding complete");
                self.set_state(GuardState::Ready);
                Ok(self.view())
            }
            Err(OnboardingError::UsernameTaken) => {
                // The conflict may be this identity's own profile, left behind
                // by an earlier lookup that failed rather than came back empty
                if let Ok(ProfileLookup::Found(_)) = self.profiles.lookup(&identity_id).await {
                    info!("profile already present; skipping onboarding");
                    self.set_state(GuardState::Ready);
                    return Ok(self.view());
                }
                Err(OnboardingError::UsernameTaken)
            }
            Err(e) => Err(e),
        }
    }

    /// Release the session subscription.
    pub fn teardown(&mut self) {
        if self.subscription.take().is_some() {
            debug!("session subscription released");
        }
    }
}

impl Drop for AccessGuard {
    fn drop(&mut self) {
        self.teardown();
    }
}

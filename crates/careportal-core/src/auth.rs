//! Entry-surface flows: login, sign-up, guest entry, logout and password
//! management.

use thiserror::Error;
use tracing::{debug, info};

use crate::dal::{DalError, ProfileRepository};
use crate::db::DbError;
use crate::models::{Route, UserProfileSettings, Username};
use crate::remote::{RemoteError, MIN_PASSWORD_LEN};
use crate::session::SessionContext;

/// Entry flow errors; `Display` is the message shown on the form.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("That username is taken.")]
    UsernameTaken,

    #[error("{0}")]
    Remote(#[from] RemoteError),

    #[error("{0}")]
    Local(#[from] DbError),
}

impl From<DalError> for AuthError {
    fn from(e: DalError) -> Self {
        match e {
            DalError::Remote(e) if e.is_unique_violation() => AuthError::UsernameTaken,
            DalError::Remote(e) => AuthError::Remote(e),
            DalError::Local(e) => AuthError::Local(e),
            DalError::NoIdentity => AuthError::Remote(RemoteError::NotAuthenticated),
            DalError::Validation(msg) => AuthError::Validation(msg),
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Result of a submitted entry form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Navigate (replacing history)
    Redirect(Route),
    /// Account created; the address must be verified before logging in
    VerificationRequired,
}

pub const VERIFICATION_MESSAGE: &str =
    "Signup successful! Please check your email inbox and verify your address before logging in.";

pub const RESET_SENT_MESSAGE: &str = "Password reset email sent! Please check your inbox.";

#[derive(Clone)]
pub struct AuthFlow {
    session: SessionContext,
    profiles: ProfileRepository,
}

impl AuthFlow {
    pub fn new(session: SessionContext, profiles: ProfileRepository) -> Self {
        Self { session, profiles }
    }

    /// Where a visitor landing on the entry surface should go instead, if
    /// anywhere.
    pub async fn entry_redirect(&self) -> Option<Route> {
        if self.session.is_guest_session() {
            return Some(Route::Home);
        }
        match self.session.identity_service().get_session().await {
            Ok(Some(_)) => Some(Route::Home),
            _ => None,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthResult<AuthOutcome> {
        let session = self
            .session
            .identity_service()
            .sign_in_with_password(email, password)
            .await?;
        self.session.clear_guest()?;
        info!(user_id = %session.user.id, "login complete");
        Ok(AuthOutcome::Redirect(Route::Home))
    }

    /// Register an account and its profile.
    ///
    /// The username is validated before anything is sent. When the identity
    /// service withholds the session pending email verification, no profile
    /// is created; onboarding covers it after the first login.
    pub async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> AuthResult<AuthOutcome> {
        let username =
            Username::parse(username).map_err(|e| AuthError::Validation(e.to_string()))?;

        let outcome = self
            .session
            .identity_service()
            .sign_up(email, password)
            .await?;
        let Some(session) = outcome.session else {
            info!(user_id = %outcome.identity.id, "sign-up awaiting email verification");
            return Ok(AuthOutcome::VerificationRequired);
        };

        self.profiles.create(&session.user.id, &username).await?;
        self.session.clear_guest()?;
        info!(user_id = %session.user.id, username = %username, "sign-up complete");
        Ok(AuthOutcome::Redirect(Route::Home))
    }

    /// Enter the portal without an account.
    pub fn enter_as_guest(&self) -> AuthResult<AuthOutcome> {
        {
            let store = self.session.store().lock().map_err(DbError::from)?;
            store.save_user_profile(&UserProfileSettings::guest())?;
        }
        self.session.enter_guest()?;
        info!("entered as guest");
        Ok(AuthOutcome::Redirect(Route::Home))
    }

    /// Guests just drop the flag; their local data stays. Everyone else is
    /// signed out remotely.
    pub async fn logout(&self) -> AuthResult<Route> {
        if self.session.is_guest_session() {
            self.session.clear_guest()?;
            debug!("guest logout");
            return Ok(Route::Auth);
        }
        self.session.identity_service().sign_out().await?;
        Ok(Route::Auth)
    }

    pub async fn change_password(&self, new_password: &str, confirm: &str) -> AuthResult<()> {
        validate_new_password(new_password, confirm)?;
        self.session
            .identity_service()
            .update_password(new_password)
            .await?;
        info!("password changed");
        Ok(())
    }

    pub async fn request_password_reset(&self, email: &str, redirect_to: &str) -> AuthResult<()> {
        self.session
            .identity_service()
            .reset_password_for_email(email, redirect_to)
            .await?;
        Ok(())
    }
}

/// Local checks run before a password change reaches the identity service.
pub fn validate_new_password(new_password: &str, confirm: &str) -> AuthResult<()> {
    if new_password.is_empty() {
        return Err(AuthError::Validation("New password cannot be empty".into()));
    }
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if new_password != confirm {
        return Err(AuthError::Validation("Passwords do not match".into()));
    }
    Ok(())
}

//! Username onboarding for identities without a profile.

use thiserror::Error;

use crate::dal::{DalError, ProfileRepository};
use crate::models::{Profile, Username, UsernameError};
use crate::remote::RemoteError;

/// Onboarding errors; `Display` is the message shown next to the form.
#[derive(Error, Debug)]
pub enum OnboardingError {
    #[error("{0}")]
    InvalidUsername(#[from] UsernameError),

    #[error("Could not find logged-in user.")]
    NoIdentity,

    #[error("That username is taken.")]
    UsernameTaken,

    #[error("Onboarding is not in progress")]
    NotAwaitingOnboarding,

    #[error("{0}")]
    Remote(RemoteError),

    #[error("{0}")]
    Storage(DalError),
}

impl From<DalError> for OnboardingError {
    fn from(e: DalError) -> Self {
        match e {
            DalError::NoIdentity => OnboardingError::NoIdentity,
            DalError::Remote(e) if e.is_unique_violation() => OnboardingError::UsernameTaken,
            DalError::Remote(e) => OnboardingError::Remote(e),
            other => OnboardingError::Storage(other),
        }
    }
}

/// Validate locally, then create the profile.
///
/// Nothing reaches the record store when validation fails.
pub async fn register_username(
    profiles: &ProfileRepository,
    identity_id: &str,
    input: &str,
) -> Result<Profile, OnboardingError> {
    let username = Username::parse(input)?;
    Ok(profiles.create(identity_id, &username).await?)
}

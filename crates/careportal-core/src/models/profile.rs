//! Profile and username models.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Minimum username length in characters.
pub const USERNAME_MIN_LEN: usize = 3;
/// Maximum username length in characters.
pub const USERNAME_MAX_LEN: usize = 20;

/// Username validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsernameError {
    #[error("Username must be 3-20 chars, letters/numbers/._- only (got {0} chars)")]
    Length(usize),

    #[error("Username must be 3-20 chars, letters/numbers/._- only (found {0:?})")]
    InvalidCharacter(char),
}

/// A validated username: 3-20 ASCII letters, digits, `_`, `.` or `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    pub fn parse(input: &str) -> Result<Self, UsernameError> {
        let len = input.chars().count();
        if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
            return Err(UsernameError::Length(len));
        }
        if let Some(bad) = input
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
        {
            return Err(UsernameError::InvalidCharacter(bad));
        }
        Ok(Self(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Username {
    type Error = UsernameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Username::parse(&value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote profile record, keyed 1:1 by identity id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    /// Identity id
    pub id: String,
    /// Chosen display username
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

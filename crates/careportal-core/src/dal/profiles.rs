//! Remote profile access.

use std::sync::Arc;

use serde_json::{json, Map};

use super::DalResult;
use crate::models::{Profile, Username};
use crate::remote::schema::{parse_rows, to_row, ProfileRow, PROFILES};
use crate::remote::{Filter, Query, RecordStore};

/// Outcome of a profile lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileLookup {
    Found(Profile),
    Absent,
}

/// Profile repository. Profiles are keyed by identity id.
#[derive(Clone)]
pub struct ProfileRepository {
    records: Arc<dyn RecordStore>,
}

impl ProfileRepository {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    /// Look up the profile for an identity. Lookup failures are errors, not
    /// `Absent`.
    pub async fn lookup(&self, identity_id: &str) -> DalResult<ProfileLookup> {
        let query = Query::new().eq("id", identity_id).limit(1);
        let rows = self.records.select(PROFILES, &query).await?;
        let parsed: Vec<ProfileRow> = parse_rows(PROFILES, rows)?;
        Ok(match parsed.into_iter().next() {
            Some(row) => ProfileLookup::Found(row.into()),
            None => ProfileLookup::Absent,
        })
    }

    /// Create the identity's profile. An insert that succeeds without echoing
    /// a row yields the submitted profile, minus its creation timestamp.
    pub async fn create(&self, identity_id: &str, username: &Username) -> DalResult<Profile> {
        let submitted = ProfileRow {
            id: identity_id.to_string(),
            username: username.to_string(),
            created_at: None,
        };
        let row = to_row(PROFILES, &submitted)?;
        let stored = self.records.insert(PROFILES, vec![row]).await?;
        let parsed: Vec<ProfileRow> = parse_rows(PROFILES, stored)?;
        Ok(parsed.into_iter().next().unwrap_or(submitted).into())
    }

    /// Change the identity's username. Returns whether a profile was updated.
    pub async fn update_username(&self, identity_id: &str, username: &Username) -> DalResult<bool> {
        let mut patch = Map::new();
        patch.insert("username".into(), json!(username.as_str()));
        let updated = self
            .records
            .update(PROFILES, &[Filter::eq("id", identity_id)], patch)
            .await?;
        Ok(updated > 0)
    }
}

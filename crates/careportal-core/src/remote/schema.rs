//! Typed schema for the remote collections.
//!
//! Rows come back from the backend as untyped JSON objects. Every read goes
//! through [`parse_rows`], which rejects a row that does not match its
//! collection's shape with [`RemoteError::MalformedRecord`].

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{RemoteError, RemoteResult, Row};
use crate::models::{Appointment, DiaryEntry, Profile};

pub const PROFILES: &str = "profiles";
pub const APPOINTMENTS: &str = "appointments";
pub const DIARY_ENTRIES: &str = "diary_entries";

/// Bucket holding diary images.
pub const DIARY_IMAGES_BUCKET: &str = "diary_images";

/// Static description of a collection's constraints.
#[derive(Debug, Clone, Copy)]
pub struct CollectionSchema {
    pub name: &'static str,
    /// Column that must equal the signed-in identity id
    pub owner_column: &'static str,
    pub unique_columns: &'static [&'static str],
    pub required_columns: &'static [&'static str],
}

pub const COLLECTIONS: &[CollectionSchema] = &[
    CollectionSchema {
        name: PROFILES,
        owner_column: "id",
        unique_columns: &["id", "username"],
        required_columns: &["id", "username"],
    },
    CollectionSchema {
        name: APPOINTMENTS,
        owner_column: "user_id",
        unique_columns: &["id"],
        required_columns: &["user_id", "doctor", "specialty", "date", "time", "status"],
    },
    CollectionSchema {
        name: DIARY_ENTRIES,
        owner_column: "user_id",
        unique_columns: &["id"],
        required_columns: &["user_id", "title", "content", "updated_at"],
    },
];

pub fn collection_schema(name: &str) -> Option<&'static CollectionSchema> {
    COLLECTIONS.iter().find(|c| c.name == name)
}

/// `appointments` row as stored remotely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentRow {
    pub id: String,
    pub user_id: String,
    pub doctor: String,
    pub specialty: String,
    pub date: NaiveDate,
    pub time: String,
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl From<AppointmentRow> for Appointment {
    fn from(row: AppointmentRow) -> Self {
        Appointment {
            id: row.id,
            doctor: row.doctor,
            specialty: row.specialty,
            date: row.date,
            time: row.time,
            status: row.status,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

/// New `appointments` row; `id` and `created_at` are assigned by the server.
#[derive(Debug, Clone, Serialize)]
pub struct NewAppointmentRow<'a> {
    pub user_id: &'a str,
    pub doctor: &'a str,
    pub specialty: &'a str,
    pub date: NaiveDate,
    pub time: &'a str,
    pub status: &'a str,
    pub notes: Option<&'a str>,
}

impl<'a> NewAppointmentRow<'a> {
    pub fn new(user_id: &'a str, appointment: &'a Appointment) -> Self {
        Self {
            user_id,
            doctor: &appointment.doctor,
            specialty: &appointment.specialty,
            date: appointment.date,
            time: &appointment.time,
            status: &appointment.status,
            notes: appointment.notes.as_deref(),
        }
    }
}

/// `profiles` row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileRow {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            id: row.id,
            username: row.username,
            created_at: row.created_at,
        }
    }
}

/// `diary_entries` row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiaryEntryRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<DiaryEntryRow> for DiaryEntry {
    fn from(row: DiaryEntryRow) -> Self {
        DiaryEntry {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            content: row.content,
            image_url: row.image_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Parse untyped rows into `T`, failing on the first row that does not fit.
pub fn parse_rows<T: DeserializeOwned>(collection: &str, rows: Vec<Row>) -> RemoteResult<Vec<T>> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(Value::Object(row)).map_err(|e| RemoteError::MalformedRecord {
                collection: collection.to_string(),
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Serialize a typed value into a row.
pub fn to_row<T: Serialize>(collection: &str, value: &T) -> RemoteResult<Row> {
    match serde_json::to_value(value) {
        Ok(Value::Object(row)) => Ok(row),
        Ok(other) => Err(RemoteError::MalformedRecord {
            collection: collection.to_string(),
            reason: format!("expected object, got {}", other),
        }),
        Err(e) => Err(RemoteError::MalformedRecord {
            collection: collection.to_string(),
            reason: e.to_string(),
        }),
    }
}

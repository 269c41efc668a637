//! Appointment models and booking validation.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status written by the booking dialog.
pub const STATUS_CONFIRMED: &str = "Confirmed";
/// Status used for appointments awaiting confirmation.
pub const STATUS_PENDING: &str = "Pending";

/// An appointment record.
///
/// Field names serialize in camelCase so the guest collection keeps the same
/// JSON layout as the local store has always used (`createdAt`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    /// Caller-generated in guest mode, server-generated in authenticated mode
    pub id: String,
    /// Doctor display name
    pub doctor: String,
    /// Medical specialty
    pub specialty: String,
    /// Calendar date (`YYYY-MM-DD`)
    pub date: NaiveDate,
    /// Display time, e.g. "09:00 AM"
    pub time: String,
    /// Free-text status ("Confirmed", "Pending", ...)
    pub status: String,
    /// Optional patient notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Creation timestamp (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Appointment {
    /// Create a confirmed appointment with a fresh id and creation timestamp.
    pub fn new(doctor: String, specialty: String, date: NaiveDate, time: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            doctor,
            specialty,
            date,
            time,
            status: STATUS_CONFIRMED.to_string(),
            notes: None,
            created_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    /// Combined date and time, when the display time parses.
    pub fn starts_at(&self) -> Option<NaiveDateTime> {
        parse_display_time(&self.time).map(|t| self.date.and_time(t))
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == STATUS_CONFIRMED
    }
}

/// Parse a display time such as "09:00 AM", "2:30 PM" or "14:30".
pub fn parse_display_time(time: &str) -> Option<NaiveTime> {
    let trimmed = time.trim();
    NaiveTime::parse_from_str(trimmed, "%I:%M %p")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .ok()
}

/// A bookable doctor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Doctor {
    pub id: &'static str,
    pub name: &'static str,
    pub specialty: &'static str,
}

/// Doctor directory offered by the booking dialog.
pub const DOCTORS: &[Doctor] = &[
    Doctor {
        id: "dr-arjun",
        name: "Dr. Arjun Mehta",
        specialty: "Cardiology",
    },
    Doctor {
        id: "dr-neha",
        name: "Dr. Neha Gupta",
        specialty: "Dermatology",
    },
    Doctor {
        id: "dr-rohit",
        name: "Dr. Rohit Agarwal",
        specialty: "Orthopedic",
    },
    Doctor {
        id: "dr-priya",
        name: "Dr. Priya Sharma",
        specialty: "General Medicine",
    },
];

/// Bookable time slots.
pub const TIME_SLOTS: &[&str] = &[
    "09:00 AM", "09:30 AM", "10:00 AM", "10:30 AM", "11:00 AM", "11:30 AM", "02:00 PM",
    "02:30 PM", "03:00 PM", "03:30 PM", "04:00 PM", "04:30 PM",
];

/// Look up a doctor by directory id.
pub fn find_doctor(id: &str) -> Option<&'static Doctor> {
    DOCTORS.iter().find(|d| d.id == id)
}

/// Booking validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookingError {
    #[error("Please fill in all required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Unknown doctor: {0}")]
    UnknownDoctor(String),

    #[error("Unknown time slot: {0}")]
    UnknownTimeSlot(String),

    #[error("Appointment date {date} is before {today}")]
    DateInPast { date: NaiveDate, today: NaiveDate },
}

/// Booking dialog submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingRequest {
    pub doctor_id: String,
    pub date: Option<NaiveDate>,
    pub time: String,
    pub notes: String,
}

impl BookingRequest {
    /// Validate the submission and build the appointment to store.
    ///
    /// Runs entirely locally; nothing is written until the result is handed
    /// to the data access layer.
    pub fn into_appointment(self, today: NaiveDate) -> Result<Appointment, BookingError> {
        let mut missing = Vec::new();
        if self.doctor_id.trim().is_empty() {
            missing.push("doctor");
        }
        if self.date.is_none() {
            missing.push("date");
        }
        if self.time.trim().is_empty() {
            missing.push("time");
        }
        let date = match self.date {
            Some(date) if missing.is_empty() => date,
            _ => return Err(BookingError::MissingFields(missing)),
        };

        let doctor = find_doctor(&self.doctor_id)
            .ok_or_else(|| BookingError::UnknownDoctor(self.doctor_id.clone()))?;

        if !TIME_SLOTS.contains(&self.time.as_str()) {
            return Err(BookingError::UnknownTimeSlot(self.time));
        }

        if date < today {
            return Err(BookingError::DateInPast { date, today });
        }

        let mut appointment = Appointment::new(
            doctor.name.to_string(),
            doctor.specialty.to_string(),
            date,
            self.time,
        );
        let notes = self.notes.trim();
        if !notes.is_empty() {
            appointment.notes = Some(notes.to_string());
        }
        Ok(appointment)
    }
}

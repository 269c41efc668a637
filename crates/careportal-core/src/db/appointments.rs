//! Guest appointment collection.
//!
//! Stored as one JSON array under a single global key. Writes are a plain
//! read-modify-write of the whole array; two writers racing on the same key
//! lose one of the updates.

use super::{DbResult, LocalStore, KEY_APPOINTMENTS};
use crate::models::Appointment;

impl LocalStore {
    /// Load the guest collection in storage order (empty when absent).
    pub fn load_guest_appointments(&self) -> DbResult<Vec<Appointment>> {
        match self.get_item(KEY_APPOINTMENTS)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    /// Replace the guest collection.
    pub fn save_guest_appointments(&self, appointments: &[Appointment]) -> DbResult<()> {
        let json = serde_json::to_string(appointments)?;
        self.set_item(KEY_APPOINTMENTS, &json)
    }

    /// Append one appointment to the end of the guest collection.
    pub fn append_guest_appointment(&self, appointment: &Appointment) -> DbResult<()> {
        let mut all = self.load_guest_appointments()?;
        all.push(appointment.clone());
        self.save_guest_appointments(&all)
    }

    /// Drop every appointment with the given id. Returns how many were removed.
    pub fn remove_guest_appointment(&self, id: &str) -> DbResult<usize> {
        let all = self.load_guest_appointments()?;
        let before = all.len();
        let kept: Vec<Appointment> = all.into_iter().filter(|a| a.id != id).collect();
        let removed = before - kept.len();
        self.save_guest_appointments(&kept)?;
        Ok(removed)
    }
}

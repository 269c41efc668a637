//! Dual-mode appointment access.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{DalError, DalResult};
use crate::models::{Appointment, Identity};
use crate::remote::schema::{parse_rows, to_row, AppointmentRow, NewAppointmentRow, APPOINTMENTS};
use crate::remote::{Direction, Filter, Query, RecordStore};
use crate::session::SessionContext;

/// Appointment repository routing each call by the current session mode.
///
/// The `try_*` methods report every failure. The plain methods implement the
/// fail-soft contract the pages rely on: a missing identity or a remote
/// failure reads as "no data" (`fetch`) or "not saved" (`add`, `remove`).
/// Local store faults are never softened.
#[derive(Clone)]
pub struct AppointmentRepository {
    session: SessionContext,
    records: Arc<dyn RecordStore>,
}

impl AppointmentRepository {
    pub fn new(session: SessionContext, records: Arc<dyn RecordStore>) -> Self {
        Self { session, records }
    }

    async fn require_identity(&self) -> DalResult<Identity> {
        self.session
            .current_identity()
            .await
            .ok_or(DalError::NoIdentity)
    }

    fn load_local(&self) -> DalResult<Vec<Appointment>> {
        let store = self.session.store().lock()?;
        Ok(store.load_guest_appointments()?)
    }

    fn append_local(&self, appointment: &Appointment) -> DalResult<()> {
        let store = self.session.store().lock()?;
        Ok(store.append_guest_appointment(appointment)?)
    }

    fn remove_local(&self, id: &str) -> DalResult<usize> {
        let store = self.session.store().lock()?;
        Ok(store.remove_guest_appointment(id)?)
    }

    // =========================================================================
    // Tagged operations
    // =========================================================================

    /// Guest: the local collection as stored. Authenticated: the identity's
    /// remote appointments ordered by date ascending.
    pub async fn try_fetch(&self) -> DalResult<Vec<Appointment>> {
        if self.session.is_guest_session() {
            return self.load_local();
        }

        let identity = self.require_identity().await?;
        let query = Query::new()
            .eq("user_id", identity.id.as_str())
            .order_by("date", Direction::Ascending);
        let rows = self.records.select(APPOINTMENTS, &query).await?;
        let parsed: Vec<AppointmentRow> = parse_rows(APPOINTMENTS, rows)?;
        Ok(parsed.into_iter().map(Appointment::from).collect())
    }

    /// Store an appointment; returns it as stored.
    ///
    /// Guest appointments keep their caller-generated id. Remote appointments
    /// get a server-generated id and creation timestamp. If the insert succeeds
    /// but its echo is empty or unreadable, the submitted appointment is
    /// returned as-is.
    pub async fn try_add(&self, appointment: &Appointment) -> DalResult<Appointment> {
        if self.session.is_guest_session() {
            self.append_local(appointment)?;
            debug!(id = %appointment.id, "guest appointment stored");
            return Ok(appointment.clone());
        }

        let identity = self.require_identity().await?;
        let row = to_row(APPOINTMENTS, &NewAppointmentRow::new(&identity.id, appointment))?;
        let echoed = self.records.insert(APPOINTMENTS, vec![row]).await?;

        // The write has landed; only the server-generated fields are at stake
        let echoed = match parse_rows::<AppointmentRow>(APPOINTMENTS, echoed) {
            Ok(parsed) => parsed.into_iter().next().map(Appointment::from),
            Err(e) => {
                warn!(error = %e, "unreadable insert echo");
                None
            }
        };
        let stored = match echoed {
            Some(stored) => stored,
            None => {
                warn!(
                    user_id = %identity.id,
                    "insert echoed no row; keeping submitted appointment"
                );
                appointment.clone()
            }
        };
        debug!(id = %stored.id, user_id = %identity.id, "remote appointment stored");
        Ok(stored)
    }

    /// Remove by id; returns how many records were removed.
    pub async fn try_remove(&self, id: &str) -> DalResult<usize> {
        if self.session.is_guest_session() {
            return self.remove_local(id);
        }

        let identity = self.require_identity().await?;
        let filters = [
            Filter::eq("user_id", identity.id.as_str()),
            Filter::eq("id", id),
        ];
        Ok(self.records.delete(APPOINTMENTS, &filters).await?)
    }

    // =========================================================================
    // Fail-soft operations
    // =========================================================================

    pub async fn fetch(&self) -> DalResult<Vec<Appointment>> {
        soften(self.try_fetch().await, "fetch").map(Option::unwrap_or_default)
    }

    pub async fn add(&self, appointment: &Appointment) -> DalResult<bool> {
        soften(self.try_add(appointment).await, "add").map(|stored| stored.is_some())
    }

    pub async fn remove(&self, id: &str) -> DalResult<bool> {
        soften(self.try_remove(id).await, "remove").map(|removed| removed.is_some())
    }
}

/// Collapse expected failures to `None`, keep local faults as errors.
fn soften<T>(result: DalResult<T>, operation: &str) -> DalResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(DalError::NoIdentity) => {
            debug!(operation, "no identity; appointment operation skipped");
            Ok(None)
        }
        Err(e) if e.is_expected() => {
            warn!(operation, error = %e, "appointment operation failed");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dal::testing::FixedInsertEcho;
    use crate::db::{LocalStore, KEY_APPOINTMENTS};
    use crate::remote::{IdentityService, MemoryBackend, RemoteError, Row};
    use chrono::NaiveDate;

    fn setup() -> (AppointmentRepository, SessionContext, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::default());
        let store = LocalStore::open_in_memory().unwrap().into_shared();
        let session = SessionContext::new(store, backend.clone());
        let repo = AppointmentRepository::new(session.clone(), backend.clone());
        (repo, session, backend)
    }

    fn make_appointment(date: &str) -> Appointment {
        let mut apt = Appointment::new(
            "Dr. X".into(),
            "Cardiology".into(),
            NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            "09:00 AM".into(),
        );
        apt.notes = Some("bring reports".into());
        apt
    }

    #[tokio::test]
    async fn test_guest_add_fetch_remove() {
        let (repo, session, backend) = setup();
        session.enter_guest().unwrap();

        let apt = make_appointment("2025-06-01");
        assert!(repo.add(&apt).await.unwrap());
        assert_eq!(repo.fetch().await.unwrap(), vec![apt.clone()]);

        assert!(repo.remove(&apt.id).await.unwrap());
        assert!(repo.fetch().await.unwrap().is_empty());

        // Guest mode never reaches the backend
        assert_eq!(backend.stats(), Default::default());
    }

    #[tokio::test]
    async fn test_no_identity_is_soft() {
        let (repo, _, _) = setup();

        assert!(repo.fetch().await.unwrap().is_empty());
        assert!(!repo.add(&make_appointment("2025-06-01")).await.unwrap());
        assert!(!repo.remove("anything").await.unwrap());

        assert!(matches!(repo.try_fetch().await, Err(DalError::NoIdentity)));
    }

    #[tokio::test]
    async fn test_remote_round_trip_preserves_fields() {
        let (repo, _, backend) = setup();
        backend.sign_up("pat@example.com", "secret123").await.unwrap();

        let mut without_notes = make_appointment("2025-07-01");
        without_notes.notes = None;
        let with_notes = make_appointment("2025-06-01");

        let stored_a = repo.try_add(&without_notes).await.unwrap();
        let stored_b = repo.try_add(&with_notes).await.unwrap();
        assert_ne!(stored_a.id, without_notes.id);

        let fetched = repo.fetch().await.unwrap();
        assert_eq!(fetched, vec![stored_b.clone(), stored_a.clone()]);
        for (original, fetched) in [(&with_notes, &fetched[0]), (&without_notes, &fetched[1])] {
            assert_eq!(fetched.doctor, original.doctor);
            assert_eq!(fetched.specialty, original.specialty);
            assert_eq!(fetched.date, original.date);
            assert_eq!(fetched.time, original.time);
            assert_eq!(fetched.status, original.status);
            assert_eq!(fetched.notes, original.notes);
        }
    }

    #[tokio::test]
    async fn test_remote_failure_is_distinguishable() {
        let (repo, _, backend) = setup();
        backend.sign_up("pat@example.com", "secret123").await.unwrap();
        repo.add(&make_appointment("2025-06-01")).await.unwrap();

        backend.set_offline(true);
        assert!(matches!(
            repo.try_fetch().await,
            Err(DalError::Remote(RemoteError::Network(_)))
        ));
        assert!(repo.fetch().await.unwrap().is_empty());
        assert!(!repo.add(&make_appointment("2025-06-02")).await.unwrap());
    }

    #[tokio::test]
    async fn test_remote_remove_failure_keeps_row() {
        let (repo, _, backend) = setup();
        backend.sign_up("pat@example.com", "secret123").await.unwrap();
        let stored = repo.try_add(&make_appointment("2025-06-01")).await.unwrap();

        backend.set_offline(true);
        assert!(!repo.remove(&stored.id).await.unwrap());
        assert!(matches!(
            repo.try_remove(&stored.id).await,
            Err(DalError::Remote(RemoteError::Network(_)))
        ));

        backend.set_offline(false);
        assert_eq!(repo.fetch().await.unwrap(), vec![stored]);
    }

    #[tokio::test]
    async fn test_add_succeeds_when_insert_echoes_nothing() {
        let (_, session, backend) = setup();
        backend.sign_up("pat@example.com", "secret123").await.unwrap();
        let repo = AppointmentRepository::new(
            session,
            Arc::new(FixedInsertEcho::empty(backend.clone())),
        );

        let apt = make_appointment("2025-06-01");
        assert!(repo.add(&apt).await.unwrap());
        assert_eq!(repo.try_add(&apt).await.unwrap(), apt);
        assert_eq!(backend.rows(APPOINTMENTS).len(), 2);
        assert_eq!(repo.fetch().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_add_succeeds_when_insert_echo_is_unreadable() {
        let (_, session, backend) = setup();
        backend.sign_up("pat@example.com", "secret123").await.unwrap();
        let mut garbage = Row::new();
        garbage.insert("date".into(), serde_json::json!(42));
        let records = FixedInsertEcho {
            backend: backend.clone(),
            echo: vec![garbage],
        };
        let repo = AppointmentRepository::new(session, Arc::new(records));

        assert!(repo.add(&make_appointment("2025-06-01")).await.unwrap());
        assert_eq!(backend.rows(APPOINTMENTS).len(), 1);
    }

    #[tokio::test]
    async fn test_remote_remove_scoped_to_owner() {
        let (repo, _, backend) = setup();
        backend.sign_up("a@example.com", "secret123").await.unwrap();
        let theirs = repo.try_add(&make_appointment("2025-06-01")).await.unwrap();

        backend.sign_up("b@example.com", "secret123").await.unwrap();
        assert_eq!(repo.try_remove(&theirs.id).await.unwrap(), 0);
        assert_eq!(backend.rows(APPOINTMENTS).len(), 1);
    }

    #[tokio::test]
    async fn test_modes_are_disjoint() {
        let (repo, session, backend) = setup();
        backend.sign_up("pat@example.com", "secret123").await.unwrap();
        repo.add(&make_appointment("2025-06-01")).await.unwrap();

        session.enter_guest().unwrap();
        assert!(repo.fetch().await.unwrap().is_empty());
        repo.add(&make_appointment("2025-06-02")).await.unwrap();

        session.clear_guest().unwrap();
        let remote = repo.fetch().await.unwrap();
        assert_eq!(remote.len(), 1);
        assert_eq!(remote[0].date.to_string(), "2025-06-01");

        session.enter_guest().unwrap();
        let local = repo.fetch().await.unwrap();
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].date.to_string(), "2025-06-02");
    }

    #[tokio::test]
    async fn test_corrupt_local_store_propagates() {
        let (repo, session, _) = setup();
        session.enter_guest().unwrap();
        session
            .store()
            .lock()
            .unwrap()
            .set_item(KEY_APPOINTMENTS, "not json")
            .unwrap();

        assert!(matches!(repo.fetch().await, Err(DalError::Local(_))));
    }
}

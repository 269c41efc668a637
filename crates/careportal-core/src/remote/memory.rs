//! In-process backend implementing identity, record and blob contracts.
//!
//! Behaves like the hosted service as far as the portal can observe:
//! row-level ownership, NOT NULL and unique constraints with Postgres-style
//! codes, server-generated ids and timestamps, and session-change broadcasts.
//! Call counters and fault injection make it usable as a test double.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::schema::{collection_schema, CollectionSchema};
use super::{
    BlobStore, Direction, Filter, IdentityService, Query, RecordStore, RemoteError, RemoteResult,
    Row, SessionSubscription, SignUpOutcome, CODE_INSUFFICIENT_PRIVILEGE,
    CODE_NOT_NULL_VIOLATION, CODE_UNDEFINED_TABLE, CODE_UNIQUE_VIOLATION,
};
use crate::models::{AuthEvent, AuthEventKind, Identity, Session};

/// Minimum password length accepted by the identity service.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Session lifetime.
const SESSION_TTL_HOURS: i64 = 1;

/// Backend behavior switches.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryBackendConfig {
    /// Base URL used to build public blob URLs
    pub public_base_url: String,
    /// When set, sign-up returns no session until the email is confirmed
    pub require_email_confirmation: bool,
}

impl Default for MemoryBackendConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:54321".into(),
            require_email_confirmation: false,
        }
    }
}

/// Snapshot of backend call counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallStats {
    pub get_session: usize,
    pub get_user: usize,
    pub select: usize,
    pub insert: usize,
    pub update: usize,
    pub delete: usize,
    pub upload: usize,
    pub remove: usize,
}

#[derive(Default)]
struct CallCounters {
    get_session: AtomicUsize,
    get_user: AtomicUsize,
    select: AtomicUsize,
    insert: AtomicUsize,
    update: AtomicUsize,
    delete: AtomicUsize,
    upload: AtomicUsize,
    remove: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

struct Account {
    identity: Identity,
    salt: String,
    password_digest: String,
    confirmed: bool,
}

struct StoredBlob {
    bytes: Vec<u8>,
    #[allow(dead_code)]
    content_type: String,
}

#[derive(Default)]
struct BackendState {
    accounts: HashMap<String, Account>,
    session: Option<Session>,
    collections: HashMap<String, Vec<Row>>,
    blobs: HashMap<(String, String), StoredBlob>,
    password_resets: Vec<String>,
}

/// In-memory hosted backend.
pub struct MemoryBackend {
    config: MemoryBackendConfig,
    state: Mutex<BackendState>,
    events: broadcast::Sender<AuthEvent>,
    counters: CallCounters,
    offline: AtomicBool,
    failing_selects: AtomicUsize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(MemoryBackendConfig::default())
    }
}

impl MemoryBackend {
    pub fn new(config: MemoryBackendConfig) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            config,
            state: Mutex::new(BackendState::default()),
            events,
            counters: CallCounters::default(),
            offline: AtomicBool::new(false),
            failing_selects: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> RemoteResult<MutexGuard<'_, BackendState>> {
        self.state.lock().map_err(|_| RemoteError::Service {
            code: None,
            message: "backend state poisoned".into(),
        })
    }

    // =========================================================================
    // Test controls
    // =========================================================================

    /// Make every record and blob call fail with a network error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail the next `count` selects with a network error.
    pub fn fail_next_selects(&self, count: usize) {
        self.failing_selects.store(count, Ordering::SeqCst);
    }

    pub fn stats(&self) -> CallStats {
        let c = &self.counters;
        CallStats {
            get_session: c.get_session.load(Ordering::SeqCst),
            get_user: c.get_user.load(Ordering::SeqCst),
            select: c.select.load(Ordering::SeqCst),
            insert: c.insert.load(Ordering::SeqCst),
            update: c.update.load(Ordering::SeqCst),
            delete: c.delete.load(Ordering::SeqCst),
            upload: c.upload.load(Ordering::SeqCst),
            remove: c.remove.load(Ordering::SeqCst),
        }
    }

    /// Number of live session subscriptions.
    pub fn active_subscriptions(&self) -> usize {
        self.events.receiver_count()
    }

    /// Mark an account's email as confirmed. Returns false for unknown emails.
    pub fn confirm_email(&self, email: &str) -> bool {
        match self.state() {
            Ok(mut state) => match state.accounts.get_mut(&normalize_email(email)) {
                Some(account) => {
                    account.confirmed = true;
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Emails that requested a password reset, in request order.
    pub fn password_resets(&self) -> Vec<String> {
        self.state()
            .map(|s| s.password_resets.clone())
            .unwrap_or_default()
    }

    /// Every row of a collection, ignoring ownership.
    pub fn rows(&self, collection: &str) -> Vec<Row> {
        self.state()
            .map(|s| s.collections.get(collection).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Stored bytes of a blob, ignoring ownership.
    pub fn blob(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.state().ok().and_then(|s| {
            s.blobs
                .get(&(bucket.to_string(), path.to_string()))
                .map(|b| b.bytes.clone())
        })
    }

    /// Emit a session change without going through sign-in/out.
    pub fn broadcast(&self, kind: AuthEventKind, session: Option<Session>) {
        // No receivers is fine: nobody is listening yet
        let _ = self.events.send(AuthEvent { kind, session });
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn check_online(&self) -> RemoteResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Network("backend unreachable".into()));
        }
        Ok(())
    }

    fn take_injected_select_failure(&self) -> bool {
        self.failing_selects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn start_session(&self, state: &mut BackendState, identity: Identity) -> Session {
        let session = Session {
            user: identity,
            access_token: uuid::Uuid::new_v4().to_string(),
            expires_at: chrono::Utc::now() + chrono::Duration::hours(SESSION_TTL_HOURS),
        };
        state.session = Some(session.clone());
        session
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn digest_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn schema_for(collection: &str) -> RemoteResult<&'static CollectionSchema> {
    collection_schema(collection).ok_or_else(|| {
        RemoteError::service(
            CODE_UNDEFINED_TABLE,
            format!("relation \"{}\" does not exist", collection),
        )
    })
}

fn rls_violation(collection: &str) -> RemoteError {
    RemoteError::service(
        CODE_INSUFFICIENT_PRIVILEGE,
        format!(
            "new row violates row-level security policy for table \"{}\"",
            collection
        ),
    )
}

fn constraint_name(schema: &CollectionSchema, column: &str) -> String {
    if column == "id" {
        format!("{}_pkey", schema.name)
    } else {
        format!("{}_{}_key", schema.name, column)
    }
}

fn is_owned(schema: &CollectionSchema, row: &Row, uid: &str) -> bool {
    row.get(schema.owner_column).and_then(Value::as_str) == Some(uid)
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (None | Some(Value::Null), None | Some(Value::Null)) => CmpOrdering::Equal,
        (None | Some(Value::Null), _) => CmpOrdering::Less,
        (_, None | Some(Value::Null)) => CmpOrdering::Greater,
        (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
    }
}

/// Reject rows whose unique columns collide with `existing` or each other.
fn check_unique<'a>(
    schema: &CollectionSchema,
    candidates: impl Iterator<Item = &'a Row>,
    existing: &[Row],
) -> RemoteResult<()> {
    let mut seen: Vec<&Row> = existing.iter().collect();
    for row in candidates {
        for column in schema.unique_columns {
            let Some(value) = row.get(*column).filter(|v| !v.is_null()) else {
                continue;
            };
            if seen.iter().any(|other| other.get(*column) == Some(value)) {
                return Err(RemoteError::service(
                    CODE_UNIQUE_VIOLATION,
                    format!(
                        "duplicate key value violates unique constraint \"{}\"",
                        constraint_name(schema, column)
                    ),
                ));
            }
        }
        seen.push(row);
    }
    Ok(())
}

#[async_trait]
impl IdentityService for MemoryBackend {
    async fn get_session(&self) -> RemoteResult<Option<Session>> {
        bump(&self.counters.get_session);
        let state = self.state()?;
        Ok(state.session.clone())
    }

    async fn get_user(&self) -> RemoteResult<Option<Identity>> {
        bump(&self.counters.get_user);
        let state = self.state()?;
        Ok(state.session.as_ref().map(|s| s.user.clone()))
    }

    fn subscribe(&self) -> SessionSubscription {
        SessionSubscription::new(self.events.subscribe())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> RemoteResult<Session> {
        let session = {
            let mut state = self.state()?;
            let account = state
                .accounts
                .get(&normalize_email(email))
                .filter(|a| a.password_digest == digest_password(&a.salt, password))
                .ok_or_else(|| {
                    RemoteError::service("invalid_credentials", "Invalid login credentials")
                })?;
            if !account.confirmed {
                return Err(RemoteError::service(
                    "email_not_confirmed",
                    "Email not confirmed",
                ));
            }
            let identity = account.identity.clone();
            self.start_session(&mut state, identity)
        };

        info!(user_id = %session.user.id, "signed in");
        self.broadcast(AuthEventKind::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> RemoteResult<SignUpOutcome> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(RemoteError::service(
                "weak_password",
                "Password should be at least 6 characters",
            ));
        }

        let outcome = {
            let mut state = self.state()?;
            let key = normalize_email(email);
            if state.accounts.contains_key(&key) {
                return Err(RemoteError::service(
                    "user_already_exists",
                    "User already registered",
                ));
            }

            let identity = Identity {
                id: uuid::Uuid::new_v4().to_string(),
                email: key.clone(),
            };
            let salt = uuid::Uuid::new_v4().to_string();
            let confirmed = !self.config.require_email_confirmation;
            state.accounts.insert(
                key,
                Account {
                    identity: identity.clone(),
                    password_digest: digest_password(&salt, password),
                    salt,
                    confirmed,
                },
            );

            let session = confirmed.then(|| self.start_session(&mut state, identity.clone()));
            SignUpOutcome { identity, session }
        };

        info!(user_id = %outcome.identity.id, confirmed = outcome.session.is_some(), "signed up");
        if let Some(session) = &outcome.session {
            self.broadcast(AuthEventKind::SignedIn, Some(session.clone()));
        }
        Ok(outcome)
    }

    async fn sign_out(&self) -> RemoteResult<()> {
        let was_signed_in = self.state()?.session.take().is_some();
        if was_signed_in {
            info!("signed out");
            self.broadcast(AuthEventKind::SignedOut, None);
        }
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> RemoteResult<()> {
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(RemoteError::service(
                "weak_password",
                "Password should be at least 6 characters",
            ));
        }

        let session = {
            let mut state = self.state()?;
            let session = state.session.clone().ok_or(RemoteError::NotAuthenticated)?;
            let account = state
                .accounts
                .get_mut(&session.user.email)
                .ok_or(RemoteError::NotAuthenticated)?;
            account.salt = uuid::Uuid::new_v4().to_string();
            account.password_digest = digest_password(&account.salt, new_password);
            session
        };

        self.broadcast(AuthEventKind::UserUpdated, Some(session));
        Ok(())
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> RemoteResult<()> {
        self.check_online()?;
        debug!(redirect_to, "password reset requested");
        // Unknown addresses succeed too, so account existence is not revealed
        self.state()?.password_resets.push(normalize_email(email));
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryBackend {
    async fn select(&self, collection: &str, query: &Query) -> RemoteResult<Vec<Row>> {
        bump(&self.counters.select);
        self.check_online()?;
        if self.take_injected_select_failure() {
            return Err(RemoteError::Network("connection reset".into()));
        }

        let schema = schema_for(collection)?;
        let state = self.state()?;
        let Some(uid) = state.session.as_ref().map(|s| s.user.id.clone()) else {
            // Anonymous callers see no rows under row-level security
            return Ok(Vec::new());
        };

        let mut rows: Vec<Row> = state
            .collections
            .get(collection)
            .map(|rows| {
                rows.iter()
                    .filter(|row| is_owned(schema, row, &uid))
                    .filter(|row| query.filters.iter().all(|f| f.matches(row)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(&order.column), b.get(&order.column));
                match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, collection: &str, rows: Vec<Row>) -> RemoteResult<Vec<Row>> {
        bump(&self.counters.insert);
        self.check_online()?;

        let schema = schema_for(collection)?;
        let mut state = self.state()?;
        let uid = state
            .session
            .as_ref()
            .map(|s| s.user.id.clone())
            .ok_or_else(|| rls_violation(collection))?;

        let now = chrono::Utc::now().to_rfc3339();
        let mut prepared = Vec::with_capacity(rows.len());
        for mut row in rows {
            if !is_owned(schema, &row, &uid) {
                return Err(rls_violation(collection));
            }
            row.entry("id")
                .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
            row.entry("created_at")
                .or_insert_with(|| Value::String(now.clone()));
            for column in schema.required_columns {
                if row.get(*column).map_or(true, Value::is_null) {
                    return Err(RemoteError::service(
                        CODE_NOT_NULL_VIOLATION,
                        format!(
                            "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
                            column, collection
                        ),
                    ));
                }
            }
            prepared.push(row);
        }

        let existing = state.collections.entry(collection.to_string()).or_default();
        check_unique(schema, prepared.iter(), existing.as_slice())?;
        existing.extend(prepared.iter().cloned());

        debug!(collection, count = prepared.len(), "rows inserted");
        Ok(prepared)
    }

    async fn update(
        &self,
        collection: &str,
        filters: &[Filter],
        patch: Row,
    ) -> RemoteResult<usize> {
        bump(&self.counters.update);
        self.check_online()?;

        let schema = schema_for(collection)?;
        let mut state = self.state()?;
        let Some(uid) = state.session.as_ref().map(|s| s.user.id.clone()) else {
            return Ok(0);
        };
        if patch
            .get(schema.owner_column)
            .is_some_and(|v| v.as_str() != Some(uid.as_str()))
        {
            return Err(rls_violation(collection));
        }

        let rows = state.collections.entry(collection.to_string()).or_default();
        let (targets, others): (Vec<usize>, Vec<usize>) = (0..rows.len()).partition(|&i| {
            is_owned(schema, &rows[i], &uid) && filters.iter().all(|f| f.matches(&rows[i]))
        });

        let patched: Vec<Row> = targets
            .iter()
            .map(|&i| {
                let mut row = rows[i].clone();
                for (k, v) in &patch {
                    row.insert(k.clone(), v.clone());
                }
                row
            })
            .collect();
        let untouched: Vec<Row> = others.iter().map(|&i| rows[i].clone()).collect();
        check_unique(schema, patched.iter(), &untouched)?;

        for (&i, row) in targets.iter().zip(patched) {
            rows[i] = row;
        }
        Ok(targets.len())
    }

    async fn delete(&self, collection: &str, filters: &[Filter]) -> RemoteResult<usize> {
        bump(&self.counters.delete);
        self.check_online()?;

        let schema = schema_for(collection)?;
        let mut state = self.state()?;
        let Some(uid) = state.session.as_ref().map(|s| s.user.id.clone()) else {
            return Ok(0);
        };

        let rows = state.collections.entry(collection.to_string()).or_default();
        let before = rows.len();
        rows.retain(|row| !(is_owned(schema, row, &uid) && filters.iter().all(|f| f.matches(row))));
        Ok(before - rows.len())
    }
}

#[async_trait]
impl BlobStore for MemoryBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> RemoteResult<()> {
        bump(&self.counters.upload);
        self.check_online()?;

        let mut state = self.state()?;
        let uid = state
            .session
            .as_ref()
            .map(|s| s.user.id.clone())
            .ok_or(RemoteError::NotAuthenticated)?;
        // Objects live under a folder named after their owner
        if path.split('/').next() != Some(uid.as_str()) {
            return Err(rls_violation(bucket));
        }

        let key = (bucket.to_string(), path.to_string());
        if !upsert && state.blobs.contains_key(&key) {
            return Err(RemoteError::service("409", "The resource already exists"));
        }
        state.blobs.insert(
            key,
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.public_base_url.trim_end_matches('/'),
            bucket,
            path
        )
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> RemoteResult<()> {
        bump(&self.counters.remove);
        self.check_online()?;

        let mut state = self.state()?;
        let uid = state
            .session
            .as_ref()
            .map(|s| s.user.id.clone())
            .ok_or(RemoteError::NotAuthenticated)?;
        for path in paths {
            if path.split('/').next() == Some(uid.as_str()) {
                state.blobs.remove(&(bucket.to_string(), path.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::schema::{APPOINTMENTS, PROFILES};
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().unwrap().clone()
    }

    async fn signed_in(backend: &MemoryBackend, email: &str) -> Identity {
        backend.sign_up(email, "secret123").await.unwrap().identity
    }

    #[tokio::test]
    async fn test_sign_up_starts_session() {
        let backend = MemoryBackend::default();
        let outcome = backend.sign_up("Pat@Example.com", "secret123").await.unwrap();

        assert!(outcome.session.is_some());
        assert_eq!(outcome.identity.email, "pat@example.com");
        let session = backend.get_session().await.unwrap().unwrap();
        assert_eq!(session.user, outcome.identity);
    }

    #[tokio::test]
    async fn test_sign_up_requires_confirmation() {
        let backend = MemoryBackend::new(MemoryBackendConfig {
            require_email_confirmation: true,
            ..Default::default()
        });
        let outcome = backend.sign_up("pat@example.com", "secret123").await.unwrap();
        assert!(outcome.session.is_none());

        let err = backend
            .sign_in_with_password("pat@example.com", "secret123")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RemoteError::service("email_not_confirmed", "Email not confirmed")
        );

        assert!(backend.confirm_email("pat@example.com"));
        assert!(backend
            .sign_in_with_password("pat@example.com", "secret123")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let backend = MemoryBackend::default();
        signed_in(&backend, "pat@example.com").await;
        backend.sign_out().await.unwrap();

        let err = backend
            .sign_in_with_password("pat@example.com", "wrong-password")
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Service { .. }));
        assert!(backend.get_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_password() {
        let backend = MemoryBackend::default();
        signed_in(&backend, "pat@example.com").await;

        assert!(backend.update_password("abc").await.is_err());
        backend.update_password("new-secret").await.unwrap();
        backend.sign_out().await.unwrap();

        assert!(backend
            .sign_in_with_password("pat@example.com", "secret123")
            .await
            .is_err());
        assert!(backend
            .sign_in_with_password("pat@example.com", "new-secret")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_subscription_receives_changes() {
        let backend = MemoryBackend::default();
        let mut sub = backend.subscribe();
        assert_eq!(backend.active_subscriptions(), 1);

        signed_in(&backend, "pat@example.com").await;
        let event = sub.recv().await.unwrap();
        assert_eq!(event.kind, AuthEventKind::SignedIn);

        backend.sign_out().await.unwrap();
        let event = sub.recv().await.unwrap();
        assert_eq!(event.kind, AuthEventKind::SignedOut);
        assert!(event.session.is_none());

        drop(sub);
        assert_eq!(backend.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_insert_assigns_server_columns() {
        let backend = MemoryBackend::default();
        let me = signed_in(&backend, "pat@example.com").await;

        let inserted = backend
            .insert(
                APPOINTMENTS,
                vec![row(json!({
                    "user_id": me.id,
                    "doctor": "Dr. X",
                    "specialty": "Cardiology",
                    "date": "2025-06-01",
                    "time": "09:00 AM",
                    "status": "Confirmed"
                }))],
            )
            .await
            .unwrap();

        assert!(inserted[0]["id"].is_string());
        assert!(inserted[0]["created_at"].is_string());
    }

    #[tokio::test]
    async fn test_insert_enforces_ownership_and_not_null() {
        let backend = MemoryBackend::default();
        let me = signed_in(&backend, "pat@example.com").await;

        let err = backend
            .insert(
                APPOINTMENTS,
                vec![row(json!({"user_id": "someone-else", "doctor": "Dr. X"}))],
            )
            .await
            .unwrap_err();
        assert_eq!(err, rls_violation(APPOINTMENTS));

        let err = backend
            .insert(APPOINTMENTS, vec![row(json!({"user_id": me.id, "doctor": "Dr. X"}))])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RemoteError::Service { code: Some(ref c), .. } if c == CODE_NOT_NULL_VIOLATION
        ));
    }

    #[tokio::test]
    async fn test_unique_username() {
        let backend = MemoryBackend::default();
        let first = signed_in(&backend, "a@example.com").await;
        backend
            .insert(PROFILES, vec![row(json!({"id": first.id, "username": "taken"}))])
            .await
            .unwrap();

        let second = signed_in(&backend, "b@example.com").await;
        let err = backend
            .insert(PROFILES, vec![row(json!({"id": second.id, "username": "taken"}))])
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
        assert_eq!(
            err.to_string(),
            "duplicate key value violates unique constraint \"profiles_username_key\""
        );
    }

    #[tokio::test]
    async fn test_select_scoped_to_owner_and_ordered() {
        let backend = MemoryBackend::default();
        let other = signed_in(&backend, "other@example.com").await;
        for date in ["2025-08-01", "2025-06-01"] {
            backend
                .insert(
                    APPOINTMENTS,
                    vec![row(json!({
                        "user_id": other.id, "doctor": "Dr. X", "specialty": "Cardiology",
                        "date": date, "time": "09:00 AM", "status": "Confirmed"
                    }))],
                )
                .await
                .unwrap();
        }
        let query = Query::new().order_by("date", Direction::Ascending);
        let rows = backend.select(APPOINTMENTS, &query).await.unwrap();
        let dates: Vec<_> = rows.iter().map(|r| r["date"].as_str().unwrap()).collect();
        assert_eq!(dates, vec!["2025-06-01", "2025-08-01"]);

        backend.sign_out().await.unwrap();
        assert!(backend.select(APPOINTMENTS, &query).await.unwrap().is_empty());

        signed_in(&backend, "me@example.com").await;
        assert!(backend.select(APPOINTMENTS, &query).await.unwrap().is_empty());
        assert_eq!(backend.delete(APPOINTMENTS, &[]).await.unwrap(), 0);
        assert_eq!(backend.rows(APPOINTMENTS).len(), 2);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let backend = MemoryBackend::default();
        signed_in(&backend, "pat@example.com").await;

        backend.fail_next_selects(1);
        assert!(matches!(
            backend.select(PROFILES, &Query::new()).await,
            Err(RemoteError::Network(_))
        ));
        assert!(backend.select(PROFILES, &Query::new()).await.is_ok());

        backend.set_offline(true);
        assert!(backend.select(PROFILES, &Query::new()).await.is_err());
        assert_eq!(backend.stats().select, 3);
    }

    #[tokio::test]
    async fn test_unknown_collection() {
        let backend = MemoryBackend::default();
        let err = backend.select("tips", &Query::new()).await.unwrap_err();
        assert!(matches!(
            err,
            RemoteError::Service { code: Some(ref c), .. } if c == CODE_UNDEFINED_TABLE
        ));
    }

    #[tokio::test]
    async fn test_blob_upload_and_remove() {
        let backend = MemoryBackend::default();
        let me = signed_in(&backend, "pat@example.com").await;
        let path = format!("{}/photo.png", me.id);

        backend
            .upload("diary_images", &path, vec![1, 2, 3], "image/png", false)
            .await
            .unwrap();
        assert!(backend
            .upload("diary_images", &path, vec![4], "image/png", false)
            .await
            .is_err());
        assert!(backend
            .upload("diary_images", "someone/photo.png", vec![4], "image/png", true)
            .await
            .is_err());

        assert_eq!(
            backend.public_url("diary_images", &path),
            format!(
                "http://localhost:54321/storage/v1/object/public/diary_images/{}",
                path
            )
        );

        backend
            .remove("diary_images", &[path.clone()])
            .await
            .unwrap();
        assert!(backend.blob("diary_images", &path).is_none());
    }
}

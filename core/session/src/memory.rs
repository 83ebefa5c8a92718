//! In-memory backend implementations.
//!
//! Used by the integration suite and by `session-check --demo`. Each fake
//! supports fault injection: queue a [`BackendError`] and the next call
//! fails with it, which is how the recovery and auto-save paths are driven
//! through their failure branches.

use std::collections::{HashMap, VecDeque};

use gymiq_model::{ExerciseInfo, SessionStatus, UserIdentity, WorkoutHistoryDoc};

use crate::backend::{AuthProvider, ExerciseCatalog, SubscriptionId, WorkoutHistoryStore};
use crate::error::BackendError;
use crate::storage::DurableStorage;

/// In-memory [`DurableStorage`] with a quota switch for testing the
/// best-effort durability path.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
    quota_exhausted: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage::default()
    }

    /// All subsequent `set` calls fail until switched back off.
    pub fn set_quota_exhausted(&mut self, exhausted: bool) {
        self.quota_exhausted = exhausted;
    }
}

impl DurableStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        if self.quota_exhausted {
            return Err("storage quota exceeded".to_string());
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// In-memory workout-history collection with per-call fault injection and a
/// write counter (used to assert debounce coalescing).
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    docs: HashMap<String, WorkoutHistoryDoc>,
    fail_reads: VecDeque<BackendError>,
    fail_writes: VecDeque<BackendError>,
    write_count: u64,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        MemoryHistoryStore::default()
    }

    /// Seeds a document directly, bypassing the upsert counter.
    pub fn insert_doc(&mut self, doc: WorkoutHistoryDoc) {
        self.docs.insert(doc.id.clone(), doc);
    }

    pub fn doc(&self, id: &str) -> Option<&WorkoutHistoryDoc> {
        self.docs.get(id)
    }

    /// Number of upserts performed (failed attempts excluded).
    pub fn write_count(&self) -> u64 {
        self.write_count
    }

    /// Reads fail with `err` until [`clear_read_fault`] drains it. Read
    /// methods take `&self`, so the queue cannot self-consume.
    ///
    /// [`clear_read_fault`]: MemoryHistoryStore::clear_read_fault
    pub fn fail_next_read(&mut self, err: BackendError) {
        self.fail_reads.push_back(err);
    }

    /// The next `upsert` call fails with `err`.
    pub fn fail_next_write(&mut self, err: BackendError) {
        self.fail_writes.push_back(err);
    }

    /// Drains one queued read fault.
    pub fn clear_read_fault(&mut self) {
        self.fail_reads.pop_front();
    }
}

impl WorkoutHistoryStore for MemoryHistoryStore {
    fn get(&self, id: &str) -> Result<WorkoutHistoryDoc, BackendError> {
        if let Some(err) = self.fail_reads.front() {
            return Err(err.clone());
        }
        self.docs
            .get(id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(id.to_string()))
    }

    fn upsert(&mut self, doc: &WorkoutHistoryDoc) -> Result<(), BackendError> {
        if let Some(err) = self.fail_writes.pop_front() {
            return Err(err);
        }
        self.docs.insert(doc.id.clone(), doc.clone());
        self.write_count += 1;
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<(), BackendError> {
        self.docs.remove(id);
        Ok(())
    }

    fn find_in_progress(&self, user_id: &str) -> Result<Vec<WorkoutHistoryDoc>, BackendError> {
        if let Some(err) = self.fail_reads.front() {
            return Err(err.clone());
        }
        let mut docs: Vec<WorkoutHistoryDoc> = self
            .docs
            .values()
            .filter(|d| d.user_id == user_id && d.status == SessionStatus::InProgress)
            .cloned()
            .collect();
        docs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(docs)
    }
}

/// In-memory exercise catalog with fault injection.
#[derive(Debug, Default)]
pub struct MemoryExerciseCatalog {
    exercises: HashMap<String, ExerciseInfo>,
    fail_reads: VecDeque<BackendError>,
}

impl MemoryExerciseCatalog {
    pub fn new() -> Self {
        MemoryExerciseCatalog::default()
    }

    pub fn insert(&mut self, info: ExerciseInfo) {
        self.exercises.insert(info.id.clone(), info);
    }

    pub fn fail_next_read(&mut self, err: BackendError) {
        self.fail_reads.push_back(err);
    }

    pub fn clear_read_fault(&mut self) {
        self.fail_reads.pop_front();
    }
}

impl ExerciseCatalog for MemoryExerciseCatalog {
    fn get(&self, exercise_id: &str) -> Result<ExerciseInfo, BackendError> {
        if let Some(err) = self.fail_reads.front() {
            return Err(err.clone());
        }
        self.exercises
            .get(exercise_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(exercise_id.to_string()))
    }
}

/// Auth provider with a fixed (settable) identity.
#[derive(Debug, Default)]
pub struct StaticAuthProvider {
    user: Option<UserIdentity>,
    next_subscription: u64,
    active_subscriptions: u64,
}

impl StaticAuthProvider {
    pub fn new(user: Option<UserIdentity>) -> Self {
        StaticAuthProvider {
            user,
            next_subscription: 0,
            active_subscriptions: 0,
        }
    }

    pub fn signed_in(user: UserIdentity) -> Self {
        StaticAuthProvider::new(Some(user))
    }

    pub fn set_user(&mut self, user: Option<UserIdentity>) {
        self.user = user;
    }

    pub fn active_subscriptions(&self) -> u64 {
        self.active_subscriptions
    }
}

impl AuthProvider for StaticAuthProvider {
    fn current_user(&self) -> Option<UserIdentity> {
        self.user.clone()
    }

    fn subscribe(&mut self) -> SubscriptionId {
        self.next_subscription += 1;
        self.active_subscriptions += 1;
        SubscriptionId(self.next_subscription)
    }

    fn unsubscribe(&mut self, _id: SubscriptionId) {
        self.active_subscriptions = self.active_subscriptions.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gymiq_model::WorkoutSession;

    #[test]
    fn test_history_store_get_absent_is_not_found() {
        let store = MemoryHistoryStore::new();
        assert_eq!(
            store.get("missing"),
            Err(BackendError::NotFound("missing".to_string()))
        );
    }

    #[test]
    fn test_history_store_upsert_then_get() {
        let mut store = MemoryHistoryStore::new();
        let session = WorkoutSession::new("s1", "u1", Utc::now());
        let doc = WorkoutHistoryDoc::snapshot(&session, Utc::now());
        store.upsert(&doc).unwrap();
        assert_eq!(store.get("s1").unwrap().user_id, "u1");
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_read_fault_applies_until_cleared() {
        let mut store = MemoryHistoryStore::new();
        store.fail_next_read(BackendError::NetworkUnavailable("offline".into()));
        assert!(store.get("s1").is_err());
        assert!(store.get("s1").is_err());
        store.clear_read_fault();
        assert_eq!(
            store.get("s1"),
            Err(BackendError::NotFound("s1".to_string()))
        );
    }

    #[test]
    fn test_find_in_progress_filters_and_sorts_newest_first() {
        let mut store = MemoryHistoryStore::new();
        let now = Utc::now();

        let older = WorkoutSession::new("older", "u1", now);
        let newer = WorkoutSession::new("newer", "u1", now);
        let mut done = WorkoutSession::new("done", "u1", now);
        done.status = SessionStatus::Completed;
        let foreign = WorkoutSession::new("foreign", "u2", now);

        store.insert_doc(WorkoutHistoryDoc::snapshot(&older, now - chrono::Duration::minutes(10)));
        store.insert_doc(WorkoutHistoryDoc::snapshot(&newer, now));
        store.insert_doc(WorkoutHistoryDoc::snapshot(&done, now));
        store.insert_doc(WorkoutHistoryDoc::snapshot(&foreign, now));

        let found = store.find_in_progress("u1").unwrap();
        let ids: Vec<&str> = found.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["newer", "older"]);
    }

    #[test]
    fn test_delete_removes_document() {
        let mut store = MemoryHistoryStore::new();
        let session = WorkoutSession::new("s1", "u1", Utc::now());
        store.upsert(&WorkoutHistoryDoc::snapshot(&session, Utc::now())).unwrap();

        store.delete("s1").unwrap();
        assert_eq!(
            store.get("s1"),
            Err(BackendError::NotFound("s1".to_string()))
        );
        // Deleting an absent document is not an error.
        assert!(store.delete("s1").is_ok());
    }

    #[test]
    fn test_write_fault_consumed_by_one_attempt() {
        let mut store = MemoryHistoryStore::new();
        let session = WorkoutSession::new("s1", "u1", Utc::now());
        let doc = WorkoutHistoryDoc::snapshot(&session, Utc::now());
        store.fail_next_write(BackendError::NetworkUnavailable("offline".into()));
        assert!(store.upsert(&doc).is_err());
        assert!(store.upsert(&doc).is_ok());
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_quota_exhausted_storage_rejects_writes() {
        let mut storage = MemoryStorage::new();
        storage.set_quota_exhausted(true);
        assert!(storage.set("k", "v").is_err());
        storage.set_quota_exhausted(false);
        assert!(storage.set("k", "v").is_ok());
    }

    #[test]
    fn test_auth_subscription_bookkeeping() {
        let mut auth = StaticAuthProvider::signed_in(UserIdentity::member("u1"));
        let id = auth.subscribe();
        assert_eq!(auth.active_subscriptions(), 1);
        auth.unsubscribe(id);
        assert_eq!(auth.active_subscriptions(), 0);
    }
}

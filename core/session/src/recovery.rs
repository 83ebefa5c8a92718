//! Recovery/Validation Gate: decides the fate of a cached session pointer.
//!
//! Runs on startup once an authenticated identity is available. One input
//! (the stored pointer) and one lookup (the remote fetch) drive a fixed
//! decision table; see [`recover`] for the rules in order.
//!
//! Discard always deletes both durable artifacts (pointer and snapshot).
//! The user never asked for this document explicitly, so every discard is
//! silent; only a network-class failure keeps the pointer for a later retry
//! — losing an offline user's in-progress workout is worse than delaying
//! cleanup.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use gymiq_model::catalog::FALLBACK_BUCKET;
use gymiq_model::{UserIdentity, WorkoutSession};

use crate::backend::{ExerciseCatalog, WorkoutHistoryStore};
use crate::error::BackendError;
use crate::storage::{clear_session_artifacts, save_pointer, DurableStorage, SessionPointer};

/// Why a cached pointer was thrown away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Remote document does not exist.
    NotFound,
    /// Backend rejected the read outright; never transient, reliably means
    /// the document belongs to someone else or was written under corrupted
    /// client state.
    AccessDenied,
    /// Document exists but `user_id` does not match the current user.
    WrongUser,
    /// Document already reached a terminal status through another path
    /// (e.g. another device completed it).
    NotResumable,
    /// Unexpected document shape; treated like an unknown failure.
    Malformed,
    /// Unclassified backend failure.
    Unknown,
    /// Pointer is old enough that resurrecting the workout helps nobody.
    StalePointer,
}

/// Outcome of one recovery pass.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryOutcome {
    /// No cached pointer; nothing to do.
    NoPointer,
    /// Session restored; the caller should notify the user.
    Resumed(WorkoutSession),
    /// Pointer (and snapshot) deleted.
    Discarded(DiscardReason),
    /// Remote unreachable; pointer kept for an optimistic retry later.
    RetainedOffline,
}

/// Runs the recovery decision table.
///
/// Rules, in order:
/// 1. No cached pointer → nothing to do.
/// 2. Pointer stale (> 7 days) → discard without a fetch.
/// 3. Fetch fails network-class → keep the pointer, retry later.
/// 4. Fetch fails permission-class → discard.
/// 5. Document absent → discard.
/// 6. Owner mismatch → discard.
/// 7. Status not in-progress → discard.
/// 8. Otherwise resume: backfill classification from the catalog, rewrite
///    the lease for this tab, and hand the session back.
pub fn recover(
    storage: &mut dyn DurableStorage,
    remote: &dyn WorkoutHistoryStore,
    catalog: &dyn ExerciseCatalog,
    user: &UserIdentity,
    lease_token: &str,
    now: DateTime<Utc>,
) -> RecoveryOutcome {
    let Some(pointer) = crate::storage::load_pointer(storage) else {
        debug!("No session pointer cached");
        return RecoveryOutcome::NoPointer;
    };

    if pointer.is_stale(now) {
        info!(session_id = %pointer.session_id, "Discarding stale session pointer");
        return discard(storage, DiscardReason::StalePointer);
    }

    let doc = match remote.get(&pointer.session_id) {
        Ok(doc) => doc,
        Err(BackendError::NetworkUnavailable(reason)) => {
            info!(
                session_id = %pointer.session_id,
                %reason,
                "Remote unreachable during recovery, keeping pointer"
            );
            return RecoveryOutcome::RetainedOffline;
        }
        Err(BackendError::PermissionDenied(_)) => {
            info!(session_id = %pointer.session_id, "Access denied for cached session, discarding");
            return discard(storage, DiscardReason::AccessDenied);
        }
        Err(BackendError::NotFound(_)) => {
            info!(session_id = %pointer.session_id, "Cached session no longer exists, discarding");
            return discard(storage, DiscardReason::NotFound);
        }
        Err(BackendError::Malformed(context)) => {
            warn!(session_id = %pointer.session_id, %context, "Malformed remote document, discarding");
            return discard(storage, DiscardReason::Malformed);
        }
        Err(BackendError::Unknown(reason)) => {
            warn!(session_id = %pointer.session_id, %reason, "Unclassified fetch failure, discarding");
            return discard(storage, DiscardReason::Unknown);
        }
    };

    if doc.user_id.trim().is_empty() {
        warn!(session_id = %doc.id, "Remote document missing owner, discarding");
        return discard(storage, DiscardReason::Malformed);
    }

    if doc.user_id != user.id {
        // Never silently adopt a session that belongs to someone else.
        info!(
            session_id = %doc.id,
            "Cached session belongs to a different user, discarding"
        );
        return discard(storage, DiscardReason::WrongUser);
    }

    if !doc.status.is_resumable() {
        info!(
            session_id = %doc.id,
            status = ?doc.status,
            "Cached session already reached a terminal state, discarding"
        );
        return discard(storage, DiscardReason::NotResumable);
    }

    let mut session = doc.into_session();
    if let Err(err) = backfill_classification(catalog, &mut session) {
        // Same optimism as the fetch rule: the catalog being unreachable is
        // a network condition, not a verdict on the session.
        info!(session_id = %session.id, error = %err, "Catalog unreachable during resume, keeping pointer");
        return RecoveryOutcome::RetainedOffline;
    }

    // Take the lease for this tab so auto-save can proceed here.
    let refreshed = SessionPointer {
        session_id: session.id.clone(),
        user_id: session.user_id.clone(),
        lease_token: lease_token.to_string(),
        saved_at: now,
    };
    if let Err(err) = save_pointer(storage, &refreshed) {
        warn!(error = %err, "Failed to refresh session pointer after resume");
    }

    info!(session_id = %session.id, "Restored in-progress workout session");
    RecoveryOutcome::Resumed(session)
}

fn discard(storage: &mut dyn DurableStorage, reason: DiscardReason) -> RecoveryOutcome {
    clear_session_artifacts(storage);
    RecoveryOutcome::Discarded(reason)
}

/// Repopulates `category`/`primary_muscle` from authoritative catalog
/// metadata rather than trusting whatever the document carried.
///
/// A network-class catalog failure aborts the resume (returned as `Err`).
/// A missing catalog row falls back to the document's own non-empty value,
/// else the generic bucket; the fields are never left empty.
fn backfill_classification(
    catalog: &dyn ExerciseCatalog,
    session: &mut WorkoutSession,
) -> Result<(), BackendError> {
    for exercise in &mut session.exercises {
        match catalog.get(&exercise.exercise_id) {
            Ok(info) => {
                exercise.category = non_blank(&info.category)
                    .unwrap_or_else(|| fallback_for(exercise.category.as_str()));
                exercise.primary_muscle = non_blank(&info.primary_muscle)
                    .unwrap_or_else(|| fallback_for(exercise.primary_muscle.as_str()));
            }
            Err(err @ BackendError::NetworkUnavailable(_)) => return Err(err),
            Err(err) => {
                warn!(
                    exercise_id = %exercise.exercise_id,
                    error = %err,
                    "Catalog miss during resume, using document classification"
                );
                exercise.category = fallback_for(exercise.category.as_str());
                exercise.primary_muscle = fallback_for(exercise.primary_muscle.as_str());
            }
        }
    }
    Ok(())
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn fallback_for(existing: &str) -> String {
    non_blank(existing).unwrap_or_else(|| FALLBACK_BUCKET.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryExerciseCatalog, MemoryHistoryStore, MemoryStorage};
    use crate::storage::{load_pointer, load_snapshot, save_snapshot};
    use chrono::Duration;
    use gymiq_model::{
        ExerciseInfo, SessionStatus, WorkoutExercise, WorkoutHistoryDoc,
    };

    const LEASE: &str = "tab-a";

    fn pointer_for(session_id: &str, user_id: &str) -> SessionPointer {
        SessionPointer {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            lease_token: "tab-old".to_string(),
            saved_at: Utc::now(),
        }
    }

    fn doc_for(session_id: &str, user_id: &str, status: SessionStatus) -> WorkoutHistoryDoc {
        let mut session = WorkoutSession::new(session_id, user_id, Utc::now());
        session.status = status;
        session.exercises.push(WorkoutExercise {
            exercise_id: "squat".to_string(),
            name: "Back Squat".to_string(),
            category: String::new(),
            primary_muscle: String::new(),
            sets: Vec::new(),
        });
        WorkoutHistoryDoc::snapshot(&session, Utc::now())
    }

    fn catalog_with_squat() -> MemoryExerciseCatalog {
        let mut catalog = MemoryExerciseCatalog::new();
        catalog.insert(ExerciseInfo {
            id: "squat".to_string(),
            name: "Back Squat".to_string(),
            category: "strength".to_string(),
            primary_muscle: "quads".to_string(),
            equipment: Some("barbell".to_string()),
        });
        catalog
    }

    fn recover_now(
        storage: &mut MemoryStorage,
        remote: &MemoryHistoryStore,
        catalog: &MemoryExerciseCatalog,
        user: &UserIdentity,
    ) -> RecoveryOutcome {
        recover(storage, remote, catalog, user, LEASE, Utc::now())
    }

    #[test]
    fn test_no_pointer_is_a_no_op() {
        let mut storage = MemoryStorage::new();
        let remote = MemoryHistoryStore::new();
        let catalog = catalog_with_squat();
        let user = UserIdentity::member("u1");
        assert_eq!(
            recover_now(&mut storage, &remote, &catalog, &user),
            RecoveryOutcome::NoPointer
        );
    }

    #[test]
    fn test_network_failure_keeps_pointer() {
        let mut storage = MemoryStorage::new();
        save_pointer(&mut storage, &pointer_for("s1", "u1")).unwrap();
        let mut remote = MemoryHistoryStore::new();
        remote.fail_next_read(BackendError::NetworkUnavailable("offline".into()));
        let catalog = catalog_with_squat();
        let user = UserIdentity::member("u1");

        assert_eq!(
            recover_now(&mut storage, &remote, &catalog, &user),
            RecoveryOutcome::RetainedOffline
        );
        assert!(load_pointer(&storage).is_some());

        // A later successful fetch can still resume.
        remote.clear_read_fault();
        remote.insert_doc(doc_for("s1", "u1", SessionStatus::InProgress));
        let outcome = recover_now(&mut storage, &remote, &catalog, &user);
        assert!(matches!(outcome, RecoveryOutcome::Resumed(_)));
    }

    #[test]
    fn test_permission_denied_discards() {
        let mut storage = MemoryStorage::new();
        save_pointer(&mut storage, &pointer_for("s1", "u1")).unwrap();
        let mut remote = MemoryHistoryStore::new();
        remote.fail_next_read(BackendError::PermissionDenied("s1".into()));
        let catalog = catalog_with_squat();
        let user = UserIdentity::member("u1");

        assert_eq!(
            recover_now(&mut storage, &remote, &catalog, &user),
            RecoveryOutcome::Discarded(DiscardReason::AccessDenied)
        );
        assert!(load_pointer(&storage).is_none());
    }

    #[test]
    fn test_missing_document_discards() {
        let mut storage = MemoryStorage::new();
        save_pointer(&mut storage, &pointer_for("s1", "u1")).unwrap();
        let remote = MemoryHistoryStore::new();
        let catalog = catalog_with_squat();
        let user = UserIdentity::member("u1");

        assert_eq!(
            recover_now(&mut storage, &remote, &catalog, &user),
            RecoveryOutcome::Discarded(DiscardReason::NotFound)
        );
    }

    #[test]
    fn test_wrong_user_discards_and_clears_snapshot() {
        let mut storage = MemoryStorage::new();
        save_pointer(&mut storage, &pointer_for("s1", "u1")).unwrap();
        save_snapshot(&mut storage, &WorkoutSession::new("s1", "u1", Utc::now())).unwrap();
        let mut remote = MemoryHistoryStore::new();
        remote.insert_doc(doc_for("s1", "u1", SessionStatus::InProgress));
        let catalog = catalog_with_squat();
        let other_user = UserIdentity::member("u2");

        assert_eq!(
            recover_now(&mut storage, &remote, &catalog, &other_user),
            RecoveryOutcome::Discarded(DiscardReason::WrongUser)
        );
        assert!(load_pointer(&storage).is_none());
        assert!(load_snapshot(&storage).is_none());
    }

    #[test]
    fn test_terminal_status_never_resumes() {
        for status in [
            SessionStatus::Completed,
            SessionStatus::Abandoned,
            SessionStatus::Planned,
        ] {
            let mut storage = MemoryStorage::new();
            save_pointer(&mut storage, &pointer_for("s1", "u1")).unwrap();
            let mut remote = MemoryHistoryStore::new();
            remote.insert_doc(doc_for("s1", "u1", status));
            let catalog = catalog_with_squat();
            let user = UserIdentity::member("u1");

            assert_eq!(
                recover_now(&mut storage, &remote, &catalog, &user),
                RecoveryOutcome::Discarded(DiscardReason::NotResumable),
                "status {:?} must not resume",
                status
            );
        }
    }

    #[test]
    fn test_resume_backfills_classification_from_catalog() {
        let mut storage = MemoryStorage::new();
        save_pointer(&mut storage, &pointer_for("s1", "u1")).unwrap();
        let mut remote = MemoryHistoryStore::new();
        remote.insert_doc(doc_for("s1", "u1", SessionStatus::InProgress));
        let catalog = catalog_with_squat();
        let user = UserIdentity::member("u1");

        let outcome = recover_now(&mut storage, &remote, &catalog, &user);
        let RecoveryOutcome::Resumed(session) = outcome else {
            panic!("expected resume, got {:?}", outcome);
        };
        assert_eq!(session.exercises[0].category, "strength");
        assert_eq!(session.exercises[0].primary_muscle, "quads");
    }

    #[test]
    fn test_resume_rewrites_lease_for_this_tab() {
        let mut storage = MemoryStorage::new();
        save_pointer(&mut storage, &pointer_for("s1", "u1")).unwrap();
        let mut remote = MemoryHistoryStore::new();
        remote.insert_doc(doc_for("s1", "u1", SessionStatus::InProgress));
        let catalog = catalog_with_squat();
        let user = UserIdentity::member("u1");

        recover_now(&mut storage, &remote, &catalog, &user);
        assert_eq!(load_pointer(&storage).unwrap().lease_token, LEASE);
    }

    #[test]
    fn test_catalog_miss_falls_back_without_blank_fields() {
        let mut storage = MemoryStorage::new();
        save_pointer(&mut storage, &pointer_for("s1", "u1")).unwrap();
        let mut remote = MemoryHistoryStore::new();
        remote.insert_doc(doc_for("s1", "u1", SessionStatus::InProgress));
        let catalog = MemoryExerciseCatalog::new(); // squat missing
        let user = UserIdentity::member("u1");

        let outcome = recover_now(&mut storage, &remote, &catalog, &user);
        let RecoveryOutcome::Resumed(session) = outcome else {
            panic!("expected resume, got {:?}", outcome);
        };
        assert_eq!(session.exercises[0].category, FALLBACK_BUCKET);
        assert_eq!(session.exercises[0].primary_muscle, FALLBACK_BUCKET);
        assert!(session.exercises[0].is_classified());
    }

    #[test]
    fn test_catalog_offline_retains_pointer() {
        let mut storage = MemoryStorage::new();
        save_pointer(&mut storage, &pointer_for("s1", "u1")).unwrap();
        let mut remote = MemoryHistoryStore::new();
        remote.insert_doc(doc_for("s1", "u1", SessionStatus::InProgress));
        let mut catalog = catalog_with_squat();
        catalog.fail_next_read(BackendError::NetworkUnavailable("offline".into()));
        let user = UserIdentity::member("u1");

        assert_eq!(
            recover_now(&mut storage, &remote, &catalog, &user),
            RecoveryOutcome::RetainedOffline
        );
        assert!(load_pointer(&storage).is_some());
    }

    #[test]
    fn test_stale_pointer_discarded_without_fetch() {
        let mut storage = MemoryStorage::new();
        let mut pointer = pointer_for("s1", "u1");
        pointer.saved_at = Utc::now() - Duration::days(8);
        save_pointer(&mut storage, &pointer).unwrap();
        // Remote would error if touched; it must not be.
        let mut remote = MemoryHistoryStore::new();
        remote.fail_next_read(BackendError::Unknown("must not fetch".into()));
        let catalog = catalog_with_squat();
        let user = UserIdentity::member("u1");

        assert_eq!(
            recover_now(&mut storage, &remote, &catalog, &user),
            RecoveryOutcome::Discarded(DiscardReason::StalePointer)
        );
    }

    #[test]
    fn test_document_without_owner_discards_as_malformed() {
        let mut storage = MemoryStorage::new();
        save_pointer(&mut storage, &pointer_for("s1", "")).unwrap();
        let mut remote = MemoryHistoryStore::new();
        remote.insert_doc(doc_for("s1", "", SessionStatus::InProgress));
        let catalog = catalog_with_squat();
        let user = UserIdentity::member("u1");

        assert_eq!(
            recover_now(&mut storage, &remote, &catalog, &user),
            RecoveryOutcome::Discarded(DiscardReason::Malformed)
        );
    }
}

//! Interfaces to the hosted backend collaborators.
//!
//! The session core never talks to the network itself; clients supply
//! implementations of these traits backed by the hosted document store,
//! the auth provider, and the exercise metadata service. The [`memory`]
//! module ships in-memory implementations for tests and diagnostics.
//!
//! [`memory`]: crate::memory

use gymiq_model::{ExerciseInfo, UserIdentity, WorkoutHistoryDoc};

use crate::error::BackendError;

/// The remote workout-history collection.
///
/// Contract notes:
/// - `get` returns `NotFound` for absent documents (never `Ok` with a
///   placeholder).
/// - `upsert` creates the document if absent, replaces it otherwise. The
///   core always writes full snapshots; implementations must not merge.
/// - Cross-user reads must surface as `PermissionDenied`. A backend without
///   per-user access control must perform that check itself, otherwise the
///   gate's rule for access-denied fetches degrades to the (slower but
///   equivalent) wrong-user check.
/// - Timeouts classify as `NetworkUnavailable`.
pub trait WorkoutHistoryStore {
    fn get(&self, id: &str) -> Result<WorkoutHistoryDoc, BackendError>;

    fn upsert(&mut self, doc: &WorkoutHistoryDoc) -> Result<(), BackendError>;

    fn delete(&mut self, id: &str) -> Result<(), BackendError>;

    /// All in-progress documents owned by `user_id`, newest first.
    fn find_in_progress(&self, user_id: &str) -> Result<Vec<WorkoutHistoryDoc>, BackendError>;
}

/// The exercise metadata service.
///
/// Used to backfill authoritative `category`/`primary_muscle` values during
/// recovery and during manual exercise-add flows.
pub trait ExerciseCatalog {
    fn get(&self, exercise_id: &str) -> Result<ExerciseInfo, BackendError>;
}

/// Opaque handle returned by [`AuthProvider::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// The authentication provider.
///
/// The core only reads identity; it never mutates auth state. Identity
/// changes are delivered by the host to
/// [`SessionContext::handle_auth_change`]; `subscribe`/`unsubscribe` exist
/// so providers can track whether anyone is listening.
///
/// [`SessionContext::handle_auth_change`]: crate::context::SessionContext::handle_auth_change
pub trait AuthProvider {
    fn current_user(&self) -> Option<UserIdentity>;

    fn subscribe(&mut self) -> SubscriptionId;

    fn unsubscribe(&mut self, id: SubscriptionId);
}

//! Explicit session context: identity, store, bridge, and gate in one place.
//!
//! There is deliberately no module-level singleton here. Whoever needs
//! current-user identity and session state owns a `SessionContext`, calls
//! [`init`] when the app boots and [`teardown`] when it goes away.
//!
//! The host event loop drives the context: user actions call [`apply`] /
//! [`add_exercise`] / [`finish`], a periodic timer calls [`tick`], and the
//! auth layer delivers identity changes to [`handle_auth_change`]. The
//! recovery gate never runs before an authenticated identity is available,
//! since its ownership check is what makes resumption safe.
//!
//! [`init`]: SessionContext::init
//! [`teardown`]: SessionContext::teardown
//! [`apply`]: SessionContext::apply
//! [`add_exercise`]: SessionContext::add_exercise
//! [`finish`]: SessionContext::finish
//! [`tick`]: SessionContext::tick
//! [`handle_auth_change`]: SessionContext::handle_auth_change

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use ulid::Ulid;

use gymiq_model::{SessionStatus, UserIdentity, WorkoutSession, WorkoutSet};

use crate::autosave::{AutosaveBridge, AutosaveStats, DEFAULT_DEBOUNCE_WINDOW};
use crate::backend::{AuthProvider, ExerciseCatalog, SubscriptionId, WorkoutHistoryStore};
use crate::error::{Result, SessionError};
use crate::recovery::{recover, RecoveryOutcome};
use crate::storage::DurableStorage;
use crate::store::{FinishOutcome, SessionChange, SessionStore};

/// Bounded wait for the final save when a session is being finished or the
/// app is closing. Trades a small UI delay for durability.
pub const FINAL_SAVE_BOUND: Duration = Duration::from_secs(3);

/// Owns the session lifecycle for one client surface (one tab).
pub struct SessionContext<S, R, C, A>
where
    S: DurableStorage,
    R: WorkoutHistoryStore,
    C: ExerciseCatalog,
    A: AuthProvider,
{
    storage: S,
    remote: R,
    catalog: C,
    auth: A,
    subscription: Option<SubscriptionId>,
    user: Option<UserIdentity>,
    /// Random per-tab token; written into the pointer's lease field.
    tab_token: String,
    store: SessionStore,
    bridge: AutosaveBridge,
}

impl<S, R, C, A> SessionContext<S, R, C, A>
where
    S: DurableStorage,
    R: WorkoutHistoryStore,
    C: ExerciseCatalog,
    A: AuthProvider,
{
    pub fn new(storage: S, remote: R, catalog: C, auth: A) -> Self {
        Self::with_debounce_window(storage, remote, catalog, auth, DEFAULT_DEBOUNCE_WINDOW)
    }

    pub fn with_debounce_window(
        storage: S,
        remote: R,
        catalog: C,
        auth: A,
        window: Duration,
    ) -> Self {
        let tab_token = Ulid::new().to_string();
        let bridge = AutosaveBridge::new(tab_token.clone(), window);
        SessionContext {
            storage,
            remote,
            catalog,
            auth,
            subscription: None,
            user: None,
            tab_token,
            store: SessionStore::new(),
            bridge,
        }
    }

    /// Subscribes to auth changes and, if an identity is already resolved,
    /// runs the recovery gate immediately. Returns the gate's outcome, or
    /// `None` when identity has not resolved yet (the gate then runs on the
    /// first authenticated [`handle_auth_change`]).
    ///
    /// [`handle_auth_change`]: SessionContext::handle_auth_change
    pub fn init(&mut self) -> Option<RecoveryOutcome> {
        if self.subscription.is_none() {
            self.subscription = Some(self.auth.subscribe());
        }
        let user = self.auth.current_user();
        self.handle_auth_change(user)
    }

    /// Unsubscribes from auth changes. The in-memory session is left alone;
    /// callers flush via [`close_requested`] first if they care.
    ///
    /// [`close_requested`]: SessionContext::close_requested
    pub fn teardown(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.auth.unsubscribe(id);
        }
    }

    /// Delivers an identity change. Signing in (with no active session)
    /// runs the recovery gate; signing out drops the in-memory session and
    /// leaves durable artifacts for the next identity's gate to judge.
    pub fn handle_auth_change(&mut self, user: Option<UserIdentity>) -> Option<RecoveryOutcome> {
        match user {
            Some(user) => {
                let changed_user =
                    self.user.as_ref().map(|u| u.id != user.id).unwrap_or(true);
                self.user = Some(user);
                if changed_user && self.store.session().is_some() {
                    // Identity switched underneath an active session; it no
                    // longer belongs to the signed-in user.
                    info!("User changed with an active session, dropping it");
                    self.store.drop_in_memory();
                }
                if self.store.session().is_none() {
                    return Some(self.run_recovery());
                }
                None
            }
            None => {
                if self.user.take().is_some() {
                    info!("Signed out, dropping in-memory session");
                }
                self.store.drop_in_memory();
                None
            }
        }
    }

    fn run_recovery(&mut self) -> RecoveryOutcome {
        let user = self
            .user
            .clone()
            .expect("recovery gate requires a resolved identity");
        let outcome = recover(
            &mut self.storage,
            &self.remote,
            &self.catalog,
            &user,
            &self.tab_token,
            Utc::now(),
        );
        if let RecoveryOutcome::Resumed(session) = &outcome {
            self.store.adopt(session.clone());
            self.bridge.resume_writes();
        }
        outcome
    }

    /// Starts a new workout for the authenticated user.
    ///
    /// Before the session is created, any remote documents the user still
    /// has marked in-progress are swept (see [`sweep_orphaned_sessions`]).
    ///
    /// [`sweep_orphaned_sessions`]: SessionContext::sweep_orphaned_sessions
    pub fn start_workout(&mut self) -> Result<&WorkoutSession> {
        let user = self.user.as_ref().ok_or(SessionError::NotAuthenticated)?;
        let user_id = user.id.clone();
        self.sweep_orphaned_sessions(&user_id);
        self.bridge.resume_writes();
        let session = self
            .store
            .start(&mut self.storage, &user_id, &self.tab_token, Utc::now());
        self.bridge.note_mutation();
        Ok(session)
    }

    /// One active session per user: a remote document still in-progress when
    /// a new workout starts is an orphan from a session whose pointer was
    /// lost (crash, cleared storage, declined resume). An orphan with no
    /// completed sets is deleted outright; one with recorded work is closed
    /// as cancelled so history views stop showing it as active.
    ///
    /// Best-effort: an unreachable remote skips the sweep and never blocks
    /// the new session.
    fn sweep_orphaned_sessions(&mut self, user_id: &str) {
        let docs = match self.remote.find_in_progress(user_id) {
            Ok(docs) => docs,
            Err(err) => {
                debug!(error = %err, "Skipping orphan sweep, remote unavailable");
                return;
            }
        };
        for mut doc in docs {
            let has_work = doc
                .exercises
                .iter()
                .flat_map(|e| e.sets.iter())
                .any(|s| s.completed);
            if has_work {
                doc.status = SessionStatus::Abandoned;
                doc.end_time = Some(Utc::now());
                doc.updated_at = Utc::now();
                match self.remote.upsert(&doc) {
                    Ok(()) => info!(session_id = %doc.id, "Closed orphaned in-progress session"),
                    Err(err) => {
                        warn!(session_id = %doc.id, error = %err, "Failed to close orphaned session")
                    }
                }
            } else {
                match self.remote.delete(&doc.id) {
                    Ok(()) => info!(session_id = %doc.id, "Deleted empty orphaned session"),
                    Err(err) => {
                        warn!(session_id = %doc.id, error = %err, "Failed to delete orphaned session")
                    }
                }
            }
        }
    }

    /// Adds an exercise with classification fetched from the catalog.
    ///
    /// This is a user-initiated action, so a catalog failure is surfaced
    /// for a retry affordance rather than silently degraded.
    pub fn add_exercise(
        &mut self,
        exercise_id: &str,
        planned_sets: Vec<WorkoutSet>,
    ) -> Result<()> {
        if self.store.session().is_none() {
            return Err(SessionError::NoActiveSession);
        }
        let info = self.catalog.get(exercise_id)?;
        self.store.mutate(
            &mut self.storage,
            SessionChange::AddExercise { info, planned_sets },
        );
        self.bridge.note_mutation();
        Ok(())
    }

    /// Applies a session change. Never fails; invalid input is clamped or
    /// ignored by the store.
    pub fn apply(&mut self, change: SessionChange) {
        if self.store.mutate(&mut self.storage, change) {
            self.bridge.note_mutation();
        }
    }

    /// One debounce cycle; call from the host's periodic timer. Returns
    /// true if a remote write was committed. Auto-save failures are
    /// swallowed here (retried on the next cycle); a lost lease is logged
    /// and suspends further writes.
    pub fn tick(&mut self) -> bool {
        match self
            .bridge
            .poll(&self.storage, &mut self.remote, &mut self.store)
        {
            Ok(wrote) => wrote,
            Err(err) => {
                warn!(error = %err, "Auto-save suspended");
                false
            }
        }
    }

    /// Finishes the active session: terminal status, immediate final save
    /// (bounded wait), and artifact cleanup on confirmed success.
    ///
    /// On failure the session is kept (still terminal, still dirty) so the
    /// user can retry; the caller surfaces the error with a retry
    /// affordance.
    pub fn finish(&mut self, outcome: FinishOutcome, calories: Option<u32>) -> Result<()> {
        if !self.store.finish_local(outcome, calories, Utc::now()) {
            return Err(SessionError::NoActiveSession);
        }
        self.bridge.flush(
            &self.storage,
            &mut self.remote,
            &mut self.store,
            FINAL_SAVE_BOUND,
        )?;
        self.store.clear(&mut self.storage);
        Ok(())
    }

    /// Best-effort final save before the app closes or navigates away.
    /// Blocks at most [`FINAL_SAVE_BOUND`]; failures are logged, never
    /// surfaced — the pointer survives for the recovery gate.
    pub fn close_requested(&mut self) {
        if !self.store.is_dirty() {
            return;
        }
        if let Err(err) = self.bridge.flush(
            &self.storage,
            &mut self.remote,
            &mut self.store,
            FINAL_SAVE_BOUND,
        ) {
            warn!(error = %err, "Final save on close failed, pointer retained for recovery");
        }
    }

    pub fn session(&self) -> Option<&WorkoutSession> {
        self.store.session()
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        self.user.as_ref()
    }

    pub fn autosave_stats(&self) -> &AutosaveStats {
        self.bridge.stats()
    }

    /// This tab's lease token (diagnostics).
    pub fn tab_token(&self) -> &str {
        &self.tab_token
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Consumes the context, handing back the durable storage and remote
    /// store. Lets tests hand the same persisted state to a fresh context,
    /// the way a reload hands the same browser profile to a new tab.
    pub fn into_backends(self) -> (S, R) {
        (self.storage, self.remote)
    }
}

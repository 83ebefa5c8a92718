//! Local Session Store: the authoritative in-memory workout session.
//!
//! Holds the session being performed and mirrors a minimal pointer (plus a
//! full snapshot blob) into durable storage so a reload can find it again.
//! Mirroring is best-effort: a quota failure leaves the session usable in
//! memory and is logged, never propagated.
//!
//! Mutations never fail. Invalid input (negative reps, absurd weights,
//! out-of-range indices) is clamped or ignored, not rejected — a user
//! mid-set must never see an error because a field was fat-fingered.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use ulid::Ulid;

use gymiq_model::catalog::FALLBACK_BUCKET;
use gymiq_model::{
    session::{clamp_reps, clamp_rpe, clamp_weight_kg},
    ExerciseInfo, SessionStatus, WorkoutExercise, WorkoutSession, WorkoutSet,
};

use crate::storage::{
    clear_session_artifacts, save_pointer, save_snapshot, DurableStorage, SessionPointer,
};

/// How a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishOutcome {
    /// Explicit finish; the workout counts.
    Completed,
    /// Early exit; maps to the terminal `cancelled` wire status.
    Abandoned,
}

/// A single user action against the active session.
#[derive(Debug, Clone)]
pub enum SessionChange {
    /// Adds an exercise with classification sourced from catalog metadata.
    AddExercise {
        info: ExerciseInfo,
        planned_sets: Vec<WorkoutSet>,
    },
    AddSet {
        exercise: usize,
        set: WorkoutSet,
    },
    /// Records actuals for a set. Raw values are clamped, not validated.
    UpdateSet {
        exercise: usize,
        set: usize,
        reps: i64,
        weight_kg: f64,
        rpe: Option<f64>,
    },
    CompleteSet {
        exercise: usize,
        set: usize,
    },
    /// Navigation between exercises.
    GoToExercise(usize),
    /// Host timer tick.
    TimerTick {
        seconds: u64,
    },
}

/// Owns the active [`WorkoutSession`] and its dirty flag.
#[derive(Debug, Default)]
pub struct SessionStore {
    session: Option<WorkoutSession>,
    dirty: bool,
}

impl SessionStore {
    pub fn new() -> Self {
        SessionStore::default()
    }

    pub fn session(&self) -> Option<&WorkoutSession> {
        self.session.as_ref()
    }

    /// True when local mutations have not yet reached the remote document.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Marks the in-memory state as synchronized with the remote document.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Starts a new session for `user`, assigns a locally generated id, and
    /// writes the pointer (with this tab's lease token) to durable storage.
    ///
    /// Always succeeds; if storage rejects the pointer the session remains
    /// usable in memory only.
    pub fn start(
        &mut self,
        storage: &mut dyn DurableStorage,
        user_id: &str,
        lease_token: &str,
        now: DateTime<Utc>,
    ) -> &WorkoutSession {
        let session = WorkoutSession::new(Ulid::new().to_string(), user_id, now);

        let pointer = SessionPointer {
            session_id: session.id.clone(),
            user_id: user_id.to_string(),
            lease_token: lease_token.to_string(),
            saved_at: now,
        };
        if let Err(err) = save_pointer(storage, &pointer) {
            warn!(error = %err, "Failed to persist session pointer, continuing in memory");
        }
        if let Err(err) = save_snapshot(storage, &session) {
            warn!(error = %err, "Failed to persist session snapshot, continuing in memory");
        }

        self.session = Some(session);
        self.dirty = true;
        self.session.as_ref().expect("session was just set")
    }

    /// Adopts a session reconstructed by the recovery gate.
    pub fn adopt(&mut self, session: WorkoutSession) {
        self.session = Some(session);
        // The remote document is the source we just read; nothing to push.
        self.dirty = false;
    }

    /// Applies a change to the active session. Returns true if the session
    /// was mutated (and is now dirty). A change with no active session or
    /// with out-of-range indices is ignored.
    pub fn mutate(&mut self, storage: &mut dyn DurableStorage, change: SessionChange) -> bool {
        let Some(session) = self.session.as_mut() else {
            debug!("Ignoring mutation with no active session");
            return false;
        };

        let applied = match change {
            SessionChange::AddExercise { info, planned_sets } => {
                session.exercises.push(classified_exercise(info, planned_sets));
                true
            }
            SessionChange::AddSet { exercise, set } => match session.exercises.get_mut(exercise) {
                Some(ex) => {
                    ex.sets.push(set);
                    true
                }
                None => {
                    debug!(exercise, "Ignoring AddSet for out-of-range exercise");
                    false
                }
            },
            SessionChange::UpdateSet {
                exercise,
                set,
                reps,
                weight_kg,
                rpe,
            } => match session
                .exercises
                .get_mut(exercise)
                .and_then(|ex| ex.sets.get_mut(set))
            {
                Some(s) => {
                    s.actual_reps = clamp_reps(reps);
                    s.actual_weight_kg = clamp_weight_kg(weight_kg);
                    s.rpe = rpe.map(clamp_rpe);
                    true
                }
                None => {
                    debug!(exercise, set, "Ignoring UpdateSet for out-of-range set");
                    false
                }
            },
            SessionChange::CompleteSet { exercise, set } => match session
                .exercises
                .get_mut(exercise)
                .and_then(|ex| ex.sets.get_mut(set))
            {
                Some(s) => {
                    // Completing a set with no recorded actuals counts the
                    // targets as performed.
                    if !s.completed && s.actual_reps == 0 && s.actual_weight_kg == 0.0 {
                        s.actual_reps = s.target_reps;
                        s.actual_weight_kg = s.target_weight_kg;
                    }
                    s.completed = true;
                    true
                }
                None => {
                    debug!(exercise, set, "Ignoring CompleteSet for out-of-range set");
                    false
                }
            },
            SessionChange::GoToExercise(index) => {
                if index < session.exercises.len() {
                    session.current_exercise = index;
                    true
                } else {
                    debug!(index, "Ignoring navigation to out-of-range exercise");
                    false
                }
            }
            SessionChange::TimerTick { seconds } => {
                session.elapsed_seconds = session.elapsed_seconds.saturating_add(seconds);
                true
            }
        };

        if applied {
            session.total_volume = session.compute_total_volume();
            self.dirty = true;
            if let Err(err) = save_snapshot(storage, session) {
                warn!(error = %err, "Failed to mirror session snapshot, continuing in memory");
            }
        }
        applied
    }

    /// Transitions the session to its terminal status. The caller performs
    /// the final save and, on confirmed success, [`clear`]s the artifacts.
    ///
    /// [`clear`]: SessionStore::clear
    pub fn finish_local(
        &mut self,
        outcome: FinishOutcome,
        calories: Option<u32>,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        session.status = match outcome {
            FinishOutcome::Completed => SessionStatus::Completed,
            FinishOutcome::Abandoned => SessionStatus::Abandoned,
        };
        session.end_time = Some(now);
        if calories.is_some() {
            session.calories = calories;
        }
        session.total_volume = session.compute_total_volume();
        self.dirty = true;
        true
    }

    /// Drops the in-memory session and deletes both durable artifacts.
    pub fn clear(&mut self, storage: &mut dyn DurableStorage) {
        self.session = None;
        self.dirty = false;
        clear_session_artifacts(storage);
    }

    /// Drops the in-memory session without touching durable storage (used
    /// on sign-out, where the next user's recovery gate owns the cleanup).
    pub fn drop_in_memory(&mut self) {
        self.session = None;
        self.dirty = false;
    }
}

/// Builds an exercise from catalog metadata, falling back to the generic
/// bucket if a catalog row itself carries blank classification.
fn classified_exercise(info: ExerciseInfo, planned_sets: Vec<WorkoutSet>) -> WorkoutExercise {
    let category = non_blank_or_fallback(&info.category, &info.id, "category");
    let primary_muscle = non_blank_or_fallback(&info.primary_muscle, &info.id, "primary_muscle");
    WorkoutExercise {
        exercise_id: info.id,
        name: info.name,
        category,
        primary_muscle,
        sets: planned_sets,
    }
}

fn non_blank_or_fallback(value: &str, exercise_id: &str, field: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        warn!(exercise_id, field, "Blank classification in catalog row, using fallback bucket");
        FALLBACK_BUCKET.to_string()
    } else {
        trimmed.to_string()
    }
}

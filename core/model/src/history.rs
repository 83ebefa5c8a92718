//! The remote workout-history document.
//!
//! This is the wire shape the auto-save bridge upserts and the recovery gate
//! reads back. Writes are always full-document snapshots (last-writer-wins);
//! the client never sends partial diffs that depend on remote state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{WorkoutExercise, WorkoutSession};
use crate::status::SessionStatus;

/// A workout-history document as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutHistoryDoc {
    pub id: String,
    pub user_id: String,
    pub status: SessionStatus,
    #[serde(default)]
    pub exercises: Vec<WorkoutExercise>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_volume: f64,
    #[serde(default)]
    pub calories: Option<u32>,
    /// Server-side bookkeeping; excluded from business-field comparison.
    pub updated_at: DateTime<Utc>,
}

impl WorkoutHistoryDoc {
    /// Builds a full snapshot of `session`, recomputing the derived volume.
    ///
    /// Building the same snapshot from the same session twice yields
    /// documents that agree on every business field, which is what makes the
    /// bridge's upsert idempotent.
    pub fn snapshot(session: &WorkoutSession, updated_at: DateTime<Utc>) -> Self {
        WorkoutHistoryDoc {
            id: session.id.clone(),
            user_id: session.user_id.clone(),
            status: session.status,
            exercises: session.exercises.clone(),
            start_time: session.start_time,
            end_time: session.end_time,
            total_volume: session.compute_total_volume(),
            calories: session.calories,
            updated_at,
        }
    }

    /// Reconstructs a session from this document.
    ///
    /// Classification backfill is the recovery gate's job; this conversion
    /// copies exercises as-is.
    pub fn into_session(self) -> WorkoutSession {
        WorkoutSession {
            id: self.id,
            user_id: self.user_id,
            status: self.status,
            exercises: self.exercises,
            start_time: self.start_time,
            end_time: self.end_time,
            total_volume: self.total_volume,
            calories: self.calories,
            current_exercise: 0,
            elapsed_seconds: 0,
        }
    }

    /// Compares every field except the `updated_at` timestamp.
    pub fn business_fields_eq(&self, other: &WorkoutHistoryDoc) -> bool {
        self.id == other.id
            && self.user_id == other.user_id
            && self.status == other.status
            && self.exercises == other.exercises
            && self.start_time == other.start_time
            && self.end_time == other.end_time
            && self.total_volume == other.total_volume
            && self.calories == other.calories
    }
}

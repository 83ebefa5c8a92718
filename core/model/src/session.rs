//! The in-memory workout session and its parts.
//!
//! A [`WorkoutSession`] is owned by the local session store while a workout
//! is being performed. `total_volume` is derived from completed sets and is
//! recomputed whenever a snapshot is built; it is never authoritative.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::{SessionStatus, SetType};

/// Upper bound applied when clamping rep counts from UI input.
pub const MAX_REPS: u32 = 1_000;

/// Upper bound applied when clamping weights, in kilograms.
pub const MAX_WEIGHT_KG: f64 = 1_000.0;

/// One set of an exercise: planned target plus what actually happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSet {
    #[serde(rename = "type", default)]
    pub set_type: SetType,
    pub target_reps: u32,
    pub target_weight_kg: f64,
    #[serde(default)]
    pub actual_reps: u32,
    #[serde(default)]
    pub actual_weight_kg: f64,
    #[serde(default)]
    pub completed: bool,
    /// Rate of perceived exertion, 1.0–10.0 when recorded.
    #[serde(default)]
    pub rpe: Option<f64>,
}

impl WorkoutSet {
    pub fn planned(set_type: SetType, target_reps: u32, target_weight_kg: f64) -> Self {
        WorkoutSet {
            set_type,
            target_reps,
            target_weight_kg,
            actual_reps: 0,
            actual_weight_kg: 0.0,
            completed: false,
            rpe: None,
        }
    }

    /// Volume contributed by this set (zero until completed).
    pub fn volume(&self) -> f64 {
        if self.completed {
            f64::from(self.actual_reps) * self.actual_weight_kg
        } else {
            0.0
        }
    }
}

/// An exercise within a session, with its ordered sets.
///
/// `category` and `primary_muscle` must be populated from authoritative
/// catalog metadata on every entry path. An empty string here mis-buckets
/// the exercise under the generic "other" grouping in history views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutExercise {
    pub exercise_id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub primary_muscle: String,
    #[serde(default)]
    pub sets: Vec<WorkoutSet>,
}

impl WorkoutExercise {
    /// True when both classification fields carry real values.
    pub fn is_classified(&self) -> bool {
        !self.category.trim().is_empty() && !self.primary_muscle.trim().is_empty()
    }
}

/// The workout currently being performed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSession {
    pub id: String,
    pub user_id: String,
    pub status: SessionStatus,
    #[serde(default)]
    pub exercises: Vec<WorkoutExercise>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Derived from completed sets; recomputed on every snapshot build.
    #[serde(default)]
    pub total_volume: f64,
    #[serde(default)]
    pub calories: Option<u32>,
    /// Index of the exercise the user is currently on.
    #[serde(default)]
    pub current_exercise: usize,
    /// Workout timer, advanced by host timer ticks.
    #[serde(default)]
    pub elapsed_seconds: u64,
}

impl WorkoutSession {
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        WorkoutSession {
            id: id.into(),
            user_id: user_id.into(),
            status: SessionStatus::InProgress,
            exercises: Vec::new(),
            start_time,
            end_time: None,
            total_volume: 0.0,
            calories: None,
            current_exercise: 0,
            elapsed_seconds: 0,
        }
    }

    /// Sum of completed-set volume across all exercises.
    pub fn compute_total_volume(&self) -> f64 {
        self.exercises
            .iter()
            .flat_map(|e| e.sets.iter())
            .map(WorkoutSet::volume)
            .sum()
    }
}

/// Clamps a raw rep count from UI input into `0..=MAX_REPS`.
pub fn clamp_reps(raw: i64) -> u32 {
    raw.clamp(0, i64::from(MAX_REPS)) as u32
}

/// Clamps a raw weight from UI input into `0.0..=MAX_WEIGHT_KG`.
///
/// Non-finite input collapses to zero rather than poisoning volume math.
pub fn clamp_weight_kg(raw: f64) -> f64 {
    if raw.is_finite() {
        raw.clamp(0.0, MAX_WEIGHT_KG)
    } else {
        0.0
    }
}

/// Clamps an RPE value into the 1.0–10.0 scale.
pub fn clamp_rpe(raw: f64) -> f64 {
    if raw.is_finite() {
        raw.clamp(1.0, 10.0)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed_set(reps: u32, weight: f64) -> WorkoutSet {
        WorkoutSet {
            set_type: SetType::Working,
            target_reps: reps,
            target_weight_kg: weight,
            actual_reps: reps,
            actual_weight_kg: weight,
            completed: true,
            rpe: None,
        }
    }

    #[test]
    fn test_volume_ignores_incomplete_sets() {
        let set = WorkoutSet::planned(SetType::Working, 8, 100.0);
        assert_eq!(set.volume(), 0.0);
    }

    #[test]
    fn test_total_volume_sums_completed_sets() {
        let mut session = WorkoutSession::new("s1", "u1", Utc::now());
        session.exercises.push(WorkoutExercise {
            exercise_id: "bench".to_string(),
            name: "Bench Press".to_string(),
            category: "strength".to_string(),
            primary_muscle: "chest".to_string(),
            sets: vec![
                completed_set(10, 60.0),
                completed_set(8, 80.0),
                WorkoutSet::planned(SetType::Working, 8, 80.0),
            ],
        });
        assert_eq!(session.compute_total_volume(), 10.0 * 60.0 + 8.0 * 80.0);
    }

    #[test]
    fn test_clamp_reps_negative_becomes_zero() {
        assert_eq!(clamp_reps(-5), 0);
    }

    #[test]
    fn test_clamp_reps_caps_absurd_input() {
        assert_eq!(clamp_reps(9_999_999), MAX_REPS);
    }

    #[test]
    fn test_clamp_weight_rejects_nan() {
        assert_eq!(clamp_weight_kg(f64::NAN), 0.0);
        assert_eq!(clamp_weight_kg(f64::INFINITY), 0.0);
    }

    #[test]
    fn test_clamp_rpe_range() {
        assert_eq!(clamp_rpe(0.0), 1.0);
        assert_eq!(clamp_rpe(11.5), 10.0);
        assert_eq!(clamp_rpe(7.5), 7.5);
    }

    #[test]
    fn test_is_classified_rejects_blank_fields() {
        let mut exercise = WorkoutExercise {
            exercise_id: "squat".to_string(),
            name: "Back Squat".to_string(),
            category: "strength".to_string(),
            primary_muscle: " ".to_string(),
            sets: Vec::new(),
        };
        assert!(!exercise.is_classified());
        exercise.primary_muscle = "quads".to_string();
        assert!(exercise.is_classified());
    }

    #[test]
    fn test_session_deserializes_with_missing_optionals() {
        let json = r#"{
            "id": "s1",
            "user_id": "u1",
            "status": "in_progress",
            "start_time": "2026-08-30T10:00:00Z"
        }"#;
        let session: WorkoutSession = serde_json::from_str(json).unwrap();
        assert!(session.exercises.is_empty());
        assert_eq!(session.elapsed_seconds, 0);
        assert!(session.calories.is_none());
    }
}

//! Session status union and set classification.
//!
//! The hosted backend historically wrote two distinct spellings for an
//! abandoned workout (`cancelled` and `partial`). Both collapse onto a
//! single [`SessionStatus::Abandoned`] variant at the serde boundary so the
//! resumption logic never has to special-case the legacy spelling.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a workout session.
///
/// Serialized spellings match the backend documents: `planned`,
/// `in_progress`, `completed`, `cancelled` (with legacy alias `partial`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Planned,
    InProgress,
    Completed,
    /// Abandoned mid-workout. Reads both the `cancelled` and legacy
    /// `partial` spellings; always writes `cancelled`.
    #[serde(rename = "cancelled", alias = "partial")]
    Abandoned,
}

impl SessionStatus {
    /// Terminal statuses admit no further resumption.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Abandoned)
    }

    /// Only an in-progress session may be resumed after a reload.
    pub fn is_resumable(self) -> bool {
        matches!(self, SessionStatus::InProgress)
    }
}

/// Classification of a single set within an exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetType {
    Warmup,
    Working,
    Dropset,
    Superset,
    Amrap,
}

impl Default for SetType {
    fn default() -> Self {
        SetType::Working
    }
}

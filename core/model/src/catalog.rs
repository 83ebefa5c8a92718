//! Authoritative exercise classification metadata.

use serde::{Deserialize, Serialize};

/// Classification bucket used when authoritative metadata is unavailable
/// and the remote document carries no usable value either.
pub const FALLBACK_BUCKET: &str = "other";

/// Catalog entry for a single exercise, as served by the metadata service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseInfo {
    pub id: String,
    pub name: String,
    pub category: String,
    pub primary_muscle: String,
    #[serde(default)]
    pub equipment: Option<String>,
}

//! # gymiq-model
//!
//! Shared data types for the GymIQ workout tracker.
//!
//! These types are the lingua franca of the GymIQ ecosystem: the session
//! core, the diagnostic tooling, and any future client surface all use these
//! exact same types, ensuring the snapshot a client writes is the snapshot
//! another device reads back.
//!
//! - [`status`]: session status union and set types
//! - [`session`]: the in-memory workout session and its parts
//! - [`history`]: the remote workout-history document (wire format)
//! - [`catalog`]: authoritative exercise classification metadata
//! - [`identity`]: authenticated user identity

pub mod catalog;
pub mod history;
pub mod identity;
pub mod session;
pub mod status;

pub use catalog::ExerciseInfo;
pub use history::WorkoutHistoryDoc;
pub use identity::{UserIdentity, UserRole};
pub use session::{WorkoutExercise, WorkoutSession, WorkoutSet};
pub use status::{SessionStatus, SetType};

//! # gymiq-session
//!
//! Core library for the GymIQ offline-resilient workout session lifecycle.
//!
//! A workout in progress lives in three places at once: the in-memory
//! session a user is actively editing, a durable pointer + snapshot in
//! client storage, and a remote workout-history document. This crate keeps
//! the three reconciled across network loss, reloads, and identity changes:
//!
//! ```text
//! user action → SessionStore → AutosaveBridge → remote history document
//!                    │  (pointer + snapshot)        ▲
//!                    ▼                              │
//!              durable storage ──── recovery gate ──┘  (on next launch)
//! ```
//!
//! ## Design Principles
//!
//! - **Synchronous**: no async runtime dependency. The host event loop
//!   drives debounce cycles via [`SessionContext::tick`].
//! - **Not thread-safe**: single-threaded, event-driven hosts; clients
//!   provide their own synchronization if they need it.
//! - **Graceful degradation**: corrupt or missing local state degrades to
//!   empty, never to an error; durable mirroring is best-effort.
//! - **Ownership first**: the recovery gate never adopts a session whose
//!   remote document is missing, unreadable, foreign, or already terminal.
//!
//! ## Module Structure
//!
//! - [`store`]: the authoritative in-memory session (start/mutate/finish)
//! - [`autosave`]: trailing-debounce bridge to the remote document
//! - [`recovery`]: the startup decision table over the cached pointer
//! - [`storage`]: durable pointer/snapshot persistence
//! - [`backend`]: traits for the hosted collaborators
//! - [`memory`]: in-memory backends for tests and diagnostics
//! - [`context`]: the per-tab object that wires it all together

pub mod autosave;
pub mod backend;
pub mod context;
pub mod error;
pub mod memory;
pub mod recovery;
pub mod storage;
pub mod store;

pub use autosave::{AutosaveBridge, AutosaveStats, DEFAULT_DEBOUNCE_WINDOW};
pub use backend::{AuthProvider, ExerciseCatalog, SubscriptionId, WorkoutHistoryStore};
pub use context::{SessionContext, FINAL_SAVE_BOUND};
pub use error::{BackendError, Result, SessionError};
pub use recovery::{recover, DiscardReason, RecoveryOutcome};
pub use storage::{
    DurableStorage, FileStorage, SessionPointer, StorageConfig, POINTER_KEY, SNAPSHOT_KEY,
};
pub use store::{FinishOutcome, SessionChange, SessionStore};

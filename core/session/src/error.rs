//! Error types for the session lifecycle core.

use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// Backend Error Taxonomy
// ═══════════════════════════════════════════════════════════════════════════════

/// Classified failures from the remote collaborators (history store,
/// exercise catalog, auth provider).
///
/// The recovery gate's decision rules hinge on this classification:
/// `NetworkUnavailable` is the only class treated as transient. Backends must
/// classify request timeouts as `NetworkUnavailable`, never as `NotFound` or
/// `PermissionDenied`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("document not found: {0}")]
    NotFound(String),

    /// Access-control rejection. Reliably indicates the document belongs to
    /// a different user or was written under corrupted client state; never
    /// transient.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    /// Unexpected document shape (e.g. missing `user_id` or `status`).
    /// Treated like `Unknown` everywhere it matters.
    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("backend error: {0}")]
    Unknown(String),
}

impl BackendError {
    /// True for the transient class that justifies keeping local state and
    /// retrying later.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::NetworkUnavailable(_))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Library Error
// ═══════════════════════════════════════════════════════════════════════════════

/// All errors surfaced by the session core.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Another tab rewrote the session lease; this tab must stop writing.
    #[error("session lease lost: {session_id}")]
    LeaseLost { session_id: String },

    #[error("no active workout session")]
    NoActiveSession,

    #[error("no authenticated user")]
    NotAuthenticated,
}

/// Convenience type alias for Results using SessionError.
pub type Result<T> = std::result::Result<T, SessionError>;

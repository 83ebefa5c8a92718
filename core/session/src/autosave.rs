//! Auto-Save Bridge: turns bursts of local mutations into infrequent,
//! idempotent remote writes.
//!
//! Trailing-edge debounce: every mutation resets the deadline, so a burst of
//! edits collapses into one write issued after a quiet period. The write is
//! a full-snapshot upsert keyed by the session id — the first write creates
//! the remote document, later writes replace it (last-writer-wins, never a
//! partial diff).
//!
//! Failure semantics: a failed debounced write is retried on the next
//! mutation-triggered cycle and never surfaced to the user. Only the final
//! save on an explicit finish (or app close) escalates, after a bounded
//! blocking retry loop.

use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use gymiq_model::WorkoutHistoryDoc;

use crate::backend::WorkoutHistoryStore;
use crate::error::{BackendError, Result, SessionError};
use crate::storage::{load_pointer, DurableStorage};
use crate::store::SessionStore;

/// Quiet period after the last mutation before a write is issued.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_secs(2);

/// Sleep between retries inside the bounded final-save wait.
const FLUSH_RETRY_STEP: Duration = Duration::from_millis(250);

/// Counters for observability; surfaced by `session-check`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AutosaveStats {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// Debounced synchronizer between the local session store and the remote
/// workout-history document.
#[derive(Debug)]
pub struct AutosaveBridge {
    window: Duration,
    deadline: Option<Instant>,
    /// This tab's lease token, compared against the stored pointer before
    /// every write.
    lease_token: String,
    suspended: bool,
    stats: AutosaveStats,
}

impl AutosaveBridge {
    pub fn new(lease_token: impl Into<String>, window: Duration) -> Self {
        AutosaveBridge {
            window,
            deadline: None,
            lease_token: lease_token.into(),
            suspended: false,
            stats: AutosaveStats::default(),
        }
    }

    pub fn stats(&self) -> &AutosaveStats {
        &self.stats
    }

    /// True after a lease loss; no further writes until the next `start`
    /// or resume re-arms the bridge.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Re-arms a suspended bridge (called when this tab takes the lease).
    pub fn resume_writes(&mut self) {
        self.suspended = false;
    }

    /// Notes a mutation: resets the trailing-debounce deadline.
    pub fn note_mutation(&mut self) {
        if self.suspended {
            return;
        }
        self.deadline = Some(Instant::now() + self.window);
    }

    /// True once the quiet period has elapsed and a write is pending.
    pub fn write_due(&self) -> bool {
        matches!(self.deadline, Some(d) if Instant::now() >= d)
    }

    /// Runs one debounce cycle. Issues the pending write if it is due;
    /// returns true if a write succeeded.
    ///
    /// Network-class failures are swallowed (logged, counted) and retried on
    /// the next mutation-triggered cycle. A lease mismatch suspends the
    /// bridge and returns [`SessionError::LeaseLost`] so the caller can put
    /// the session into read-only mode.
    pub fn poll(
        &mut self,
        storage: &dyn DurableStorage,
        remote: &mut dyn WorkoutHistoryStore,
        store: &mut SessionStore,
    ) -> Result<bool> {
        if !self.write_due() {
            return Ok(false);
        }
        self.deadline = None;

        if !store.is_dirty() {
            return Ok(false);
        }
        let Some(session) = store.session() else {
            return Ok(false);
        };

        self.check_lease(storage, &session.id)?;

        let doc = WorkoutHistoryDoc::snapshot(session, Utc::now());
        self.stats.attempted += 1;
        match remote.upsert(&doc) {
            Ok(()) => {
                self.stats.succeeded += 1;
                store.mark_clean();
                debug!(session_id = %doc.id, "Auto-saved session snapshot");
                Ok(true)
            }
            Err(err) => {
                self.stats.failed += 1;
                // Dirty flag stays set; the next mutation re-arms the timer.
                warn!(session_id = %doc.id, error = %err, "Auto-save failed, will retry");
                Ok(false)
            }
        }
    }

    /// Immediate, non-debounced save with a bounded blocking wait.
    ///
    /// Used for the final write on explicit finish or app close: network
    /// failures are retried until `bound` is exhausted, then surfaced so the
    /// caller can keep the local session and offer a retry.
    pub fn flush(
        &mut self,
        storage: &dyn DurableStorage,
        remote: &mut dyn WorkoutHistoryStore,
        store: &mut SessionStore,
        bound: Duration,
    ) -> Result<()> {
        self.deadline = None;

        if !store.is_dirty() {
            return Ok(());
        }
        let Some(session) = store.session() else {
            return Ok(());
        };

        self.check_lease(storage, &session.id)?;
        let doc = WorkoutHistoryDoc::snapshot(session, Utc::now());

        let started = Instant::now();
        let mut last_err: BackendError;
        loop {
            self.stats.attempted += 1;
            match remote.upsert(&doc) {
                Ok(()) => {
                    self.stats.succeeded += 1;
                    store.mark_clean();
                    info!(session_id = %doc.id, "Final session save committed");
                    return Ok(());
                }
                Err(err) => {
                    self.stats.failed += 1;
                    last_err = err;
                }
            }

            if !last_err.is_transient() || started.elapsed() + FLUSH_RETRY_STEP > bound {
                warn!(error = %last_err, "Final session save failed within bound");
                return Err(SessionError::Backend(last_err));
            }
            thread::sleep(FLUSH_RETRY_STEP);
        }
    }

    /// Verifies the stored pointer still carries this tab's lease token.
    ///
    /// A missing pointer is allowed: it means storage quota blocked the
    /// pointer write at `start`, and durability is best-effort there. Only a
    /// token that belongs to a different tab blocks the write.
    fn check_lease(&mut self, storage: &dyn DurableStorage, session_id: &str) -> Result<()> {
        if self.suspended {
            return Err(SessionError::LeaseLost {
                session_id: session_id.to_string(),
            });
        }
        if let Some(pointer) = load_pointer(storage) {
            if pointer.session_id == session_id && pointer.lease_token != self.lease_token {
                warn!(session_id, "Session lease taken by another tab, suspending auto-save");
                self.suspended = true;
                return Err(SessionError::LeaseLost {
                    session_id: session_id.to_string(),
                });
            }
        }
        Ok(())
    }
}

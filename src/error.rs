//! Error taxonomy for the grading engine and its entity store.

use thiserror::Error;

/// Errors surfaced by the entity store itself.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected a write. The store guarantees that
    /// racing creates of the same key resolve to exactly one winner; the
    /// loser sees this variant.
    #[error("unique constraint violated")]
    Conflict,

    /// The underlying SQLite operation failed.
    #[error("store operation failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Errors surfaced by engine operations.
///
/// Validation, conflict, and not-found messages are written for the caller
/// and may be shown verbatim. Integrity and store failures carry internal
/// detail: callers log them and surface a generic message instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The caller supplied empty or malformed input. Locally recoverable.
    #[error("{0}")]
    Validation(String),

    /// A uniqueness invariant would be violated (duplicate assessment name,
    /// duplicate username, duplicate open regrade request, duplicate grade).
    #[error("{0}")]
    Conflict(String),

    /// A referenced entity does not exist or is not in the expected state.
    #[error("{0}")]
    NotFound(String),

    /// A structural invariant assumed by the engine was violated in the
    /// store. Non-recoverable for the current operation; never ignored.
    #[error("data integrity violation: {0}")]
    Integrity(String),

    /// The store failed. No automatic retry: submit and resolve carry no
    /// idempotency key, so retry policy belongs to the caller.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Store(e)
    }
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        EngineError::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        EngineError::NotFound(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        EngineError::Integrity(msg.into())
    }

    /// Maps a store-level create failure, turning the constraint outcome
    /// into a caller-facing conflict with the given reason.
    pub fn from_create(e: StoreError, conflict_reason: &str) -> Self {
        match e {
            StoreError::Conflict => EngineError::Conflict(conflict_reason.to_string()),
            other => EngineError::Store(other),
        }
    }
}

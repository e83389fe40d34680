//! The four error kinds raised at engine component boundaries (FR §7).
//!
//! Every other deviant condition (queue overflow policy aside, thermal
//! throttling, packet loss, ECC faults, page faults, ...) is a *modeled
//! outcome* reported on `OperationResult`, never an `EngineError`.

use thiserror::Error;

/// Errors raised by the four capability-surface operations that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EngineError {
    /// `queue_operation` was called while `queue length == capacity`.
    #[error("queue is at capacity")]
    QueueFull,

    /// `load_profile` was called with a profile whose `EngineKind` does not
    /// match the engine's own kind.
    #[error("profile engine kind does not match this engine")]
    ProfileMismatch,

    /// `load_profile` was called with no profile.
    #[error("no profile supplied")]
    NilProfile,

    /// `set_complexity_level` was called with a level outside `0..=3`.
    #[error("complexity level must be 0..=3")]
    InvalidComplexity,
}

/// Convenience alias used throughout the engine crates.
pub type EngineResult<T> = Result<T, EngineError>;

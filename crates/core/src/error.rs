//! Centralized error types for the Reaper workspace.

use thiserror::Error;

/// Top-level error enum. Variants map to subsystems.
///
/// Adapter *operation* failures (throttling, not-found, access denied) are
/// never surfaced through this type -- they are encoded as
/// [`Outcome`](crate::types::Outcome) values so the orchestrator can apply
/// uniform retry policy. Only startup/resolution problems abort a run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReaperError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The declared `blocked_by` constraints contain a cycle. Carries the
    /// residual node set so an operator can fix the declarations.
    #[error("Dependency cycle among resource kinds: {}", .0.join(", "))]
    CycleDetected(Vec<String>),

    #[error("Adapter error: {0}")]
    Adapter(String),

    #[error("State error: {0}")]
    State(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ReaperResult<T> = Result<T, ReaperError>;

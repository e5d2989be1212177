//! Domain models, shared types, and error definitions.
//!
//! Foundation crate -- no async or I/O dependencies.

pub mod error;
pub mod types;

pub use error::{ReaperError, ReaperResult};
pub use types::{
    CandidateKey, FilterDecision, Outcome, Phase, ResourceCandidate, RetryPolicy, Scope,
    TransitionEvent,
};

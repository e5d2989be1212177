//! Dependency resolution, lifecycle state machine, scheduling core, and run
//! reporting for the Reaper cleanup engine.

pub mod event;
pub mod filter;
pub mod orchestrator;
pub mod reporter;
pub mod resolver;
pub mod state;

pub use event::{ChannelSink, EventSink, TracingSink};
pub use filter::{FilterEvaluator, FilterRules, RuleFilter};
pub use orchestrator::{Orchestrator, RunConfig};
pub use reporter::{PhaseCounts, RunSummary};
pub use resolver::{DependencyResolver, Wave};
pub use state::{StateRecord, StateStore};

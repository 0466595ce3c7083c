//! Pipeline orchestrator for automated item production.
//!
//! The orchestrator drives items through the state machine automatically:
//! - **Gating**: run switch, collaborator config, host load and daily budget are checked every tick
//! - **Production**: claimed items run on a bounded worker pool (one worker by default)
//! - **Discovery**: runs only when nothing is ready, pending or in flight

mod config;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::PipelineOrchestrator;
pub use types::{OrchestratorError, OrchestratorStatus, TickOutcome};

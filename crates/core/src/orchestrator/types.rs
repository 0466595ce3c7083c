//! Types for the pipeline orchestrator.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::OrchestratorConfig;
use crate::item::StatusCounts;

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Item store error.
    #[error("item store error: {0}")]
    Item(#[from] crate::item::ItemError),

    /// Settings could not be read.
    #[error("settings error: {0}")]
    Settings(#[from] crate::settings::SettingsError),

    /// Error log could not be written.
    #[error("diagnostics error: {0}")]
    Diagnostics(#[from] crate::diagnostics::DiagnosticsError),

    /// Discovery collaborator failed.
    #[error("discovery failed: {0}")]
    Discovery(#[from] crate::stages::CollaboratorError),

    /// A tick panicked.
    #[error("tick panicked: {0}")]
    Panicked(String),

    #[error("orchestrator already running")]
    AlreadyRunning,

    #[error("orchestrator not running")]
    NotRunning,
}

/// What one loop iteration decided. Determines how long the loop sleeps next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// `system_status` is STOPPED.
    Stopped,
    /// A credential, endpoint or setting is missing or invalid.
    Misconfigured { reason: String },
    /// The governor reported pause.
    Paused,
    /// Today's completed count reached the daily limit.
    BudgetExhausted,
    /// An item was claimed and handed to a worker.
    Dispatched { item: String, throttled: bool },
    /// Every worker slot (or the remaining budget) is taken by in-flight items,
    /// or the post-item delay has not elapsed yet.
    Busy,
    /// The queue was empty and discovery ran.
    Discovered { count: usize },
    /// Pending items exist but none has a link yet.
    AwaitingLinks { pending: u64 },
}

impl TickOutcome {
    /// Sleep before the next tick.
    pub fn delay(&self, config: &OrchestratorConfig) -> Duration {
        let ms = match self {
            TickOutcome::Stopped => config.stopped_poll_ms,
            TickOutcome::Misconfigured { .. } => config.misconfigured_sleep_ms,
            TickOutcome::Paused => config.pause_poll_ms,
            TickOutcome::BudgetExhausted => config.budget_sleep_ms,
            // The post-item delay starts when the worker finishes
            TickOutcome::Dispatched { .. } | TickOutcome::Busy => config.busy_poll_ms,
            TickOutcome::Discovered { .. } => config.discovery_sleep_ms,
            TickOutcome::AwaitingLinks { .. } => config.awaiting_links_sleep_ms,
        };
        Duration::from_millis(ms)
    }
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Whether the orchestrator loop is running.
    pub running: bool,
    /// Items currently in production.
    pub in_flight: usize,
    /// Worker pool size.
    pub max_workers: usize,
    /// Outcome of the most recent successful tick.
    pub last_outcome: Option<TickOutcome>,
    /// When the most recent tick finished.
    pub last_tick_at: Option<DateTime<Utc>>,
    /// Ticks that failed in a row (drives the backoff).
    pub consecutive_errors: u32,
    /// Most recent loop error.
    pub last_error: Option<String>,
    /// Item counts per status.
    pub counts: StatusCounts,
    /// Productions completed today.
    pub completed_today: u32,
}

//! Orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the pipeline orchestrator.
///
/// Runtime switches (run/stop, thresholds, daily limit) are settings in the
/// store, not config; these values are fixed for the life of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Start the orchestrator loop on boot.
    /// When disabled, items can still be managed via the API.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Failed attempts before an item becomes `Failed`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Items produced concurrently. 1 reproduces a strictly sequential loop.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Upper bound on one collaborator call (seconds).
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_secs: u64,

    /// Sleep while `system_status` is STOPPED (milliseconds).
    #[serde(default = "default_minute")]
    pub stopped_poll_ms: u64,

    /// Sleep while the governor reports pause (milliseconds).
    #[serde(default = "default_minute")]
    pub pause_poll_ms: u64,

    /// Sleep once the daily budget is used up (milliseconds).
    #[serde(default = "default_budget_sleep")]
    pub budget_sleep_ms: u64,

    /// Pause between an item finishing and the next claim (milliseconds).
    #[serde(default = "default_item_delay")]
    pub item_delay_ms: u64,

    /// Same pause for an item dispatched under throttle (milliseconds).
    #[serde(default = "default_minute")]
    pub throttled_item_delay_ms: u64,

    /// Sleep after a discovery run (milliseconds).
    #[serde(default = "default_minute")]
    pub discovery_sleep_ms: u64,

    /// Sleep while items wait for an operator to supply links (milliseconds).
    #[serde(default = "default_awaiting_links")]
    pub awaiting_links_sleep_ms: u64,

    /// Sleep while collaborators or settings are misconfigured (milliseconds).
    #[serde(default = "default_misconfigured")]
    pub misconfigured_sleep_ms: u64,

    /// Poll interval while workers are busy or the post-item pause runs (milliseconds).
    #[serde(default = "default_busy_poll")]
    pub busy_poll_ms: u64,

    /// First backoff after a loop error (milliseconds). Doubles per consecutive error.
    #[serde(default = "default_backoff_initial")]
    pub backoff_initial_ms: u64,

    /// Backoff ceiling (milliseconds).
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_workers() -> usize {
    1
}

fn default_stage_timeout() -> u64 {
    180
}

fn default_minute() -> u64 {
    60_000
}

fn default_budget_sleep() -> u64 {
    3_600_000 // 1 hour
}

fn default_item_delay() -> u64 {
    10_000
}

fn default_awaiting_links() -> u64 {
    300_000 // 5 minutes
}

fn default_misconfigured() -> u64 {
    30_000
}

fn default_busy_poll() -> u64 {
    1_000
}

fn default_backoff_initial() -> u64 {
    30_000
}

fn default_backoff_max() -> u64 {
    900_000 // 15 minutes
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_retries: default_max_retries(),
            max_workers: default_max_workers(),
            stage_timeout_secs: default_stage_timeout(),
            stopped_poll_ms: default_minute(),
            pause_poll_ms: default_minute(),
            budget_sleep_ms: default_budget_sleep(),
            item_delay_ms: default_item_delay(),
            throttled_item_delay_ms: default_minute(),
            discovery_sleep_ms: default_minute(),
            awaiting_links_sleep_ms: default_awaiting_links(),
            misconfigured_sleep_ms: default_misconfigured(),
            busy_poll_ms: default_busy_poll(),
            backoff_initial_ms: default_backoff_initial(),
            backoff_max_ms: default_backoff_max(),
        }
    }
}

impl OrchestratorConfig {
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }

    /// Backoff after `consecutive_errors` failed ticks (1-based), capped at the maximum.
    pub fn backoff(&self, consecutive_errors: u32) -> Duration {
        let exponent = consecutive_errors.saturating_sub(1).min(20);
        let ms = self
            .backoff_initial_ms
            .saturating_mul(1u64 << exponent)
            .min(self.backoff_max_ms);
        Duration::from_millis(ms)
    }
}

//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Item outcomes (published, retried, failed, discovered)
//! - Stage executor (failures and durations per stage, media degradations)
//! - Orchestrator gating (governor decisions, budget exhaustion, loop errors)
//!
//! Most counters are driven by pipeline events; call [`attach`] once on the
//! bus the orchestrator publishes to.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

use crate::events::{EventBus, PipelineEvent, SubscriptionId};

// =============================================================================
// Item Metrics
// =============================================================================

/// Items that reached `Published`.
pub static ITEMS_PUBLISHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("conveyor_items_published_total", "Total items published").unwrap()
});

/// Items returned to `Pending` after a stage failure.
pub static ITEMS_RETRIED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "conveyor_items_retried_total",
        "Total items returned to pending for retry",
    )
    .unwrap()
});

/// Items that hit the retry ceiling.
pub static ITEMS_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "conveyor_items_failed_total",
        "Total items that failed permanently",
    )
    .unwrap()
});

/// Items inserted by discovery.
pub static ITEMS_DISCOVERED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "conveyor_items_discovered_total",
        "Total new items inserted by discovery",
    )
    .unwrap()
});

// =============================================================================
// Stage Metrics
// =============================================================================

/// Stage failures by stage.
pub static STAGE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("conveyor_stage_failures_total", "Stage failures"),
        &["stage"], // "enrich", "generate_content", "generate_media", "publish"
    )
    .unwrap()
});

/// Collaborator call duration in seconds.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "conveyor_stage_duration_seconds",
            "Duration of collaborator calls per stage",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 180.0]),
        &["stage", "result"], // "success", "failed"
    )
    .unwrap()
});

/// Media problems that degraded an item without failing it.
pub static MEDIA_DEGRADATIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "conveyor_media_degradations_total",
        "Items published with missing or partial media",
    )
    .unwrap()
});

// =============================================================================
// Orchestrator Metrics
// =============================================================================

/// Governor transitions into throttle or pause.
pub static GOVERNOR_DECISIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "conveyor_governor_decisions_total",
            "Governor transitions by pressure level",
        ),
        &["pressure"], // "throttle", "pause"
    )
    .unwrap()
});

/// Times the daily budget ran out.
pub static BUDGET_EXHAUSTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "conveyor_budget_exhausted_total",
        "Times the daily run limit was reached",
    )
    .unwrap()
});

/// Ticks that ended in an error and triggered a backoff.
pub static LOOP_ERRORS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("conveyor_loop_errors_total", "Orchestrator loop errors").unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Items
        Box::new(ITEMS_PUBLISHED.clone()),
        Box::new(ITEMS_RETRIED.clone()),
        Box::new(ITEMS_FAILED.clone()),
        Box::new(ITEMS_DISCOVERED.clone()),
        // Stages
        Box::new(STAGE_FAILURES.clone()),
        Box::new(STAGE_DURATION.clone()),
        Box::new(MEDIA_DEGRADATIONS.clone()),
        // Orchestrator
        Box::new(GOVERNOR_DECISIONS.clone()),
        Box::new(BUDGET_EXHAUSTED.clone()),
        Box::new(LOOP_ERRORS.clone()),
    ]
}

/// Update counters from a pipeline event.
pub fn record_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::ItemPublished { .. } => ITEMS_PUBLISHED.inc(),
        PipelineEvent::ItemRetryScheduled { .. } => ITEMS_RETRIED.inc(),
        PipelineEvent::ItemFailed { .. } => ITEMS_FAILED.inc(),
        PipelineEvent::ItemDiscovered { .. } => ITEMS_DISCOVERED.inc(),
        PipelineEvent::StageFailed { stage, .. } => {
            STAGE_FAILURES.with_label_values(&[stage.as_str()]).inc()
        }
        PipelineEvent::MediaDegraded { .. } => MEDIA_DEGRADATIONS.inc(),
        PipelineEvent::GovernorThrottle { .. } => {
            GOVERNOR_DECISIONS.with_label_values(&["throttle"]).inc()
        }
        PipelineEvent::GovernorPause { .. } => {
            GOVERNOR_DECISIONS.with_label_values(&["pause"]).inc()
        }
        PipelineEvent::BudgetExhausted { .. } => BUDGET_EXHAUSTED.inc(),
        PipelineEvent::LoopError { .. } => LOOP_ERRORS.inc(),
        _ => {}
    }
}

/// Subscribe the metrics recorder to every event on `bus`.
pub fn attach(bus: &EventBus) -> SubscriptionId {
    bus.subscribe("*", |event| {
        record_event(event);
        Ok(())
    })
}

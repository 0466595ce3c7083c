//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the conveyor server:
//! - HTTP request metrics (latency, counts)
//! - WebSocket connection metrics
//! - Item counts and orchestrator status (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use tracing::error;

use conveyor_core::{ItemStatus, SettingKey};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "conveyor_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("conveyor_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "conveyor_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

/// Active WebSocket connections.
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "conveyor_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .unwrap()
});

/// Total WebSocket connections (cumulative).
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "conveyor_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .unwrap()
});

/// WebSocket messages sent by type.
pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("conveyor_ws_messages_sent_total", "WebSocket messages sent"),
        &["type"],
    )
    .unwrap()
});

/// WebSocket lag events (when client falls behind).
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "conveyor_ws_lag_events_total",
        "WebSocket lag events (client fell behind)",
    )
    .unwrap()
});

// =============================================================================
// Item Metrics (collected dynamically)
// =============================================================================

/// Items by current status.
pub static ITEMS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("conveyor_items_by_status", "Current item count by status"),
        &["status"],
    )
    .unwrap()
});

/// Productions completed today.
pub static COMPLETED_TODAY: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "conveyor_completed_today",
        "Items published since UTC midnight",
    )
    .unwrap()
});

/// Configured daily run limit.
pub static DAILY_RUN_LIMIT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("conveyor_daily_run_limit", "Current daily run limit setting").unwrap()
});

// =============================================================================
// Orchestrator Metrics (collected dynamically)
// =============================================================================

/// Orchestrator running state (1 = running, 0 = stopped).
pub static ORCHESTRATOR_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "conveyor_orchestrator_running",
        "Whether the orchestrator is running (1) or stopped (0)",
    )
    .unwrap()
});

/// Items currently in production.
pub static ORCHESTRATOR_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "conveyor_orchestrator_in_flight",
        "Number of items currently in production",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // HTTP
        Box::new(HTTP_REQUEST_DURATION.clone()),
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()),
        // WebSocket
        Box::new(WS_CONNECTIONS_ACTIVE.clone()),
        Box::new(WS_CONNECTIONS_TOTAL.clone()),
        Box::new(WS_MESSAGES_SENT.clone()),
        Box::new(WS_LAG_EVENTS.clone()),
        // Items
        Box::new(ITEMS_BY_STATUS.clone()),
        Box::new(COMPLETED_TODAY.clone()),
        Box::new(DAILY_RUN_LIMIT.clone()),
        // Orchestrator
        Box::new(ORCHESTRATOR_RUNNING.clone()),
        Box::new(ORCHESTRATOR_IN_FLIGHT.clone()),
    ];

    // Core metrics (items, stages, governor, budget)
    for metric in collectors
        .into_iter()
        .chain(conveyor_core::metrics::all_metrics())
    {
        if let Err(e) = registry.register(metric) {
            error!("Failed to register metric: {}", e);
        }
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// This is called before encoding metrics to update gauges with current values
/// from the store and the orchestrator.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    if let Some(orchestrator) = state.orchestrator() {
        let status = orchestrator.status().await;
        ORCHESTRATOR_RUNNING.set(if status.running { 1 } else { 0 });
        ORCHESTRATOR_IN_FLIGHT.set(status.in_flight as i64);
    }

    let store = state.store();
    if let Ok(counts) = store.status_counts() {
        for status in ItemStatus::ALL {
            ITEMS_BY_STATUS
                .with_label_values(&[status.as_str()])
                .set(counts.get(status) as i64);
        }
    }
    if let Ok(completed) = store.count_completed_today() {
        COMPLETED_TODAY.set(completed as i64);
    }
    if let Ok(Some(limit)) = store.get_setting(SettingKey::DailyRunLimit.as_str()) {
        if let Ok(limit) = limit.parse::<i64>() {
            DAILY_RUN_LIMIT.set(limit);
        }
    }
}

/// Normalize a path for metric labels (replace IDs and item names with placeholders).
pub fn normalize_path(path: &str) -> String {
    let uuid_regex = regex_lite::Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    );
    let result = match uuid_regex {
        Ok(re) => re.replace_all(path, "{id}").into_owned(),
        Err(_) => path.to_string(),
    };

    // Item names are free text; keep only the route shape
    let segments: Vec<&str> = result.split('/').collect();
    match segments.as_slice() {
        ["", "api", "v1", "items", name, rest @ ..]
            if !name.is_empty()
                && *name != "{id}"
                && *name != "counts"
                && *name != "reset-failed" =>
        {
            let mut normalized = String::from("/api/v1/items/{name}");
            for segment in rest {
                normalized.push('/');
                normalized.push_str(segment);
            }
            normalized
        }
        _ => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/items/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/v1/items/{id}");
    }

    #[test]
    fn test_normalize_path_item_name() {
        assert_eq!(
            normalize_path("/api/v1/items/Acme%20Widget/ready"),
            "/api/v1/items/{name}/ready"
        );
    }

    #[test]
    fn test_normalize_path_static_routes() {
        assert_eq!(normalize_path("/api/v1/items/counts"), "/api/v1/items/counts");
        assert_eq!(
            normalize_path("/api/v1/items/reset-failed"),
            "/api/v1/items/reset-failed"
        );
        assert_eq!(normalize_path("/api/v1/health"), "/api/v1/health");
    }

    #[test]
    fn test_encode_includes_core_metrics() {
        conveyor_core::metrics::ITEMS_PUBLISHED.inc();
        let text = encode_metrics();
        assert!(text.contains("conveyor_items_published_total"));
    }
}

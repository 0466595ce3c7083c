//! Orchestrator lifecycle integration tests.
//!
//! These tests drive items through the real orchestrator against a SQLite file:
//! pending -> ready -> published, pending -> ready -> pending -> ... -> failed

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use conveyor_core::{
    diagnostics::ErrorFilter,
    governor::StaticSampler,
    settings::update_setting,
    stages::{CollaboratorError, Stage},
    testing::{fixtures, FakeClock, MockCollaborators},
    Clock, Collaborators, DiscoveredItem, ErrorLog, EventBus, ItemFilter, ItemStatus, ItemStore,
    LoadSample, OrchestratorConfig, PipelineEvent, PipelineOrchestrator, ResourceGovernor,
    SqliteErrorLog, SqliteItemStore, StageExecutor, StageExecutorConfig, TickOutcome,
};

/// Test helper to create all dependencies for orchestrator testing.
struct TestHarness {
    store: Arc<SqliteItemStore>,
    errors: Arc<SqliteErrorLog>,
    mock: Arc<MockCollaborators>,
    sampler: Arc<StaticSampler>,
    clock: FakeClock,
    bus: EventBus,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let busy = Duration::from_millis(2000);

        // Midday so advancing a few hours never crosses midnight by accident
        let clock = FakeClock::at(Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap());

        let store = Arc::new(
            SqliteItemStore::new(&db_path, busy)
                .expect("Failed to create item store")
                .with_clock(Arc::new(clock.clone())),
        );
        let errors = Arc::new(
            SqliteErrorLog::new(&db_path, busy)
                .expect("Failed to create error log")
                .with_clock(Arc::new(clock.clone())),
        );

        Self {
            store,
            errors,
            mock: Arc::new(MockCollaborators::new()),
            sampler: Arc::new(StaticSampler::new(20.0, 30.0)),
            clock,
            bus: EventBus::new(),
            _temp_dir: temp_dir,
        }
    }

    fn orchestrator(&self, config: OrchestratorConfig) -> PipelineOrchestrator {
        let executor = StageExecutor::new(
            Collaborators::from_single(Arc::clone(&self.mock)),
            StageExecutorConfig {
                stage_timeout: Duration::from_secs(5),
                tracking_base_url: Some("https://blog.example".to_string()),
            },
        );

        PipelineOrchestrator::new(
            config,
            self.store.clone(),
            self.errors.clone(),
            ResourceGovernor::new(self.sampler.clone()),
            executor,
            self.bus.clone(),
        )
    }

    fn discover(&self, name: &str) {
        self.store
            .insert_discovered(&DiscoveredItem::new(name, "General", ""))
            .unwrap();
    }

    fn status(&self, name: &str) -> ItemStatus {
        self.store.get_by_name(name).unwrap().unwrap().status
    }

    /// Record every event name published on the bus.
    fn record_events(&self) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        self.bus.subscribe("*", move |event: &PipelineEvent| {
            sink.lock().unwrap().push(event.name().to_string());
            Ok(())
        });
        seen
    }
}

/// Config with short sleeps so the real loop makes progress quickly.
fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        stopped_poll_ms: 20,
        pause_poll_ms: 20,
        budget_sleep_ms: 20,
        item_delay_ms: 0,
        throttled_item_delay_ms: 0,
        discovery_sleep_ms: 20,
        awaiting_links_sleep_ms: 20,
        misconfigured_sleep_ms: 20,
        busy_poll_ms: 10,
        backoff_initial_ms: 20,
        backoff_max_ms: 100,
        ..Default::default()
    }
}

/// Poll until `check` holds or the timeout elapses.
async fn wait_for<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[tokio::test]
async fn test_discovering_same_name_twice_keeps_one_row() {
    let h = TestHarness::new();
    let orchestrator = h.orchestrator(fast_config());

    h.mock
        .set_discovery_results(fixtures::candidates(&["Widget"]))
        .await;
    assert_eq!(
        orchestrator.tick().await.unwrap(),
        TickOutcome::Discovered { count: 1 }
    );

    // Same candidate again: the pending row blocks a second discovery run,
    // so insert through the store directly as a second discovery would.
    assert!(h
        .store
        .insert_discovered(&DiscoveredItem::new("Widget", "General", ""))
        .unwrap()
        .is_none());

    let items = h.store.list(&ItemFilter::new()).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Widget");
    assert_eq!(items[0].status, ItemStatus::Pending);
}

#[tokio::test]
async fn test_ready_item_is_published_with_run_log() {
    let h = TestHarness::new();
    let orchestrator = h.orchestrator(fast_config());
    let events = h.record_events();

    h.discover("Widget");
    h.store.mark_ready("Widget", "https://x").unwrap();

    let outcome = orchestrator.tick().await.unwrap();
    assert!(matches!(outcome, TickOutcome::Dispatched { .. }));
    orchestrator.wait_idle().await;

    let item = h.store.get_by_name("Widget").unwrap().unwrap();
    assert_eq!(item.status, ItemStatus::Published);
    assert_eq!(item.fail_count, 0);
    assert_eq!(item.artifacts.publish_ref.as_deref(), Some("post-1"));

    let log = h.store.run_log(h.clock.today()).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].item_name, "Widget");

    // Every stage ran in order, and the tracking link wraps the destination
    assert_eq!(
        h.mock.stage_calls().await,
        vec![
            Stage::Enrich,
            Stage::GenerateContent,
            Stage::GenerateMedia,
            Stage::Publish
        ]
    );
    let published = h.mock.published().await;
    assert!(published[0]
        .tracking_link
        .starts_with("https://blog.example/?track=Widget&dest="));

    let events = events.lock().unwrap().clone();
    assert!(events.contains(&"item.claimed".to_string()));
    assert!(events.contains(&"item.published".to_string()));
}

#[tokio::test]
async fn test_retry_ceiling_marks_item_failed() {
    let h = TestHarness::new();
    let orchestrator = h.orchestrator(fast_config());

    h.mock
        .fail_stage(
            Stage::Publish,
            CollaboratorError::Rejected {
                status: 500,
                message: "upstream down".to_string(),
            },
        )
        .await;

    h.discover("Widget");
    h.store.mark_ready("Widget", "https://x").unwrap();

    for attempt in 1..=3u32 {
        let outcome = orchestrator.tick().await.unwrap();
        assert!(matches!(outcome, TickOutcome::Dispatched { .. }));
        orchestrator.wait_idle().await;

        let item = h.store.get_by_name("Widget").unwrap().unwrap();
        assert_eq!(item.fail_count, attempt);
        if attempt < 3 {
            assert_eq!(item.status, ItemStatus::Pending);
            // The link survives; the operator re-enters the item explicitly
            h.store.requeue("Widget").unwrap();
        } else {
            assert_eq!(item.status, ItemStatus::Failed);
        }
    }

    assert!(h.store.run_log(h.clock.today()).unwrap().is_empty());
    assert_eq!(h.store.count_completed_today().unwrap(), 0);

    let entries = h
        .errors
        .recent(&ErrorFilter::new().with_item("Widget"))
        .unwrap();
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e.stage == "publish"));

    // Failed is terminal for the loop: nothing to claim, nothing pending
    assert!(h.store.next_ready_item().unwrap().is_none());
}

#[tokio::test]
async fn test_daily_limit_defers_second_item_to_next_day() {
    let h = TestHarness::new();
    let orchestrator = h.orchestrator(fast_config());
    update_setting(h.store.as_ref(), "daily_run_limit", "1").unwrap();

    h.discover("Widget");
    h.discover("Gadget");
    h.store.mark_ready("Widget", "https://x").unwrap();
    h.store.mark_ready("Gadget", "https://y").unwrap();

    orchestrator.tick().await.unwrap();
    orchestrator.wait_idle().await;
    assert_eq!(h.status("Widget"), ItemStatus::Published);

    // Same day: the second item is not started, however often we tick
    for _ in 0..3 {
        assert_eq!(
            orchestrator.tick().await.unwrap(),
            TickOutcome::BudgetExhausted
        );
    }
    assert_eq!(h.status("Gadget"), ItemStatus::Ready);

    // Next calendar day the budget is fresh
    h.clock.advance_to_next_day();
    let outcome = orchestrator.tick().await.unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Dispatched {
            item: "Gadget".to_string(),
            throttled: false
        }
    );
    orchestrator.wait_idle().await;
    assert_eq!(h.status("Gadget"), ItemStatus::Published);
}

#[tokio::test]
async fn test_raising_limit_resumes_same_day() {
    let h = TestHarness::new();
    let orchestrator = h.orchestrator(fast_config());
    update_setting(h.store.as_ref(), "daily_run_limit", "1").unwrap();

    h.discover("Widget");
    h.discover("Gadget");
    h.store.mark_ready("Widget", "https://x").unwrap();
    h.store.mark_ready("Gadget", "https://y").unwrap();

    orchestrator.tick().await.unwrap();
    orchestrator.wait_idle().await;
    assert_eq!(
        orchestrator.tick().await.unwrap(),
        TickOutcome::BudgetExhausted
    );

    update_setting(h.store.as_ref(), "daily_run_limit", "2").unwrap();
    assert!(matches!(
        orchestrator.tick().await.unwrap(),
        TickOutcome::Dispatched { .. }
    ));
    orchestrator.wait_idle().await;
    assert_eq!(h.status("Gadget"), ItemStatus::Published);
}

#[tokio::test]
async fn test_pause_keeps_item_ready_across_ticks() {
    let h = TestHarness::new();
    let orchestrator = h.orchestrator(fast_config());
    update_setting(h.store.as_ref(), "pause_cpu", "90").unwrap();
    h.sampler.set(Some(LoadSample::new(95.0, 30.0)));

    h.discover("Widget");
    h.store.mark_ready("Widget", "https://x").unwrap();

    for _ in 0..5 {
        assert_eq!(orchestrator.tick().await.unwrap(), TickOutcome::Paused);
    }

    let item = h.store.get_by_name("Widget").unwrap().unwrap();
    assert_eq!(item.status, ItemStatus::Ready);
    assert_eq!(item.fail_count, 0);
    assert!(item.claimed_at.is_none());
    assert!(h.mock.stage_calls().await.is_empty());

    // Load drops: the same item is picked up
    h.sampler.set(Some(LoadSample::new(40.0, 30.0)));
    assert!(matches!(
        orchestrator.tick().await.unwrap(),
        TickOutcome::Dispatched { .. }
    ));
    orchestrator.wait_idle().await;
    assert_eq!(h.status("Widget"), ItemStatus::Published);
}

#[tokio::test]
async fn test_items_processed_in_ready_order() {
    let h = TestHarness::new();
    let orchestrator = h.orchestrator(fast_config());

    for name in ["Alpha", "Beta", "Gamma"] {
        h.discover(name);
    }
    h.store.mark_ready("Gamma", "https://g").unwrap();
    h.store.mark_ready("Alpha", "https://a").unwrap();
    h.store.mark_ready("Beta", "https://b").unwrap();

    let mut order = Vec::new();
    for _ in 0..3 {
        if let TickOutcome::Dispatched { item, .. } = orchestrator.tick().await.unwrap() {
            order.push(item);
        }
        orchestrator.wait_idle().await;
    }
    assert_eq!(order, vec!["Gamma", "Alpha", "Beta"]);
}

#[tokio::test]
async fn test_running_loop_publishes_and_stops() {
    let h = TestHarness::new();
    let orchestrator = h.orchestrator(fast_config());

    h.discover("Widget");
    h.store.mark_ready("Widget", "https://x").unwrap();

    orchestrator.start().await.unwrap();
    let store = h.store.clone();
    let published = wait_for(Duration::from_secs(5), || {
        store
            .get_by_name("Widget")
            .ok()
            .flatten()
            .map(|i| i.status == ItemStatus::Published)
            .unwrap_or(false)
    })
    .await;
    assert!(published);

    orchestrator.stop().await.unwrap();
    let status = orchestrator.status().await;
    assert!(!status.running);
    assert_eq!(status.in_flight, 0);
    assert_eq!(status.counts.published, 1);
}

#[tokio::test]
async fn test_loop_survives_discovery_errors() {
    let h = TestHarness::new();
    let orchestrator = h.orchestrator(fast_config());
    h.mock
        .set_discovery_error(Some(CollaboratorError::Network(
            "connection refused".to_string(),
        )))
        .await;

    orchestrator.start().await.unwrap();
    let errors = h.errors.clone();
    let logged = wait_for(Duration::from_secs(5), || {
        errors.stats().map(|s| s.total >= 2).unwrap_or(false)
    })
    .await;
    assert!(logged);
    assert!(orchestrator.is_running());

    // Recovery: discovery works again and the loop carries on
    h.mock.set_discovery_error(None).await;
    h.mock
        .set_discovery_results(fixtures::candidates(&["Widget"]))
        .await;
    let store = h.store.clone();
    let discovered = wait_for(Duration::from_secs(5), || {
        store.get_by_name("Widget").ok().flatten().is_some()
    })
    .await;
    assert!(discovered);

    orchestrator.stop().await.unwrap();
}

#[tokio::test]
async fn test_stopped_system_lets_operator_restart() {
    let h = TestHarness::new();
    let orchestrator = h.orchestrator(fast_config());
    update_setting(h.store.as_ref(), "system_status", "STOPPED").unwrap();

    h.discover("Widget");
    h.store.mark_ready("Widget", "https://x").unwrap();

    orchestrator.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.status("Widget"), ItemStatus::Ready);

    update_setting(h.store.as_ref(), "system_status", "RUNNING").unwrap();
    orchestrator.wake();
    let store = h.store.clone();
    let published = wait_for(Duration::from_secs(5), || {
        store
            .get_by_name("Widget")
            .ok()
            .flatten()
            .map(|i| i.status == ItemStatus::Published)
            .unwrap_or(false)
    })
    .await;
    assert!(published);

    orchestrator.stop().await.unwrap();
}

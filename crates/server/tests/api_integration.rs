//! Operator API tests against real SQLite stores and mock collaborators.

mod common;

use axum::http::StatusCode;
use common::TestFixture;
use conveyor_core::{
    stages::{CollaboratorError, Stage},
    TickOutcome,
};
use serde_json::json;

/// Insert an item and give it a link through the API.
async fn ready_item(fixture: &TestFixture, name: &str, link: &str) {
    let created = fixture.post("/api/v1/items", json!({ "name": name })).await;
    assert_status!(created, StatusCode::CREATED);

    let ready = fixture
        .post(
            &format!("/api/v1/items/{}/ready", name),
            json!({ "link": link }),
        )
        .await;
    assert_status!(ready, StatusCode::OK);
}

/// One production attempt, start to finish.
async fn produce_once(fixture: &TestFixture) {
    let outcome = fixture.orchestrator.tick().await.unwrap();
    assert!(
        matches!(outcome, TickOutcome::Dispatched { .. }),
        "expected a dispatch, got {:?}",
        outcome
    );
    fixture.orchestrator.wait_idle().await;
}

// ============================================================================
// Health and config
// ============================================================================

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/health").await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "status", json!("ok"));
}

#[tokio::test]
async fn test_config_is_sanitized() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/config").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["collaborators"]["api_key_configured"], false);
    assert!(response.body["collaborators"].get("api_key").is_none());
    assert_eq!(response.body["orchestrator"]["max_retries"], 3);
}

// ============================================================================
// Items
// ============================================================================

#[tokio::test]
async fn test_manual_insert_is_idempotent() {
    let fixture = TestFixture::new();

    let first = fixture
        .post(
            "/api/v1/items",
            json!({ "name": "  Blue Kettle ", "category": "Kitchen" }),
        )
        .await;
    assert_status!(first, StatusCode::CREATED);
    assert_json_path!(first.body, "name", json!("Blue Kettle"));
    assert_json_path!(first.body, "status", json!("Pending"));
    assert_json_path!(first.body, "category", json!("Kitchen"));

    let second = fixture
        .post("/api/v1/items", json!({ "name": "Blue Kettle" }))
        .await;
    assert_status!(second, StatusCode::OK);
    assert_eq!(second.body["id"], first.body["id"]);

    let list = fixture.get("/api/v1/items").await;
    assert_json_path!(list.body, "total", json!(1));
}

#[tokio::test]
async fn test_manual_insert_defaults_category() {
    let fixture = TestFixture::new();

    let response = fixture.post("/api/v1/items", json!({ "name": "Widget" })).await;

    assert_status!(response, StatusCode::CREATED);
    assert_json_path!(response.body, "category", json!("General"));
}

#[tokio::test]
async fn test_manual_insert_rejects_blank_name() {
    let fixture = TestFixture::new();

    let response = fixture.post("/api/v1/items", json!({ "name": "   " })).await;

    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body["error"].is_string());
}

#[tokio::test]
async fn test_get_item_by_id_and_name() {
    let fixture = TestFixture::new();
    let created = fixture.post("/api/v1/items", json!({ "name": "Widget" })).await;
    let id = created.body["id"].as_str().unwrap().to_string();

    let by_id = fixture.get(&format!("/api/v1/items/{}", id)).await;
    assert_status!(by_id, StatusCode::OK);
    assert_json_path!(by_id.body, "name", json!("Widget"));

    let by_name = fixture.get("/api/v1/items/Widget").await;
    assert_status!(by_name, StatusCode::OK);
    assert_json_path!(by_name.body, "id", json!(id));

    let missing = fixture.get("/api/v1/items/Nothing").await;
    assert_status!(missing, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_filters_by_status() {
    let fixture = TestFixture::new();
    ready_item(&fixture, "Alpha", "https://shop.example/a").await;
    fixture.post("/api/v1/items", json!({ "name": "Beta" })).await;

    let ready = fixture.get("/api/v1/items?status=ready").await;
    assert_status!(ready, StatusCode::OK);
    assert_json_path!(ready.body, "total", json!(1));
    assert_eq!(ready.body["items"][0]["name"], "Alpha");

    let pending = fixture.get("/api/v1/items?status=Pending").await;
    assert_json_path!(pending.body, "total", json!(1));
    assert_eq!(pending.body["items"][0]["name"], "Beta");

    let bad = fixture.get("/api/v1/items?status=archived").await;
    assert_status!(bad, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_mark_ready_errors() {
    let fixture = TestFixture::new();
    fixture.post("/api/v1/items", json!({ "name": "Widget" })).await;

    let unknown = fixture
        .post("/api/v1/items/Nothing/ready", json!({ "link": "https://x" }))
        .await;
    assert_status!(unknown, StatusCode::NOT_FOUND);

    let blank = fixture
        .post("/api/v1/items/Widget/ready", json!({ "link": "  " }))
        .await;
    assert_status!(blank, StatusCode::UNPROCESSABLE_ENTITY);

    let ok = fixture
        .post(
            "/api/v1/items/Widget/ready",
            json!({ "link": "https://shop.example/widget" }),
        )
        .await;
    assert_status!(ok, StatusCode::OK);
    assert_json_path!(ok.body, "status", json!("Ready"));
    assert_json_path!(
        ok.body,
        "destination_link",
        json!("https://shop.example/widget")
    );

    let again = fixture
        .post("/api/v1/items/Widget/ready", json!({ "link": "https://y" }))
        .await;
    assert_status!(again, StatusCode::CONFLICT);

    // Status is checked before the link
    let blank_again = fixture
        .post("/api/v1/items/Widget/ready", json!({ "link": "" }))
        .await;
    assert_status!(blank_again, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_ready_item_is_produced_and_counted() {
    let fixture = TestFixture::new();
    ready_item(&fixture, "Widget", "https://shop.example/widget").await;

    produce_once(&fixture).await;

    let item = fixture.get("/api/v1/items/Widget").await;
    assert_json_path!(item.body, "status", json!("Published"));
    assert_json_path!(item.body, "claimed", json!(false));
    assert!(item.body["artifacts"]["publish_ref"].is_string());

    let counts = fixture.get("/api/v1/items/counts").await;
    assert_status!(counts, StatusCode::OK);
    assert_json_path!(counts.body, "published", json!(1));
    assert_json_path!(counts.body, "completed_today", json!(1));
    assert_json_path!(counts.body, "daily_run_limit", json!(10));
    assert_json_path!(counts.body, "total", json!(1));
}

#[tokio::test]
async fn test_failure_requeue_and_reset_flow() {
    let fixture = TestFixture::new();
    fixture
        .mock
        .fail_stage(Stage::Publish, CollaboratorError::Network("down".to_string()))
        .await;
    ready_item(&fixture, "Widget", "https://shop.example/widget").await;

    // First failure: back to Pending with the link kept
    produce_once(&fixture).await;
    let item = fixture.get("/api/v1/items/Widget").await;
    assert_json_path!(item.body, "status", json!("Pending"));
    assert_json_path!(item.body, "fail_count", json!(1));
    assert_json_path!(
        item.body,
        "destination_link",
        json!("https://shop.example/widget")
    );
    assert!(item.body["last_error"]
        .as_str()
        .unwrap()
        .starts_with("publish"));

    // Two more attempts reach the retry ceiling
    for _ in 0..2 {
        let requeued = fixture.post_empty("/api/v1/items/Widget/requeue").await;
        assert_status!(requeued, StatusCode::OK);
        assert_json_path!(requeued.body, "status", json!("Ready"));
        produce_once(&fixture).await;
    }

    let item = fixture.get("/api/v1/items/Widget").await;
    assert_json_path!(item.body, "status", json!("Failed"));
    assert_json_path!(item.body, "fail_count", json!(3));

    let requeue_failed = fixture.post_empty("/api/v1/items/Widget/requeue").await;
    assert_status!(requeue_failed, StatusCode::CONFLICT);

    let reset = fixture.post_empty("/api/v1/items/Widget/reset").await;
    assert_status!(reset, StatusCode::OK);
    assert_json_path!(reset.body, "status", json!("Pending"));
    assert_json_path!(reset.body, "fail_count", json!(0));

    let reset_again = fixture.post_empty("/api/v1/items/Widget/reset").await;
    assert_status!(reset_again, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_requeue_without_link_is_rejected() {
    let fixture = TestFixture::new();
    fixture.post("/api/v1/items", json!({ "name": "Widget" })).await;

    let response = fixture.post_empty("/api/v1/items/Widget/requeue").await;

    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_bulk_reset_failed() {
    let fixture = TestFixture::new();
    fixture
        .mock
        .fail_stage(Stage::Enrich, CollaboratorError::Network("down".to_string()))
        .await;

    for name in ["Alpha", "Beta"] {
        ready_item(&fixture, name, "https://shop.example/x").await;
        produce_once(&fixture).await;
        for _ in 0..2 {
            fixture
                .post_empty(&format!("/api/v1/items/{}/requeue", name))
                .await;
            produce_once(&fixture).await;
        }
    }

    let counts = fixture.get("/api/v1/items/counts").await;
    assert_json_path!(counts.body, "failed", json!(2));

    let response = fixture.post_empty("/api/v1/items/reset-failed").await;
    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "reset", json!(2));

    let counts = fixture.get("/api/v1/items/counts").await;
    assert_json_path!(counts.body, "failed", json!(0));
    assert_json_path!(counts.body, "pending", json!(2));
}

// ============================================================================
// Settings
// ============================================================================

#[tokio::test]
async fn test_settings_defaults_and_update() {
    let fixture = TestFixture::new();

    let settings = fixture.get("/api/v1/settings").await;
    assert_status!(settings, StatusCode::OK);
    assert_eq!(settings.body["settings"]["system_status"], "RUNNING");
    assert_eq!(settings.body["settings"]["daily_run_limit"], "10");
    assert_eq!(settings.body["settings"]["pause_cpu"], "90");

    let updated = fixture
        .put("/api/v1/settings/daily_run_limit", json!({ "value": " 5 " }))
        .await;
    assert_status!(updated, StatusCode::OK);
    assert_json_path!(updated.body, "value", json!("5"));

    let settings = fixture.get("/api/v1/settings").await;
    assert_eq!(settings.body["settings"]["daily_run_limit"], "5");
}

#[tokio::test]
async fn test_settings_validation() {
    let fixture = TestFixture::new();

    let not_a_number = fixture
        .put("/api/v1/settings/daily_run_limit", json!({ "value": "lots" }))
        .await;
    assert_status!(not_a_number, StatusCode::UNPROCESSABLE_ENTITY);

    let out_of_range = fixture
        .put("/api/v1/settings/pause_cpu", json!({ "value": "140" }))
        .await;
    assert_status!(out_of_range, StatusCode::UNPROCESSABLE_ENTITY);

    let throttle_above_pause = fixture
        .put("/api/v1/settings/throttle_cpu", json!({ "value": "95" }))
        .await;
    assert_status!(throttle_above_pause, StatusCode::UNPROCESSABLE_ENTITY);

    let unknown = fixture
        .put("/api/v1/settings/turbo_mode", json!({ "value": "on" }))
        .await;
    assert_status!(unknown, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_system_stop_and_start() {
    let fixture = TestFixture::new();
    ready_item(&fixture, "Widget", "https://shop.example/widget").await;

    let stopped = fixture.post_empty("/api/v1/system/stop").await;
    assert_status!(stopped, StatusCode::OK);
    assert_json_path!(stopped.body, "value", json!("STOPPED"));
    assert_eq!(
        fixture.orchestrator.tick().await.unwrap(),
        TickOutcome::Stopped
    );

    let started = fixture.post_empty("/api/v1/system/start").await;
    assert_json_path!(started.body, "value", json!("RUNNING"));
    produce_once(&fixture).await;

    let item = fixture.get("/api/v1/items/Widget").await;
    assert_json_path!(item.body, "status", json!("Published"));
}

#[tokio::test]
async fn test_zero_daily_limit_blocks_production() {
    let fixture = TestFixture::new();
    ready_item(&fixture, "Widget", "https://shop.example/widget").await;
    fixture
        .put("/api/v1/settings/daily_run_limit", json!({ "value": "0" }))
        .await;

    assert_eq!(
        fixture.orchestrator.tick().await.unwrap(),
        TickOutcome::BudgetExhausted
    );

    let item = fixture.get("/api/v1/items/Widget").await;
    assert_json_path!(item.body, "status", json!("Ready"));
}

// ============================================================================
// Errors and orchestrator status
// ============================================================================

#[tokio::test]
async fn test_error_log_endpoints() {
    let fixture = TestFixture::new();
    fixture
        .mock
        .fail_stage(
            Stage::GenerateContent,
            CollaboratorError::Rejected {
                status: 429,
                message: "slow down".to_string(),
            },
        )
        .await;
    ready_item(&fixture, "Widget", "https://shop.example/widget").await;
    produce_once(&fixture).await;

    let errors = fixture.get("/api/v1/errors?item=Widget").await;
    assert_status!(errors, StatusCode::OK);
    assert_json_path!(errors.body, "count", json!(1));
    assert_eq!(errors.body["errors"][0]["stage"], "generate_content");
    assert!(errors.body["errors"][0]["message"]
        .as_str()
        .unwrap()
        .contains("slow down"));

    let by_stage = fixture.get("/api/v1/errors?stage=publish").await;
    assert_json_path!(by_stage.body, "count", json!(0));

    let stats = fixture.get("/api/v1/errors/stats").await;
    assert_status!(stats, StatusCode::OK);
    assert_json_path!(stats.body, "total", json!(1));
    assert_json_path!(stats.body, "today", json!(1));
    assert!(stats.body["last_error_at"].is_string());
}

#[tokio::test]
async fn test_orchestrator_status() {
    let fixture = TestFixture::new();
    fixture.post("/api/v1/items", json!({ "name": "Widget" })).await;

    let response = fixture.get("/api/v1/orchestrator/status").await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "available", json!(true));
    assert_json_path!(response.body, "running", json!(false));
    assert_json_path!(response.body, "in_flight", json!(0));
    assert_json_path!(response.body, "max_workers", json!(1));
    assert_eq!(response.body["counts"]["pending"], 1);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new();
    fixture.get("/api/v1/health").await;

    let (status, text) = fixture.get_text("/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("conveyor_http_requests_total"));
    assert!(text.contains("conveyor_items_by_status"));
    assert!(text.contains("conveyor_orchestrator_running"));
}

//! Runtime settings and the global run switch.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use conveyor_core::settings::update_setting;
use conveyor_core::{PipelineEvent, SettingKey, SettingsError, SystemStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::handlers::{item_error, ApiError, ErrorResponse};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UpdateSettingBody {
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    /// Every known key, with defaults filled in for absent ones
    pub settings: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct SettingResponse {
    pub key: String,
    pub value: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn get_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let mut settings: BTreeMap<String, String> = SettingKey::ALL
        .iter()
        .map(|k| (k.as_str().to_string(), k.default_value().to_string()))
        .collect();

    let stored = state.store().all_settings().map_err(item_error)?;
    for (key, value) in stored {
        if settings.contains_key(&key) {
            settings.insert(key, value);
        }
    }

    Ok(Json(SettingsResponse { settings }))
}

pub async fn put_setting(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(body): Json<UpdateSettingBody>,
) -> Result<Json<SettingResponse>, ApiError> {
    apply(&state, &key, &body.value).map(Json)
}

/// Set `system_status` to RUNNING
pub async fn start_system(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SettingResponse>, ApiError> {
    apply(
        &state,
        SettingKey::SystemStatus.as_str(),
        SystemStatus::Running.as_str(),
    )
    .map(Json)
}

/// Set `system_status` to STOPPED. In-flight productions run to completion.
pub async fn stop_system(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SettingResponse>, ApiError> {
    apply(
        &state,
        SettingKey::SystemStatus.as_str(),
        SystemStatus::Stopped.as_str(),
    )
    .map(Json)
}

fn apply(state: &AppState, key: &str, value: &str) -> Result<SettingResponse, ApiError> {
    let stored = update_setting(state.store(), key, value).map_err(settings_error)?;

    info!("Setting {} changed to {}", key, stored);
    state.bus().publish(&PipelineEvent::SettingsChanged {
        key: key.to_string(),
        value: stored.clone(),
    });
    state.wake_orchestrator();

    Ok(SettingResponse {
        key: key.to_string(),
        value: stored,
    })
}

fn settings_error(e: SettingsError) -> ApiError {
    match e {
        SettingsError::UnknownKey(_) => (StatusCode::NOT_FOUND, Json(ErrorResponse::new(e))),
        SettingsError::Invalid { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse::new(e)),
        ),
        SettingsError::Store(e) => item_error(e),
    }
}

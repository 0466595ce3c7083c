//! Orchestrator API handlers.

use axum::{extract::State, Json};
use conveyor_core::OrchestratorStatus;
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

/// Orchestrator status response
#[derive(Debug, Serialize)]
pub struct OrchestratorStatusResponse {
    /// Whether an orchestrator was created for this process
    pub available: bool,
    #[serde(flatten)]
    pub status: OrchestratorStatus,
}

/// Get orchestrator status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<OrchestratorStatusResponse> {
    match state.orchestrator() {
        Some(orch) => Json(OrchestratorStatusResponse {
            available: true,
            status: orch.status().await,
        }),
        None => Json(OrchestratorStatusResponse {
            available: false,
            status: OrchestratorStatus::default(),
        }),
    }
}

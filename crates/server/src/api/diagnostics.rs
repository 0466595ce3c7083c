//! Error log API handlers.

use axum::{
    extract::{Query, State},
    Json,
};
use conveyor_core::{ErrorEntry, ErrorFilter, ErrorStats};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::handlers::{internal_error, ApiError};
use crate::state::AppState;

/// Maximum allowed limit for error queries
const MAX_LIMIT: i64 = 500;

/// Default limit for error queries
const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct ErrorsParams {
    pub limit: Option<i64>,
    /// Filter by item name (`SYSTEM` for loop-level errors)
    pub item: Option<String>,
    pub stage: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorsResponse {
    pub errors: Vec<ErrorEntry>,
    pub count: usize,
}

/// Most recent error log entries first
pub async fn list_errors(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ErrorsParams>,
) -> Result<Json<ErrorsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let mut filter = ErrorFilter::new().with_limit(limit);
    if let Some(item) = params.item {
        filter = filter.with_item(item);
    }
    if let Some(stage) = params.stage {
        filter = filter.with_stage(stage);
    }

    let errors = state.errors().recent(&filter).map_err(internal_error)?;
    Ok(Json(ErrorsResponse {
        count: errors.len(),
        errors,
    }))
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<ErrorStats>, ApiError> {
    state.errors().stats().map(Json).map_err(internal_error)
}

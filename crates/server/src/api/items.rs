//! Item API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use conveyor_core::{
    Artifacts, DiscoveredItem, Item, ItemFilter, ItemStatus, PipelineEvent, RuntimeSettings,
    StatusCounts,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::handlers::{internal_error, item_error, ApiError, ErrorResponse};
use crate::state::AppState;

/// Maximum allowed limit for item queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for item queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing items
#[derive(Debug, Deserialize)]
pub struct ListItemsParams {
    /// Filter by status (`pending`, `ready`, `published`, `failed`)
    pub status: Option<String>,
    /// Filter by category
    pub category: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Request body for a manual insert
#[derive(Debug, Deserialize)]
pub struct CreateItemBody {
    pub name: String,
    pub category: Option<String>,
    pub source_url: Option<String>,
}

/// Request body for supplying a destination link
#[derive(Debug, Deserialize)]
pub struct MarkReadyBody {
    pub link: String,
}

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub id: String,
    pub name: String,
    pub category: String,
    pub source_url: String,
    pub destination_link: Option<String>,
    pub status: ItemStatus,
    pub fail_count: u32,
    pub artifacts: Artifacts,
    pub last_error: Option<String>,
    pub claimed: bool,
    pub ready_at: Option<String>,
    pub created_at: String,
    pub last_update: String,
}

impl From<Item> for ItemResponse {
    fn from(item: Item) -> Self {
        Self {
            claimed: item.is_claimed(),
            id: item.id,
            name: item.name,
            category: item.category,
            source_url: item.source_url,
            destination_link: item.destination_link,
            status: item.status,
            fail_count: item.fail_count,
            artifacts: item.artifacts,
            last_error: item.last_error,
            ready_at: item.ready_at.map(|t| t.to_rfc3339()),
            created_at: item.created_at.to_rfc3339(),
            last_update: item.last_update.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListItemsResponse {
    pub items: Vec<ItemResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct ItemCountsResponse {
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub total: u64,
    pub completed_today: u32,
    /// `None` when the stored limit does not parse
    pub daily_run_limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ResetFailedResponse {
    pub reset: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// List items in discovery order, oldest first
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListItemsParams>,
) -> Result<Json<ListItemsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = ItemFilter::new().with_limit(limit).with_offset(offset);
    if let Some(status) = &params.status {
        match status.parse::<ItemStatus>() {
            Ok(status) => filter = filter.with_status(status),
            Err(e) => {
                return Err((StatusCode::BAD_REQUEST, Json(ErrorResponse::new(e))));
            }
        }
    }
    if let Some(category) = params.category {
        filter = filter.with_category(category);
    }

    let store = state.store();
    let items = store.list(&filter).map_err(item_error)?;
    let total = store.count(&filter).map_err(item_error)?;

    Ok(Json(ListItemsResponse {
        items: items.into_iter().map(ItemResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}

/// Get a single item by id or name
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<ItemResponse>, ApiError> {
    // Ids are tried first; names are free text
    let store = state.store();
    let found = match store.get(&key).map_err(item_error)? {
        Some(item) => Some(item),
        None => store.get_by_name(&key).map_err(item_error)?,
    };

    match found {
        Some(item) => Ok(Json(ItemResponse::from(item))),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("item not found: {}", key))),
        )),
    }
}

/// Status counts plus today's budget usage
pub async fn get_counts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ItemCountsResponse>, ApiError> {
    let store = state.store();
    let counts = store.status_counts().map_err(item_error)?;
    let completed_today = store.count_completed_today().map_err(item_error)?;
    let daily_run_limit = RuntimeSettings::load(store)
        .map(|s| s.daily_run_limit)
        .ok();

    Ok(Json(ItemCountsResponse {
        total: counts.total(),
        counts,
        completed_today,
        daily_run_limit,
    }))
}

/// Insert an item by hand. Same idempotent semantics as discovery.
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateItemBody>,
) -> Result<(StatusCode, Json<ItemResponse>), ApiError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse::new("name must not be empty")),
        ));
    }

    let category = body
        .category
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| state.sanitized_config().discovery.category);
    let candidate = DiscoveredItem::new(name, category, body.source_url.unwrap_or_default());

    let store = state.store();
    match store.insert_discovered(&candidate).map_err(item_error)? {
        Some(item) => {
            info!("Item {} added manually", item.name);
            state.bus().publish(&PipelineEvent::ItemDiscovered {
                item_id: item.id.clone(),
                name: item.name.clone(),
                category: item.category.clone(),
            });
            Ok((StatusCode::CREATED, Json(ItemResponse::from(item))))
        }
        None => match store.get_by_name(name).map_err(item_error)? {
            Some(existing) => Ok((StatusCode::OK, Json(ItemResponse::from(existing)))),
            None => Err(internal_error(format!("item {} vanished after insert", name))),
        },
    }
}

/// Supply a destination link: Pending -> Ready
pub async fn mark_ready(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(body): Json<MarkReadyBody>,
) -> Result<Json<ItemResponse>, ApiError> {
    let item = state
        .store()
        .mark_ready(&name, &body.link)
        .map_err(item_error)?;

    info!("Item {} marked ready", item.name);
    announce_ready(&state, &item);
    Ok(Json(ItemResponse::from(item)))
}

/// Re-ready a Pending item with its preserved link
pub async fn requeue_item(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ItemResponse>, ApiError> {
    let item = state.store().requeue(&name).map_err(item_error)?;

    info!("Item {} requeued", item.name);
    announce_ready(&state, &item);
    Ok(Json(ItemResponse::from(item)))
}

/// Failed -> Pending for a single item
pub async fn reset_item(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ItemResponse>, ApiError> {
    let item = state.store().reset_failed(&name).map_err(item_error)?;

    info!("Item {} reset", item.name);
    state.bus().publish(&PipelineEvent::ItemReset {
        name: Some(item.name.clone()),
        count: 1,
    });
    Ok(Json(ItemResponse::from(item)))
}

/// Failed -> Pending for every failed item
pub async fn reset_all_failed(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ResetFailedResponse>, ApiError> {
    let reset = state.store().reset_all_failed().map_err(item_error)?;

    info!("Reset {} failed items", reset);
    if reset > 0 {
        state
            .bus()
            .publish(&PipelineEvent::ItemReset { name: None, count: reset });
    }
    Ok(Json(ResetFailedResponse { reset }))
}

fn announce_ready(state: &AppState, item: &Item) {
    state.bus().publish(&PipelineEvent::ItemReady {
        name: item.name.clone(),
        link: item.destination_link.clone().unwrap_or_default(),
    });
    state.wake_orchestrator();
}

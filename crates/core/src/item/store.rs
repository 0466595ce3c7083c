//! Item storage trait and types.

use chrono::NaiveDate;
use thiserror::Error;

use super::{DiscoveredItem, Item, ItemOutcome, ItemStatus, RunLogEntry, StatusCounts};

/// Error type for item store operations.
#[derive(Debug, Error)]
pub enum ItemError {
    /// Item not found.
    #[error("item not found: {0}")]
    NotFound(String),

    /// The requested status change is not allowed by the state machine.
    #[error("invalid transition for item {item}: {from} -> {to}")]
    InvalidTransition {
        item: String,
        from: ItemStatus,
        to: ItemStatus,
    },

    /// Production cannot start without a destination link.
    #[error("item {0} has no destination link")]
    MissingLink(String),

    /// Database error (including lock-wait timeouts).
    #[error("database error: {0}")]
    Database(String),

    /// Stored data could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for ItemError {
    fn from(e: rusqlite::Error) -> Self {
        ItemError::Database(e.to_string())
    }
}

/// Filter for querying items.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    /// Filter by status.
    pub status: Option<ItemStatus>,
    /// Filter by category.
    pub category: Option<String>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl ItemFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            status: None,
            category: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: ItemStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Durable table of work items, the daily run log, and process-wide settings.
pub trait ItemStore: Send + Sync {
    /// Insert a discovered item in `Pending`.
    ///
    /// Idempotent on `name`: returns `None` when an item with that name already exists.
    fn insert_discovered(&self, item: &DiscoveredItem) -> Result<Option<Item>, ItemError>;

    /// Set the destination link and move `Pending -> Ready`.
    fn mark_ready(&self, name: &str, link: &str) -> Result<Item, ItemError>;

    /// Move a `Pending` item back to `Ready` using its preserved link.
    fn requeue(&self, name: &str) -> Result<Item, ItemError>;

    /// Claim the oldest unclaimed `Ready` item.
    ///
    /// The claim is atomic: concurrent callers never receive the same item.
    fn next_ready_item(&self) -> Result<Option<Item>, ItemError>;

    /// Record the result of a production attempt for a claimed item.
    ///
    /// Success publishes the item and appends a run-log row. Failure increments
    /// `fail_count` and returns the item to `Pending`, or to `Failed` once
    /// `fail_count` reaches `max_retries`.
    fn record_outcome(
        &self,
        id: &str,
        outcome: &ItemOutcome,
        max_retries: u32,
    ) -> Result<Item, ItemError>;

    /// Operator reset of a single `Failed` item back to `Pending`, clearing `fail_count`.
    fn reset_failed(&self, name: &str) -> Result<Item, ItemError>;

    /// Reset every `Failed` item. Returns how many were reset.
    fn reset_all_failed(&self) -> Result<usize, ItemError>;

    /// Release every outstanding claim (crash recovery on startup).
    fn release_claims(&self) -> Result<usize, ItemError>;

    /// Release one item's claim without touching its status or `fail_count`.
    ///
    /// Returns false when the item was not claimed.
    fn release_claim(&self, id: &str) -> Result<bool, ItemError>;

    /// Get an item by ID.
    fn get(&self, id: &str) -> Result<Option<Item>, ItemError>;

    /// Get an item by its unique name.
    fn get_by_name(&self, name: &str) -> Result<Option<Item>, ItemError>;

    /// List items matching the filter, oldest first.
    fn list(&self, filter: &ItemFilter) -> Result<Vec<Item>, ItemError>;

    /// Count items matching the filter.
    fn count(&self, filter: &ItemFilter) -> Result<i64, ItemError>;

    /// Item counts for every status.
    fn status_counts(&self) -> Result<StatusCounts, ItemError>;

    /// Completed productions on the given UTC date.
    fn count_completed_on(&self, date: NaiveDate) -> Result<u32, ItemError>;

    /// Completed productions today (UTC, according to the store's clock).
    fn count_completed_today(&self) -> Result<u32, ItemError>;

    /// Run-log rows for the given date.
    fn run_log(&self, date: NaiveDate) -> Result<Vec<RunLogEntry>, ItemError>;

    /// Raw setting value, if present.
    fn get_setting(&self, key: &str) -> Result<Option<String>, ItemError>;

    /// Insert or replace a setting.
    fn set_setting(&self, key: &str, value: &str) -> Result<(), ItemError>;

    /// Insert a setting only if it is absent. Returns true if inserted.
    fn seed_setting(&self, key: &str, value: &str) -> Result<bool, ItemError>;

    /// All stored settings, sorted by key.
    fn all_settings(&self) -> Result<Vec<(String, String)>, ItemError>;
}

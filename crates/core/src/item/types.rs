//! Core item data types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Status
// ============================================================================

/// Lifecycle status of an item.
///
/// These four values are the only ones ever persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ItemStatus {
    /// Discovered, waiting for an operator to supply a destination link.
    Pending,
    /// Link supplied, eligible for production.
    Ready,
    /// All stages succeeded (terminal, immutable).
    Published,
    /// Retry ceiling reached (terminal until an operator resets it).
    Failed,
}

impl ItemStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [ItemStatus; 4] = [
        ItemStatus::Pending,
        ItemStatus::Ready,
        ItemStatus::Published,
        ItemStatus::Failed,
    ];

    /// Persisted string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "Pending",
            ItemStatus::Ready => "Ready",
            ItemStatus::Published => "Published",
            ItemStatus::Failed => "Failed",
        }
    }

    /// Whether the item state machine allows `self -> to`.
    ///
    /// Valid transitions:
    /// - `Pending -> Ready` (operator supplies a link)
    /// - `Ready -> Published` (all stages succeeded)
    /// - `Ready -> Pending` (stage failed, retries left)
    /// - `Ready -> Failed` (stage failed, retry ceiling reached)
    /// - `Failed -> Pending` (operator reset)
    pub fn can_transition_to(&self, to: ItemStatus) -> bool {
        matches!(
            (self, to),
            (ItemStatus::Pending, ItemStatus::Ready)
                | (ItemStatus::Ready, ItemStatus::Published)
                | (ItemStatus::Ready, ItemStatus::Pending)
                | (ItemStatus::Ready, ItemStatus::Failed)
                | (ItemStatus::Failed, ItemStatus::Pending)
        )
    }

    /// Published is terminal; Failed is terminal until reset.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Published | ItemStatus::Failed)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown item status: {}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for ItemStatus {
    type Err = UnknownStatus;

    /// Accepts the persisted form and its lowercase variant (for query params).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" | "pending" => Ok(ItemStatus::Pending),
            "Ready" | "ready" => Ok(ItemStatus::Ready),
            "Published" | "published" => Ok(ItemStatus::Published),
            "Failed" | "failed" => Ok(ItemStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

// ============================================================================
// Item
// ============================================================================

/// References to artifacts produced for an item.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Artifacts {
    /// Path of the generated image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    /// Path of the generated video.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_ref: Option<String>,
    /// Generated content, serialized as JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_ref: Option<String>,
    /// Reference returned by the distribution collaborator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_ref: Option<String>,
}

/// One unit of work moving through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    /// Opaque identity, stable for the item's lifetime.
    pub id: String,
    /// Human-unique key.
    pub name: String,
    /// Free-form classification tag.
    pub category: String,
    /// Where discovery found the item.
    pub source_url: String,
    /// Operator-supplied destination link. Preserved across retries.
    pub destination_link: Option<String>,
    pub status: ItemStatus,
    /// Number of failed production attempts.
    pub fail_count: u32,
    pub artifacts: Artifacts,
    /// Most recent failure, as `stage: reason`.
    pub last_error: Option<String>,
    /// When the item last became Ready.
    pub ready_at: Option<DateTime<Utc>>,
    /// Set while a worker is producing the item.
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

impl Item {
    /// Whether a worker currently holds this item.
    pub fn is_claimed(&self) -> bool {
        self.claimed_at.is_some()
    }
}

/// A candidate proposed by discovery (or inserted manually by an operator).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscoveredItem {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub source_url: String,
}

impl DiscoveredItem {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            source_url: source_url.into(),
        }
    }
}

/// Result of one production attempt, as recorded in the store.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// Every stage succeeded.
    Published { artifacts: Artifacts },
    /// A stage failed; remaining stages were skipped.
    Failed { stage: String, reason: String },
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Published { .. })
    }
}

/// One row per successfully completed production.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunLogEntry {
    pub id: i64,
    pub run_date: NaiveDate,
    pub item_name: String,
}

/// Item counts per status.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: u64,
    pub ready: u64,
    pub published: u64,
    pub failed: u64,
}

impl StatusCounts {
    pub fn get(&self, status: ItemStatus) -> u64 {
        match status {
            ItemStatus::Pending => self.pending,
            ItemStatus::Ready => self.ready,
            ItemStatus::Published => self.published,
            ItemStatus::Failed => self.failed,
        }
    }

    pub fn total(&self) -> u64 {
        self.pending + self.ready + self.published + self.failed
    }
}

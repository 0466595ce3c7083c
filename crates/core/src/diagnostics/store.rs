use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Item name used for loop-level errors not tied to a single item.
pub const SYSTEM_ITEM: &str = "SYSTEM";

/// Messages longer than this are cut before being stored.
pub const MAX_MESSAGE_LEN: usize = 600;

const TRUNCATION_SUFFIX: &str = "...[truncated]";

#[derive(Debug, Error)]
pub enum DiagnosticsError {
    #[error("Database error: {0}")]
    Database(String),
}

/// Loop-level stage names recorded against [`SYSTEM_ITEM`].
pub mod system_stage {
    pub const MAIN_LOOP: &str = "main_loop";
    pub const BUDGET: &str = "budget";
    pub const SYSTEM_LOAD: &str = "system_load";
    pub const DISCOVERY: &str = "discovery";
    pub const CONFIG: &str = "config";
}

/// One durable error-log row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorEntry {
    pub id: i64,
    pub item_name: String,
    pub stage: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Summary counts for the diagnostic surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ErrorStats {
    pub today: u64,
    pub total: u64,
    pub last_error_at: Option<DateTime<Utc>>,
}

/// Filter for querying error entries.
#[derive(Debug, Clone, Default)]
pub struct ErrorFilter {
    pub item_name: Option<String>,
    pub stage: Option<String>,
    pub limit: i64,
}

impl ErrorFilter {
    pub fn new() -> Self {
        Self {
            limit: 50,
            ..Default::default()
        }
    }

    pub fn with_item(mut self, item_name: impl Into<String>) -> Self {
        self.item_name = Some(item_name.into());
        self
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }
}

/// Durable error log keyed by item and stage.
pub trait ErrorLog: Send + Sync {
    /// Append an entry. The message is truncated to [`MAX_MESSAGE_LEN`].
    fn record(&self, item_name: &str, stage: &str, message: &str)
        -> Result<ErrorEntry, DiagnosticsError>;

    /// Most recent entries first.
    fn recent(&self, filter: &ErrorFilter) -> Result<Vec<ErrorEntry>, DiagnosticsError>;

    fn stats(&self) -> Result<ErrorStats, DiagnosticsError>;
}

/// Cut a message to [`MAX_MESSAGE_LEN`] characters, marking the cut.
pub fn truncate_message(message: &str) -> String {
    if message.chars().count() <= MAX_MESSAGE_LEN {
        return message.to_string();
    }
    let mut cut: String = message.chars().take(MAX_MESSAGE_LEN).collect();
    cut.push_str(TRUNCATION_SUFFIX);
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_untouched() {
        assert_eq!(truncate_message("timeout"), "timeout");
    }

    #[test]
    fn test_long_message_truncated() {
        let long = "x".repeat(700);
        let cut = truncate_message(&long);
        assert!(cut.ends_with("...[truncated]"));
        assert_eq!(cut.chars().count(), MAX_MESSAGE_LEN + "...[truncated]".len());
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let long = "é".repeat(601);
        let cut = truncate_message(&long);
        assert!(cut.starts_with('é'));
        assert!(cut.ends_with("...[truncated]"));
    }
}

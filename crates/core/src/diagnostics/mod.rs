//! Durable error log queried by the operator API.
//!
//! Every stage failure, media degradation and loop-level error is appended here,
//! keyed by item name and stage.

mod sqlite;
mod store;

pub use sqlite::SqliteErrorLog;
pub use store::{
    system_stage, truncate_message, DiagnosticsError, ErrorEntry, ErrorFilter, ErrorLog,
    ErrorStats, MAX_MESSAGE_LEN, SYSTEM_ITEM,
};

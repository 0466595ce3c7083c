//! Work items: the persisted pipeline state machine, the daily run log, and settings storage.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteItemStore;
pub use store::{ItemError, ItemFilter, ItemStore};
pub use types::*;

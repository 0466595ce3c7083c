//! SQLite-backed item store implementation.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use super::{
    Artifacts, DiscoveredItem, Item, ItemError, ItemFilter, ItemOutcome, ItemStatus, ItemStore,
    RunLogEntry, StatusCounts,
};
use crate::clock::{Clock, SystemClock};
use crate::db;

const ITEM_COLUMNS: &str = "id, name, category, source_url, link, status, fail_count, \
     image_ref, video_ref, content_ref, publish_ref, last_error, ready_at, claimed_at, \
     created_at, last_update";

/// SQLite-backed item store.
pub struct SqliteItemStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl SqliteItemStore {
    /// Open (or create) the store at `path` with the given lock-wait timeout.
    pub fn new(path: &Path, busy_timeout: Duration) -> Result<Self, ItemError> {
        let conn = db::open_connection(path, busy_timeout)
            .map_err(|e| ItemError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock: Arc::new(SystemClock),
        })
    }

    /// Create an in-memory SQLite item store (useful for testing).
    pub fn in_memory() -> Result<Self, ItemError> {
        let conn = db::open_in_memory().map_err(|e| ItemError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the clock used for timestamps and run-log dating.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn initialize_schema(conn: &Connection) -> Result<(), ItemError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                category TEXT NOT NULL,
                source_url TEXT NOT NULL DEFAULT '',
                link TEXT,
                status TEXT NOT NULL DEFAULT 'Pending'
                    CHECK (status IN ('Pending', 'Ready', 'Published', 'Failed')),
                fail_count INTEGER NOT NULL DEFAULT 0,
                image_ref TEXT,
                video_ref TEXT,
                content_ref TEXT,
                publish_ref TEXT,
                last_error TEXT,
                ready_at TEXT,
                ready_seq INTEGER,
                claimed_at TEXT,
                created_at TEXT NOT NULL,
                last_update TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_items_status ON items(status);
            CREATE INDEX IF NOT EXISTS idx_items_ready_seq ON items(ready_seq);

            CREATE TABLE IF NOT EXISTS run_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_date TEXT NOT NULL,
                item_name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_run_log_date ON run_log(run_date);

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| ItemError::Database(e.to_string()))?;

        Ok(())
    }

    fn now_str(&self) -> String {
        format_ts(self.clock.now())
    }

    fn build_where_clause(filter: &ItemFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        if let Some(ref category) = filter.category {
            conditions.push("category = ?");
            params.push(Box::new(category.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<Item> {
        let status_str: String = row.get(5)?;
        let status = status_str.parse::<ItemStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Item {
            id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
            source_url: row.get(3)?,
            destination_link: row.get(4)?,
            status,
            fail_count: row.get(6)?,
            artifacts: Artifacts {
                image_ref: row.get(7)?,
                video_ref: row.get(8)?,
                content_ref: row.get(9)?,
                publish_ref: row.get(10)?,
            },
            last_error: row.get(11)?,
            ready_at: row.get::<_, Option<String>>(12)?.map(|s| parse_ts(&s)),
            claimed_at: row.get::<_, Option<String>>(13)?.map(|s| parse_ts(&s)),
            created_at: parse_ts(&row.get::<_, String>(14)?),
            last_update: parse_ts(&row.get::<_, String>(15)?),
        })
    }

    fn fetch_by(conn: &Connection, column: &str, value: &str) -> Result<Option<Item>, ItemError> {
        let sql = format!("SELECT {} FROM items WHERE {} = ?", ITEM_COLUMNS, column);
        conn.query_row(&sql, params![value], Self::row_to_item)
            .optional()
            .map_err(|e| ItemError::Database(e.to_string()))
    }

    fn require_by_name(conn: &Connection, name: &str) -> Result<Item, ItemError> {
        Self::fetch_by(conn, "name", name)?.ok_or_else(|| ItemError::NotFound(name.to_string()))
    }

    fn require_by_id(conn: &Connection, id: &str) -> Result<Item, ItemError> {
        Self::fetch_by(conn, "id", id)?.ok_or_else(|| ItemError::NotFound(id.to_string()))
    }

    fn check_transition(item: &Item, to: ItemStatus) -> Result<(), ItemError> {
        if item.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(ItemError::InvalidTransition {
                item: item.name.clone(),
                from: item.status,
                to,
            })
        }
    }

    /// Move a Pending item to Ready with the given link, assigning the next ready sequence.
    fn promote(&self, conn: &Connection, item: &Item, link: &str) -> Result<Item, ItemError> {
        Self::check_transition(item, ItemStatus::Ready)?;
        if link.trim().is_empty() {
            return Err(ItemError::MissingLink(item.name.clone()));
        }

        let now = self.now_str();
        conn.execute(
            "UPDATE items SET link = ?1, status = 'Ready', ready_at = ?2, \
             ready_seq = (SELECT COALESCE(MAX(ready_seq), 0) + 1 FROM items), \
             claimed_at = NULL, last_update = ?2 WHERE id = ?3",
            params![link.trim(), now, item.id],
        )
        .map_err(|e| ItemError::Database(e.to_string()))?;

        Self::require_by_id(conn, &item.id)
    }
}

impl ItemStore for SqliteItemStore {
    fn insert_discovered(&self, item: &DiscoveredItem) -> Result<Option<Item>, ItemError> {
        let conn = self.conn.lock().unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let now = self.now_str();

        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO items (id, name, category, source_url, status, fail_count, created_at, last_update) \
                 VALUES (?, ?, ?, ?, 'Pending', 0, ?, ?)",
                params![id, item.name, item.category, item.source_url, now, now],
            )
            .map_err(|e| ItemError::Database(e.to_string()))?;

        if inserted == 0 {
            return Ok(None);
        }

        Self::fetch_by(&conn, "id", &id)
    }

    fn mark_ready(&self, name: &str, link: &str) -> Result<Item, ItemError> {
        let conn = self.conn.lock().unwrap();
        let item = Self::require_by_name(&conn, name)?;
        self.promote(&conn, &item, link)
    }

    fn requeue(&self, name: &str) -> Result<Item, ItemError> {
        let conn = self.conn.lock().unwrap();
        let item = Self::require_by_name(&conn, name)?;
        let link = item.destination_link.clone().unwrap_or_default();
        self.promote(&conn, &item, &link)
    }

    fn next_ready_item(&self) -> Result<Option<Item>, ItemError> {
        let mut conn = self.conn.lock().unwrap();

        // IMMEDIATE takes the write lock up front so two handles on the same file
        // cannot both select the same row before either updates it.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| ItemError::Database(e.to_string()))?;

        let id: Option<String> = tx
            .query_row(
                "SELECT id FROM items WHERE status = 'Ready' AND claimed_at IS NULL \
                 AND link IS NOT NULL AND link != '' ORDER BY ready_seq ASC, id ASC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| ItemError::Database(e.to_string()))?;

        let Some(id) = id else {
            tx.commit().map_err(|e| ItemError::Database(e.to_string()))?;
            return Ok(None);
        };

        let now = self.now_str();
        tx.execute(
            "UPDATE items SET claimed_at = ?, last_update = ? WHERE id = ?",
            params![now, now, id],
        )
        .map_err(|e| ItemError::Database(e.to_string()))?;

        let item = Self::require_by_id(&tx, &id)?;
        tx.commit().map_err(|e| ItemError::Database(e.to_string()))?;

        Ok(Some(item))
    }

    fn record_outcome(
        &self,
        id: &str,
        outcome: &ItemOutcome,
        max_retries: u32,
    ) -> Result<Item, ItemError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| ItemError::Database(e.to_string()))?;

        let current = Self::require_by_id(&tx, id)?;
        let now = self.now_str();

        match outcome {
            ItemOutcome::Published { artifacts } => {
                Self::check_transition(&current, ItemStatus::Published)?;

                tx.execute(
                    "UPDATE items SET status = 'Published', image_ref = ?, video_ref = ?, \
                     content_ref = ?, publish_ref = ?, last_error = NULL, claimed_at = NULL, \
                     last_update = ? WHERE id = ?",
                    params![
                        artifacts.image_ref,
                        artifacts.video_ref,
                        artifacts.content_ref,
                        artifacts.publish_ref,
                        now,
                        id,
                    ],
                )
                .map_err(|e| ItemError::Database(e.to_string()))?;

                tx.execute(
                    "INSERT INTO run_log (run_date, item_name, created_at) VALUES (?, ?, ?)",
                    params![self.clock.today().to_string(), current.name, now],
                )
                .map_err(|e| ItemError::Database(e.to_string()))?;
            }
            ItemOutcome::Failed { stage, reason } => {
                let fail_count = current.fail_count + 1;
                let next = if fail_count >= max_retries {
                    ItemStatus::Failed
                } else {
                    ItemStatus::Pending
                };
                Self::check_transition(&current, next)?;

                tx.execute(
                    "UPDATE items SET status = ?, fail_count = ?, last_error = ?, \
                     claimed_at = NULL, last_update = ? WHERE id = ?",
                    params![
                        next.as_str(),
                        fail_count,
                        format!("{}: {}", stage, reason),
                        now,
                        id,
                    ],
                )
                .map_err(|e| ItemError::Database(e.to_string()))?;
            }
        }

        let updated = Self::require_by_id(&tx, id)?;
        tx.commit().map_err(|e| ItemError::Database(e.to_string()))?;
        Ok(updated)
    }

    fn reset_failed(&self, name: &str) -> Result<Item, ItemError> {
        let conn = self.conn.lock().unwrap();
        let item = Self::require_by_name(&conn, name)?;
        // Ready -> Pending is reserved for recorded failures
        if item.status != ItemStatus::Failed {
            return Err(ItemError::InvalidTransition {
                item: item.name,
                from: item.status,
                to: ItemStatus::Pending,
            });
        }

        conn.execute(
            "UPDATE items SET status = 'Pending', fail_count = 0, claimed_at = NULL, \
             last_update = ? WHERE id = ?",
            params![self.now_str(), item.id],
        )
        .map_err(|e| ItemError::Database(e.to_string()))?;

        Self::require_by_id(&conn, &item.id)
    }

    fn reset_all_failed(&self) -> Result<usize, ItemError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE items SET status = 'Pending', fail_count = 0, claimed_at = NULL, \
             last_update = ? WHERE status = 'Failed'",
            params![self.now_str()],
        )
        .map_err(|e| ItemError::Database(e.to_string()))
    }

    fn release_claims(&self) -> Result<usize, ItemError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE items SET claimed_at = NULL WHERE claimed_at IS NOT NULL",
            [],
        )
        .map_err(|e| ItemError::Database(e.to_string()))
    }

    fn release_claim(&self, id: &str) -> Result<bool, ItemError> {
        let conn = self.conn.lock().unwrap();
        let released = conn
            .execute(
                "UPDATE items SET claimed_at = NULL WHERE id = ? AND claimed_at IS NOT NULL",
                params![id],
            )
            .map_err(|e| ItemError::Database(e.to_string()))?;
        Ok(released > 0)
    }

    fn get(&self, id: &str) -> Result<Option<Item>, ItemError> {
        let conn = self.conn.lock().unwrap();
        Self::fetch_by(&conn, "id", id)
    }

    fn get_by_name(&self, name: &str) -> Result<Option<Item>, ItemError> {
        let conn = self.conn.lock().unwrap();
        Self::fetch_by(&conn, "name", name)
    }

    fn list(&self, filter: &ItemFilter) -> Result<Vec<Item>, ItemError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT {} FROM items {} ORDER BY created_at ASC, rowid ASC LIMIT ? OFFSET ?",
            ITEM_COLUMNS, where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| ItemError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_item)
            .map_err(|e| ItemError::Database(e.to_string()))?;

        let mut items = Vec::new();
        for row_result in rows {
            items.push(row_result.map_err(|e| ItemError::Database(e.to_string()))?);
        }

        Ok(items)
    }

    fn count(&self, filter: &ItemFilter) -> Result<i64, ItemError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM items {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| ItemError::Database(e.to_string()))
    }

    fn status_counts(&self) -> Result<StatusCounts, ItemError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare("SELECT status, COUNT(*) FROM items GROUP BY status")
            .map_err(|e| ItemError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(|e| ItemError::Database(e.to_string()))?;

        let mut counts = StatusCounts::default();
        for row_result in rows {
            let (status, n) = row_result.map_err(|e| ItemError::Database(e.to_string()))?;
            let n = n.max(0) as u64;
            match status
                .parse::<ItemStatus>()
                .map_err(|e| ItemError::Serialization(e.to_string()))?
            {
                ItemStatus::Pending => counts.pending = n,
                ItemStatus::Ready => counts.ready = n,
                ItemStatus::Published => counts.published = n,
                ItemStatus::Failed => counts.failed = n,
            }
        }

        Ok(counts)
    }

    fn count_completed_on(&self, date: NaiveDate) -> Result<u32, ItemError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM run_log WHERE run_date = ?",
            params![date.to_string()],
            |row| row.get(0),
        )
        .map_err(|e| ItemError::Database(e.to_string()))
    }

    fn count_completed_today(&self) -> Result<u32, ItemError> {
        self.count_completed_on(self.clock.today())
    }

    fn run_log(&self, date: NaiveDate) -> Result<Vec<RunLogEntry>, ItemError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare("SELECT id, run_date, item_name FROM run_log WHERE run_date = ? ORDER BY id ASC")
            .map_err(|e| ItemError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![date.to_string()], |row| {
                let run_date: String = row.get(1)?;
                Ok(RunLogEntry {
                    id: row.get(0)?,
                    run_date: run_date.parse().unwrap_or(date),
                    item_name: row.get(2)?,
                })
            })
            .map_err(|e| ItemError::Database(e.to_string()))?;

        let mut entries = Vec::new();
        for row_result in rows {
            entries.push(row_result.map_err(|e| ItemError::Database(e.to_string()))?);
        }
        Ok(entries)
    }

    fn get_setting(&self, key: &str) -> Result<Option<String>, ItemError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT value FROM settings WHERE key = ?",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| ItemError::Database(e.to_string()))
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<(), ItemError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .map_err(|e| ItemError::Database(e.to_string()))?;
        Ok(())
    }

    fn seed_setting(&self, key: &str, value: &str) -> Result<bool, ItemError> {
        let conn = self.conn.lock().unwrap();
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)",
                params![key, value],
            )
            .map_err(|e| ItemError::Database(e.to_string()))?;
        Ok(inserted > 0)
    }

    fn all_settings(&self) -> Result<Vec<(String, String)>, ItemError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare("SELECT key, value FROM settings ORDER BY key ASC")
            .map_err(|e| ItemError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| ItemError::Database(e.to_string()))?;

        let mut settings = Vec::new();
        for row_result in rows {
            settings.push(row_result.map_err(|e| ItemError::Database(e.to_string()))?);
        }
        Ok(settings)
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    // Rows are only ever written by format_ts
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{truncate_message, DiagnosticsError, ErrorEntry, ErrorFilter, ErrorLog, ErrorStats};
use crate::clock::{Clock, SystemClock};
use crate::db;

/// SQLite-backed error log
pub struct SqliteErrorLog {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl SqliteErrorLog {
    /// Open (or create) the error log table in the database at `path`
    pub fn new(path: &Path, busy_timeout: Duration) -> Result<Self, DiagnosticsError> {
        let conn = db::open_connection(path, busy_timeout)
            .map_err(|e| DiagnosticsError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock: Arc::new(SystemClock),
        })
    }

    /// Create an in-memory error log (useful for testing)
    pub fn in_memory() -> Result<Self, DiagnosticsError> {
        let conn = db::open_in_memory().map_err(|e| DiagnosticsError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn initialize_schema(conn: &Connection) -> Result<(), DiagnosticsError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS error_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                item_name TEXT NOT NULL,
                stage TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_error_log_item ON error_log(item_name);
            CREATE INDEX IF NOT EXISTS idx_error_log_created_at ON error_log(created_at);
            "#,
        )
        .map_err(|e| DiagnosticsError::Database(e.to_string()))
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<ErrorEntry> {
        let created_at: String = row.get(4)?;
        Ok(ErrorEntry {
            id: row.get(0)?,
            item_name: row.get(1)?,
            stage: row.get(2)?,
            message: row.get(3)?,
            created_at: parse_ts(&created_at),
        })
    }
}

impl ErrorLog for SqliteErrorLog {
    fn record(
        &self,
        item_name: &str,
        stage: &str,
        message: &str,
    ) -> Result<ErrorEntry, DiagnosticsError> {
        let conn = self.conn.lock().unwrap();
        let message = truncate_message(message);
        let created_at = self.clock.now();

        conn.execute(
            "INSERT INTO error_log (item_name, stage, message, created_at) VALUES (?, ?, ?, ?)",
            params![
                item_name,
                stage,
                message,
                created_at.to_rfc3339_opts(SecondsFormat::Micros, true)
            ],
        )
        .map_err(|e| DiagnosticsError::Database(e.to_string()))?;

        Ok(ErrorEntry {
            id: conn.last_insert_rowid(),
            item_name: item_name.to_string(),
            stage: stage.to_string(),
            message,
            created_at,
        })
    }

    fn recent(&self, filter: &ErrorFilter) -> Result<Vec<ErrorEntry>, DiagnosticsError> {
        let conn = self.conn.lock().unwrap();

        let mut conditions = Vec::new();
        let mut query_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref item_name) = filter.item_name {
            conditions.push("item_name = ?");
            query_params.push(Box::new(item_name.clone()));
        }
        if let Some(ref stage) = filter.stage {
            conditions.push("stage = ?");
            query_params.push(Box::new(stage.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT id, item_name, stage, message, created_at FROM error_log {} ORDER BY id DESC LIMIT ?",
            where_clause
        );
        query_params.push(Box::new(filter.limit));

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DiagnosticsError::Database(e.to_string()))?;
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            query_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_entry)
            .map_err(|e| DiagnosticsError::Database(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(|e| DiagnosticsError::Database(e.to_string()))?);
        }
        Ok(entries)
    }

    fn stats(&self) -> Result<ErrorStats, DiagnosticsError> {
        let conn = self.conn.lock().unwrap();
        let today_prefix = format!("{}%", self.clock.today());

        let today: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM error_log WHERE created_at LIKE ?",
                params![today_prefix],
                |row| row.get(0),
            )
            .map_err(|e| DiagnosticsError::Database(e.to_string()))?;

        let total: i64 = conn
            .query_row("SELECT COUNT(*) FROM error_log", [], |row| row.get(0))
            .map_err(|e| DiagnosticsError::Database(e.to_string()))?;

        let last: Option<String> = conn
            .query_row(
                "SELECT created_at FROM error_log ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DiagnosticsError::Database(e.to_string()))?;

        Ok(ErrorStats {
            today: today.max(0) as u64,
            total: total.max(0) as u64,
            last_error_at: last.map(|s| parse_ts(&s)),
        })
    }
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

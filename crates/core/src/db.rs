//! SQLite connection setup shared by all stores.
//!
//! Every handle runs in WAL mode with a bounded busy timeout: the orchestrator
//! and the operator API write to the same file, and a slow writer must surface
//! as a `database is locked` error instead of blocking forever.

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

/// Default lock-wait timeout for a connection.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Open a file-backed connection with WAL durability and a busy timeout.
pub fn open_connection(path: &Path, busy_timeout: Duration) -> rusqlite::Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let conn = Connection::open(path)?;
    apply_pragmas(&conn, busy_timeout)?;
    Ok(conn)
}

/// Open an in-memory connection (useful for testing).
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(conn)
}

fn apply_pragmas(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    // journal_mode returns the resulting mode as a row
    let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_connection_uses_wal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("pipeline.db");

        let conn = open_connection(&path, DEFAULT_BUSY_TIMEOUT).unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();

        assert_eq!(mode.to_lowercase(), "wal");
        assert!(path.exists());
    }

    #[test]
    fn test_two_handles_same_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("pipeline.db");

        let writer = open_connection(&path, DEFAULT_BUSY_TIMEOUT).unwrap();
        let reader = open_connection(&path, DEFAULT_BUSY_TIMEOUT).unwrap();

        writer
            .execute_batch("CREATE TABLE t (v INTEGER); INSERT INTO t VALUES (1);")
            .unwrap();
        let v: i64 = reader.query_row("SELECT v FROM t", [], |row| row.get(0)).unwrap();
        assert_eq!(v, 1);
    }
}

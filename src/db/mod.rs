//! Ordering store for the kanban board.
//!
//! One SQLite connection behind a mutex. Reads go through [`Database::with_conn`];
//! every write runs inside [`Database::in_transaction`], so a failed step
//! leaves the board exactly as it was.

pub mod columns;
pub mod tasks;

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Pragmas for on-disk boards. WAL lets the CLI read while the server writes.
const FILE_PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA foreign_keys=ON;
     PRAGMA busy_timeout=5000;";

const MEMORY_PRAGMAS: &str = "PRAGMA foreign_keys=ON;";

/// Shared handle to the board database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (creating if needed) the board database at `path`, including any
    /// missing parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating database directory {}", dir.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("opening database {}", path.display()))?;
        Self::init(conn, FILE_PRAGMAS)
    }

    /// Open a private in-memory board.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, MEMORY_PRAGMAS)
    }

    fn init(mut conn: Connection, pragmas: &str) -> Result<Self> {
        conn.execute_batch(pragmas)?;

        let report = embedded::migrations::runner()
            .run(&mut conn)
            .context("running board migrations")?;
        for migration in report.applied_migrations() {
            info!(version = migration.version(), name = %migration.name(), "Applied migration");
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }

    /// Run a read against the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` in an IMMEDIATE transaction, committing only if it returns `Ok`.
    pub fn in_transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

/// Current time as Unix milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_count(db: &Database) -> i64 {
        db.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM columns", [], |row| row.get(0))?)
        })
        .unwrap()
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let db = Database::open_in_memory().unwrap();

        let result: Result<()> = db.in_transaction(|tx| {
            tx.execute("DELETE FROM columns", [])?;
            Err(anyhow!("abort"))
        });

        assert!(result.is_err());
        assert_eq!(column_count(&db), 3);
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let db = Database::open_in_memory().unwrap();
        let result = db.in_transaction(|tx| {
            tx.execute(
                "INSERT INTO tasks (title, column_id, ord, created_at, updated_at)
                 VALUES ('orphan', 999, 1, 0, 0)",
                [],
            )?;
            Ok(())
        });
        assert!(result.is_err());
    }
}

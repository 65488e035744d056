//! Persistent SQLite counters: checks per user and the global total.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

pub struct Stats {
    conn: Mutex<Connection>,
}

impl Stats {
    /// Open (or create) the counter database at `path`.
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let stats = Self { conn: Mutex::new(Connection::open(path)?) };
        stats.init_schema()?;
        info!("Loaded stats database from {:?} ({} checks so far)", path, stats.total_checks()?);
        Ok(stats)
    }

    /// Create a throwaway in-memory database.
    pub fn in_memory() -> rusqlite::Result<Self> {
        let stats = Self { conn: Mutex::new(Connection::open_in_memory()?) };
        stats.init_schema()?;
        Ok(stats)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn().execute_batch(r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                checks_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS global_stats (
                name TEXT PRIMARY KEY,
                value INTEGER NOT NULL DEFAULT 0
            );

            INSERT OR IGNORE INTO global_stats (name, value) VALUES ('total_checks', 0);
        "#)
    }

    /// Count one successful check for `user_id`. Both counters move together.
    pub fn record_check(&self, user_id: i64) -> rusqlite::Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO users (id, checks_count) VALUES (?1, 1)
             ON CONFLICT(id) DO UPDATE SET checks_count = checks_count + 1",
            params![user_id],
        )?;
        tx.execute(
            "UPDATE global_stats SET value = value + 1 WHERE name = 'total_checks'",
            [],
        )?;
        tx.commit()
    }

    /// Checks made by `user_id`; 0 for users never seen.
    pub fn user_checks(&self, user_id: i64) -> rusqlite::Result<i64> {
        self.conn()
            .query_row(
                "SELECT checks_count FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .map(|count| count.unwrap_or(0))
    }

    pub fn total_checks(&self) -> rusqlite::Result<i64> {
        self.conn()
            .query_row(
                "SELECT value FROM global_stats WHERE name = 'total_checks'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map(|total| total.unwrap_or(0))
    }
}

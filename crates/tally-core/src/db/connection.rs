//! Database connection management

use crate::error::Result;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

use super::migrations;

/// How long a writer waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database wrapper for a `SQLite` connection
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        let mut database = Self { conn };
        database.configure()?;
        database.migrate()?;
        tracing::debug!("Opened database at {}", path.as_ref().display());
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut database = Self { conn };
        database.configure()?;
        database.migrate()?;
        Ok(database)
    }

    /// Configure `SQLite` for concurrent writers
    fn configure(&self) -> Result<()> {
        // WAL is not available for in-memory databases; ignore the failure there
        self.conn
            .pragma_update(None, "journal_mode", "WAL")
            .ok();
        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        self.conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(())
    }

    /// Run database migrations
    fn migrate(&mut self) -> Result<()> {
        migrations::run(&mut self.conn)
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Get a mutable reference to the underlying connection (needed to open transactions)
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        let enabled: i64 = db
            .connection()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn test_open_on_disk_is_reopenable() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("tally.db");

        {
            let db = Database::open(&path).unwrap();
            db.connection()
                .execute("INSERT INTO schema_version (version) VALUES (999)", [])
                .unwrap();
        }

        let db = Database::open(&path).unwrap();
        let max: i64 = db
            .connection()
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(max, 999);
    }
}

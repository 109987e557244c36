//! Database migrations

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension};

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Columns every record table starts with
const RECORD_COLUMNS: &str = "
    id TEXT PRIMARY KEY,
    version INTEGER NOT NULL DEFAULT 1 CHECK (version >= 1),
    is_deleted INTEGER NOT NULL DEFAULT 0,
    deleted_at INTEGER,
    idempotency_key TEXT UNIQUE,
    origin_device_id TEXT,
    origin_local_id TEXT,
    synced_at INTEGER,
    client_timestamp INTEGER,
    sync_local_id TEXT,
    created_by TEXT,
    updated_by TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL";

const RECORD_TABLES: [&str; 5] = [
    "suppliers",
    "products",
    "rate_versions",
    "collections",
    "payments",
];

/// Run all pending migrations
pub fn run(conn: &mut Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0)
        })
        .optional()?
        .flatten();

    Ok(version.unwrap_or(0))
}

/// Migration to version 1: record tables
fn migrate_v1(conn: &mut Connection) -> Result<()> {
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS suppliers ({RECORD_COLUMNS},
            name TEXT NOT NULL,
            code TEXT,
            phone TEXT,
            address TEXT,
            region TEXT,
            is_active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS products ({RECORD_COLUMNS},
            name TEXT NOT NULL,
            code TEXT,
            default_unit TEXT NOT NULL,
            description TEXT,
            is_active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS rate_versions ({RECORD_COLUMNS},
            product_id TEXT NOT NULL REFERENCES products(id),
            unit TEXT NOT NULL,
            rate TEXT NOT NULL,
            effective_from TEXT NOT NULL,
            effective_to TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            notes TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_rate_versions_window
            ON rate_versions(product_id, unit, effective_from DESC);

        CREATE TABLE IF NOT EXISTS collections ({RECORD_COLUMNS},
            supplier_id TEXT NOT NULL REFERENCES suppliers(id),
            product_id TEXT NOT NULL REFERENCES products(id),
            unit TEXT NOT NULL,
            quantity TEXT NOT NULL,
            collection_date TEXT NOT NULL,
            rate_version_id TEXT NOT NULL REFERENCES rate_versions(id),
            applied_rate TEXT NOT NULL,
            notes TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_collections_supplier ON collections(supplier_id);

        CREATE TABLE IF NOT EXISTS payments ({RECORD_COLUMNS},
            supplier_id TEXT NOT NULL REFERENCES suppliers(id),
            amount TEXT NOT NULL,
            payment_type TEXT NOT NULL CHECK (payment_type IN ('advance', 'partial', 'full')),
            payment_date TEXT NOT NULL,
            reference TEXT,
            notes TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_payments_supplier ON payments(supplier_id);

        INSERT INTO schema_version (version) VALUES (1);"
    );

    let tx = conn.transaction()?;
    tx.execute_batch(&sql)?;
    tx.commit()?;

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: device-origin uniqueness and change feed indexes
fn migrate_v2(conn: &mut Connection) -> Result<()> {
    let mut sql = String::new();
    for table in RECORD_TABLES {
        sql.push_str(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_origin
                ON {table}(origin_device_id, origin_local_id)
                WHERE origin_local_id IS NOT NULL;
            CREATE INDEX IF NOT EXISTS idx_{table}_updated ON {table}(updated_at);
            CREATE INDEX IF NOT EXISTS idx_{table}_deleted ON {table}(is_deleted);\n"
        ));
    }
    sql.push_str("INSERT INTO schema_version (version) VALUES (2);");

    let tx = conn.transaction()?;
    tx.execute_batch(&sql)?;
    tx.commit()?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_migrations() {
        let mut conn = setup();
        run(&mut conn).unwrap();

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migrations_idempotent() {
        let mut conn = setup();
        run(&mut conn).unwrap();
        run(&mut conn).unwrap(); // Should not fail

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_every_record_table_has_origin_index() {
        let mut conn = setup();
        run(&mut conn).unwrap();

        for table in RECORD_TABLES {
            let exists: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?)",
                    [format!("idx_{table}_origin")],
                    |row| row.get(0),
                )
                .unwrap();
            assert!(exists, "missing origin index on {table}");
        }
    }

    #[test]
    fn test_idempotency_key_is_unique() {
        let mut conn = setup();
        run(&mut conn).unwrap();

        let insert = "INSERT INTO suppliers (id, idempotency_key, created_at, updated_at, name)
                      VALUES (?, 'same-key', 0, 0, 'Acme')";
        conn.execute(insert, ["a"]).unwrap();
        assert!(conn.execute(insert, ["b"]).is_err());
    }
}

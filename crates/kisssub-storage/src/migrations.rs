//! Database migrations
//!
//! Schema: record, cookies, http_cache

use crate::error::StorageError;
use crate::Result;
use rusqlite::Connection;

const SCHEMA_VERSION: i32 = 1;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version > SCHEMA_VERSION {
        return Err(StorageError::SchemaTooNew {
            found: current_version,
            supported: SCHEMA_VERSION,
        });
    }

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

fn get_schema_version(conn: &Connection) -> Result<i32> {
    let result: std::result::Result<i32, _> =
        conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        });

    match result {
        Ok(v) => Ok(v),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(rusqlite::Error::SqliteFailure(_, _)) => {
            // Table doesn't exist yet
            conn.execute(
                "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
                [],
            )?;
            conn.execute("INSERT INTO schema_version (version) VALUES (0)", [])?;
            Ok(0)
        }
        Err(e) => Err(e.into()),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    tracing::info!("Running migration v1: Initial schema");

    // Content records, id assigned on insert
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS record (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            type INTEGER NOT NULL DEFAULT 0,
            category TEXT,
            title TEXT,
            date TEXT,
            cover TEXT,
            sub TEXT,
            size TEXT,
            url TEXT,
            "desc" TEXT,
            magnet TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_record_type ON record(type);
        CREATE INDEX IF NOT EXISTS idx_record_url ON record(url);
    "#,
    )?;

    // Persistent cookie jar
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS cookies (
            domain TEXT NOT NULL,
            path TEXT NOT NULL DEFAULT '/',
            name TEXT NOT NULL,
            value TEXT NOT NULL,
            expires_at TEXT,
            secure INTEGER NOT NULL DEFAULT 0,
            http_only INTEGER NOT NULL DEFAULT 0,
            host_only INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            PRIMARY KEY (domain, path, name)
        );

        CREATE INDEX IF NOT EXISTS idx_cookies_domain ON cookies(domain);
    "#,
    )?;

    // Response cache for request-failed fallback
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS http_cache (
            key TEXT PRIMARY KEY,
            status INTEGER NOT NULL,
            body TEXT NOT NULL,
            stored_at TEXT NOT NULL
        );
    "#,
    )?;

    Ok(())
}

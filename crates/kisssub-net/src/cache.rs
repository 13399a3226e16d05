//! Response cache
//!
//! Bodies of successful GETs keyed by full URL. Entries never expire; they
//! are only read back when a fresh request fails.

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;

use kisssub_storage::Database;

use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub body: String,
    pub stored_at: DateTime<Utc>,
}

pub struct ResponseCache {
    db: Database,
}

impl ResponseCache {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn put(&self, key: &str, status: u16, body: &str) -> Result<()> {
        let stored_at = Utc::now().to_rfc3339();
        self.db.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO http_cache (key, status, body, stored_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![key, status, body, stored_at],
            )
        })?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<CachedResponse>> {
        Ok(self.db.with_connection(|conn| {
            conn.query_row(
                "SELECT status, body, stored_at FROM http_cache WHERE key = ?1",
                [key],
                |row| {
                    let stored_str: String = row.get(2)?;
                    let stored_at = DateTime::parse_from_rfc3339(&stored_str)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now());

                    Ok(CachedResponse {
                        status: row.get(0)?,
                        body: row.get(1)?,
                        stored_at,
                    })
                },
            )
            .optional()
        })?)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.db
            .with_connection(|conn| conn.execute("DELETE FROM http_cache WHERE key = ?1", [key]))?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.db
            .with_connection(|conn| conn.execute("DELETE FROM http_cache", []))?;
        Ok(())
    }
}

impl Clone for ResponseCache {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

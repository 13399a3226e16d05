//! Record store

use rusqlite::{OptionalExtension, Row};

use kisssub_storage::Database;

use crate::error::RecordError;
use crate::record::{NewRecord, Record, RecordType};
use crate::Result;

const COLUMNS: &str =
    r#"id, type, category, title, date, cover, sub, size, url, "desc", magnet"#;

pub struct RecordStore {
    db: Database,
}

impl RecordStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a record, returning it with the id the store assigned
    pub fn insert(&self, record: &NewRecord) -> Result<Record> {
        let id = self.db.with_connection(|conn| {
            conn.execute(
                r#"INSERT INTO record (type, category, title, date, cover, sub, size, url, "desc", magnet)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
                rusqlite::params![
                    record.kind.as_i32(),
                    record.category,
                    record.title,
                    record.date,
                    record.cover,
                    record.sub,
                    record.size,
                    record.url,
                    record.desc,
                    record.magnet,
                ],
            )?;
            Ok::<_, RecordError>(conn.last_insert_rowid())
        })?;

        tracing::debug!(record_id = id, title = ?record.title, "Inserted record");

        Ok(record.clone().into_record(id))
    }

    /// Replace the row with the same id, or insert when `id` is 0
    pub fn upsert(&self, record: &Record) -> Result<Record> {
        if record.id == 0 {
            let new = NewRecord {
                kind: record.kind,
                category: record.category.clone(),
                title: record.title.clone(),
                date: record.date.clone(),
                cover: record.cover.clone(),
                sub: record.sub.clone(),
                size: record.size.clone(),
                url: record.url.clone(),
                desc: record.desc.clone(),
                magnet: record.magnet.clone(),
            };
            return self.insert(&new);
        }

        self.db.with_connection(|conn| {
            conn.execute(
                r#"INSERT OR REPLACE INTO record
                   (id, type, category, title, date, cover, sub, size, url, "desc", magnet)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
                rusqlite::params![
                    record.id,
                    record.kind.as_i32(),
                    record.category,
                    record.title,
                    record.date,
                    record.cover,
                    record.sub,
                    record.size,
                    record.url,
                    record.desc,
                    record.magnet,
                ],
            )?;
            Ok::<_, RecordError>(())
        })?;

        Ok(record.clone())
    }

    pub fn get(&self, id: i64) -> Result<Record> {
        self.db
            .with_connection(|conn| {
                conn.query_row(
                    &format!("SELECT {COLUMNS} FROM record WHERE id = ?1"),
                    [id],
                    map_row,
                )
                .optional()
            })?
            .ok_or(RecordError::NotFound(id))
    }

    /// First record pointing at `url`, if any
    pub fn find_by_url(&self, url: &str) -> Result<Option<Record>> {
        Ok(self.db.with_connection(|conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM record WHERE url = ?1 ORDER BY id LIMIT 1"),
                [url],
                map_row,
            )
            .optional()
        })?)
    }

    /// Most recently inserted records first
    pub fn list(&self, limit: usize) -> Result<Vec<Record>> {
        self.query(
            &format!("SELECT {COLUMNS} FROM record ORDER BY id DESC LIMIT ?1"),
            rusqlite::params![limit as i64],
        )
    }

    pub fn list_by_type(&self, kind: RecordType, limit: usize) -> Result<Vec<Record>> {
        self.query(
            &format!("SELECT {COLUMNS} FROM record WHERE type = ?1 ORDER BY id DESC LIMIT ?2"),
            rusqlite::params![kind.as_i32(), limit as i64],
        )
    }

    /// Search titles, categories and subtitle groups
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<Record>> {
        let pattern = format!("%{}%", query.trim().to_lowercase());
        self.query(
            &format!(
                "SELECT {COLUMNS} FROM record
                 WHERE LOWER(title) LIKE ?1 OR LOWER(category) LIKE ?1 OR LOWER(sub) LIKE ?1
                 ORDER BY id DESC
                 LIMIT ?2"
            ),
            rusqlite::params![pattern, limit as i64],
        )
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        let removed = self
            .db
            .with_connection(|conn| conn.execute("DELETE FROM record WHERE id = ?1", [id]))?;

        if removed == 0 {
            return Err(RecordError::NotFound(id));
        }

        tracing::debug!(record_id = id, "Deleted record");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.db
            .with_connection(|conn| conn.execute("DELETE FROM record", []))?;
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self.db.with_connection(|conn| {
            conn.query_row("SELECT COUNT(*) FROM record", [], |row| row.get(0))
        })?;
        Ok(count as usize)
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Record>> {
        Ok(self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let records: Vec<Record> = stmt
                .query_map(params, map_row)?
                .filter_map(|r| r.ok())
                .collect();
            Ok::<_, rusqlite::Error>(records)
        })?)
    }
}

impl Clone for RecordStore {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: row.get(0)?,
        kind: RecordType::from_i32(row.get(1)?),
        category: row.get(2)?,
        title: row.get(3)?,
        date: row.get(4)?,
        cover: row.get(5)?,
        sub: row.get(6)?,
        size: row.get(7)?,
        url: row.get(8)?,
        desc: row.get(9)?,
        magnet: row.get(10)?,
    })
}

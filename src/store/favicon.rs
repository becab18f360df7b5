use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};

use crate::app::{Result, TributaryError};
use crate::domain::FaviconCacheEntry;
use crate::store::{parse_datetime, FaviconStore};

/// SQLite database holding the favicon cache, separate from the feed store
/// so it can outlive and be cleared independently of feed data.
pub struct SqliteFaviconStore {
    conn: Mutex<Connection>,
}

impl SqliteFaviconStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/favicons/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        migrations
            .to_latest(&mut conn)
            .map_err(|e| TributaryError::Other(format!("Migration failed: {}", e)))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            TributaryError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }
}

impl FaviconStore for SqliteFaviconStore {
    fn favicon_get(&self, page_url: &str) -> Result<Option<FaviconCacheEntry>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                "SELECT page_url, icon_url, date_updated, failure_count
                 FROM favicons WHERE page_url = ?1",
                params![page_url],
                |row| {
                    Ok(FaviconCacheEntry {
                        page_url: row.get(0)?,
                        icon_url: row.get(1)?,
                        date_updated: row
                            .get::<_, String>(2)
                            .ok()
                            .and_then(|s| parse_datetime(&s))
                            .unwrap_or(DateTime::<Utc>::MIN_UTC),
                        failure_count: row.get(3)?,
                    })
                },
            )
            .optional()?;

        Ok(result)
    }

    fn favicon_put(&self, entry: &FaviconCacheEntry) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO favicons (page_url, icon_url, date_updated, failure_count)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(page_url) DO UPDATE SET
                 icon_url = ?2, date_updated = ?3, failure_count = ?4",
            params![
                entry.page_url,
                entry.icon_url,
                entry.date_updated.to_rfc3339_opts(SecondsFormat::Micros, true),
                entry.failure_count
            ],
        )?;

        Ok(())
    }

    fn favicon_delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn()?;

        // Fixed-width UTC timestamps sort chronologically.
        let deleted = conn.execute(
            "DELETE FROM favicons WHERE date_updated < ?1",
            params![cutoff.to_rfc3339_opts(SecondsFormat::Micros, true)],
        )?;

        Ok(deleted)
    }

    fn favicon_clear(&self) -> Result<usize> {
        let conn = self.conn()?;

        let deleted = conn.execute("DELETE FROM favicons", [])?;
        Ok(deleted)
    }
}

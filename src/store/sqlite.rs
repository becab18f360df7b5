use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use rusqlite_migration::{Migrations, M};

use crate::app::{Result, TributaryError};
use crate::domain::{Entry, Feed, UrlHistory};
use crate::store::{parse_datetime, Store};

const FEED_COLUMNS: &str = "id, urls, title, description, link, active, favicon_url, \
     date_published, date_fetched, date_last_modified, error_count, \
     deactivation_reason, deactivation_date, date_created, date_updated";

const ENTRY_COLUMNS: &str = "id, feed_id, urls, title, author, content, feed_title, \
     favicon_url, date_published, date_created";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
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
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;

        conn.execute("PRAGMA foreign_keys = ON", [])?;
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

    fn feed_from_row(row: &Row<'_>) -> rusqlite::Result<Feed> {
        Ok(Feed {
            id: row.get(0)?,
            urls: urls_from_column(row, 1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            link: row.get(4)?,
            active: row.get::<_, i32>(5)? != 0,
            favicon_url: row.get(6)?,
            date_published: optional_datetime(row, 7)?,
            date_fetched: optional_datetime(row, 8)?,
            date_last_modified: optional_datetime(row, 9)?,
            error_count: row.get(10)?,
            deactivation_reason: row.get(11)?,
            deactivation_date: optional_datetime(row, 12)?,
            date_created: row
                .get::<_, String>(13)
                .ok()
                .and_then(|s| parse_datetime(&s))
                .unwrap_or_else(Utc::now),
            date_updated: optional_datetime(row, 14)?,
        })
    }

    fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Entry> {
        Ok(Entry {
            id: row.get(0)?,
            feed_id: row.get(1)?,
            urls: urls_from_column(row, 2)?,
            title: row.get(3)?,
            author: row.get(4)?,
            content: row.get(5)?,
            feed_title: row.get(6)?,
            favicon_url: row.get(7)?,
            date_published: optional_datetime(row, 8)?,
            date_created: row
                .get::<_, String>(9)
                .ok()
                .and_then(|s| parse_datetime(&s))
                .unwrap_or_else(Utc::now),
        })
    }

    fn insert_feed(tx: &Transaction<'_>, feed: &Feed) -> Result<i64> {
        tx.execute(
            "INSERT INTO feeds (urls, title, description, link, active, favicon_url,
                 date_published, date_fetched, date_last_modified, error_count,
                 deactivation_reason, deactivation_date, date_created, date_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                serde_json::to_string(&feed.urls)?,
                feed.title,
                feed.description,
                feed.link,
                feed.active as i32,
                feed.favicon_url,
                to_column(feed.date_published),
                to_column(feed.date_fetched),
                to_column(feed.date_last_modified),
                feed.error_count,
                feed.deactivation_reason,
                to_column(feed.deactivation_date),
                feed.date_created.to_rfc3339(),
                to_column(feed.date_updated),
            ],
        )?;
        Ok(tx.last_insert_rowid())
    }

    fn index_feed_urls(tx: &Transaction<'_>, feed_id: i64, urls: &UrlHistory) -> Result<()> {
        for url in urls.iter() {
            tx.execute(
                "INSERT OR IGNORE INTO feed_urls (url, feed_id) VALUES (?1, ?2)",
                params![url, feed_id],
            )?;
        }
        Ok(())
    }

    fn insert_entry(tx: &Transaction<'_>, entry: &Entry, urls_json: &str) -> rusqlite::Result<()> {
        tx.execute(
            "INSERT INTO entries (id, feed_id, urls, title, author, content, feed_title,
                 favicon_url, date_published, date_created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entry.id,
                entry.feed_id,
                urls_json,
                entry.title,
                entry.author,
                entry.content,
                entry.feed_title,
                entry.favicon_url,
                to_column(entry.date_published),
                entry.date_created.to_rfc3339(),
            ],
        )?;
        for url in entry.urls.iter() {
            tx.execute(
                "INSERT INTO entry_urls (url, entry_id) VALUES (?1, ?2)",
                params![url, entry.id],
            )?;
        }
        Ok(())
    }
}

impl Store for SqliteStore {
    fn add_feed(&self, feed: &Feed) -> Result<i64> {
        let url = feed
            .current_url()
            .ok_or_else(|| TributaryError::Invariant("feed has no URLs".into()))?
            .to_string();
        if self.get_feed_by_url(&url)?.is_some() {
            return Err(TributaryError::FeedExists(url));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let id = Self::insert_feed(&tx, feed)?;
        Self::index_feed_urls(&tx, id, &feed.urls)?;
        tx.commit()?;

        Ok(id)
    }

    fn get_feed(&self, id: i64) -> Result<Option<Feed>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                &format!("SELECT {} FROM feeds WHERE id = ?1", FEED_COLUMNS),
                params![id],
                Self::feed_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                &format!(
                    "SELECT {} FROM feeds WHERE id = (SELECT feed_id FROM feed_urls WHERE url = ?1)",
                    FEED_COLUMNS
                ),
                params![url],
                Self::feed_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn get_all_feeds(&self) -> Result<Vec<Feed>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM feeds ORDER BY title, id",
            FEED_COLUMNS
        ))?;

        let feeds = stmt
            .query_map([], Self::feed_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(feeds)
    }

    fn get_active_feeds(&self) -> Result<Vec<Feed>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM feeds WHERE active = 1 ORDER BY id",
            FEED_COLUMNS
        ))?;

        let feeds = stmt
            .query_map([], Self::feed_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(feeds)
    }

    fn upsert_feed(&self, feed: &Feed) -> Result<Feed> {
        if feed.urls.is_empty() {
            return Err(TributaryError::Invariant(format!(
                "feed {} has no URLs",
                feed.id
            )));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let id = if feed.id == 0 {
            Self::insert_feed(&tx, feed)?
        } else {
            let updated = tx.execute(
                "UPDATE feeds SET urls = ?1, title = ?2, description = ?3, link = ?4,
                     active = ?5, favicon_url = ?6, date_published = ?7, date_fetched = ?8,
                     date_last_modified = ?9, error_count = ?10, deactivation_reason = ?11,
                     deactivation_date = ?12, date_updated = ?13
                 WHERE id = ?14",
                params![
                    serde_json::to_string(&feed.urls)?,
                    feed.title,
                    feed.description,
                    feed.link,
                    feed.active as i32,
                    feed.favicon_url,
                    to_column(feed.date_published),
                    to_column(feed.date_fetched),
                    to_column(feed.date_last_modified),
                    feed.error_count,
                    feed.deactivation_reason,
                    to_column(feed.deactivation_date),
                    to_column(feed.date_updated),
                    feed.id,
                ],
            )?;
            if updated == 0 {
                return Err(TributaryError::FeedNotFound(feed.id.to_string()));
            }
            feed.id
        };

        Self::index_feed_urls(&tx, id, &feed.urls)?;
        tx.commit()?;

        let mut stored = feed.clone();
        stored.id = id;
        Ok(stored)
    }

    fn delete_feed(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;

        conn.execute("DELETE FROM feeds WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn entry_exists_by_url(&self, url: &str) -> Result<bool> {
        let conn = self.conn()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entry_urls WHERE url = ?1",
            params![url],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    fn create_entry(&self, entry: &Entry) -> Result<Entry> {
        let urls_json = serde_json::to_string(&entry.urls)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        match Self::insert_entry(&tx, entry, &urls_json) {
            Ok(()) => {
                tx.commit()?;
                Ok(entry.clone())
            }
            // Dropping the transaction rolls back the partial insert.
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Err(TributaryError::EntryExists(
                    entry.current_url().unwrap_or(&entry.id).to_string(),
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_entry(&self, id: &str) -> Result<Option<Entry>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                &format!("SELECT {} FROM entries WHERE id = ?1", ENTRY_COLUMNS),
                params![id],
                Self::entry_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn get_entries_by_feed(&self, feed_id: i64) -> Result<Vec<Entry>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM entries WHERE feed_id = ?1
             ORDER BY date_published DESC, date_created DESC",
            ENTRY_COLUMNS
        ))?;

        let entries = stmt
            .query_map(params![feed_id], Self::entry_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn count_entries(&self) -> Result<i64> {
        let conn = self.conn()?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn to_column(dt: Option<DateTime<Utc>>) -> Option<String> {
    dt.map(|dt| dt.to_rfc3339())
}

fn optional_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    Ok(row
        .get::<_, Option<String>>(idx)?
        .and_then(|s| parse_datetime(&s)))
}

fn urls_from_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<UrlHistory> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

//! SQLite archive of found performances.
//!
//! Every successful search replaces the performer's past shows: rows dated
//! before today are purged, then the new records are appended. Records are not
//! deduplicated.

use crate::config::Settings;
use crate::error::{GigscoutError, Result};
use crate::models::{PerformanceRecord, SearchRequest, SearchResponse};
use crate::orchestrator::PerformanceSearch;
use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDate, Utc};
use regex::Regex;
use rusqlite::{params, types::Type, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS performances (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    performer_name TEXT NOT NULL,
    performance_date TEXT NOT NULL,
    performance_time_text TEXT,
    venue TEXT NOT NULL,
    address TEXT NOT NULL,
    price_presale REAL,
    price_regular REAL,
    price_vip REAL,
    purchase_url TEXT NOT NULL,
    guests_json TEXT NOT NULL,
    source TEXT NOT NULL DEFAULT 'showstart',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_performances_performer_date
    ON performances(performer_name, performance_date);
"#;

/// A row read back from the archive.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivedPerformance {
    pub performer_name: String,
    pub performance_date: NaiveDate,
    pub time_text: Option<String>,
    pub venue: String,
    pub address: String,
    pub price_presale: Option<f64>,
    pub price_regular: Option<f64>,
    pub price_vip: Option<f64>,
    pub purchase_url: String,
    pub guests: Vec<String>,
    pub source: String,
}

/// Pulls a calendar date and a numeric price out of free text.
struct FieldPatterns {
    full_date: Regex,
    month_day: Regex,
    number: Regex,
}

impl FieldPatterns {
    fn new() -> Result<Self> {
        let compile = |p: &str| {
            Regex::new(p).map_err(|e| GigscoutError::Archive(format!("Invalid regex: {}", e)))
        };
        Ok(Self {
            full_date: compile(r"(20\d{2})[-/.](\d{1,2})[-/.](\d{1,2})")?,
            month_day: compile(r"(\d{1,2})\s*月\s*(\d{1,2})\s*日")?,
            number: compile(r"[0-9]+(?:\.[0-9]+)?")?,
        })
    }

    /// First date found in `text`; falls back to `today`.
    fn date(&self, text: &str, today: NaiveDate) -> NaiveDate {
        let num = |s: &str| s.parse::<u32>().ok();

        if let Some(caps) = self.full_date.captures(text) {
            let year = caps[1].parse::<i32>().ok();
            if let (Some(y), Some(m), Some(d)) = (year, num(&caps[2]), num(&caps[3])) {
                if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                    return date;
                }
            }
        }

        if let Some(caps) = self.month_day.captures(text) {
            if let (Some(m), Some(d)) = (num(&caps[1]), num(&caps[2])) {
                if let Some(date) = NaiveDate::from_ymd_opt(today.year(), m, d) {
                    return date;
                }
            }
        }

        today
    }

    /// First number in a price string such as `￥158起` or `¥199.00`.
    fn price(&self, text: Option<&str>) -> Option<f64> {
        self.number.find(text?)?.as_str().parse().ok()
    }
}

/// SQLite-backed performance archive.
pub struct PerformanceArchive {
    conn: Mutex<Connection>,
    source: String,
    patterns: FieldPatterns,
}

impl PerformanceArchive {
    /// Open (or create) the archive at `path`.
    #[instrument(skip_all)]
    pub fn open(path: &Path, source: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        info!("Opened performance archive at {:?}", path);
        Self::with_connection(conn, source)
    }

    /// Create an in-memory archive (useful for testing).
    pub fn in_memory(source: &str) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, source)
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::open(&settings.archive_path(), &settings.archive.source)
    }

    fn with_connection(conn: Connection, source: &str) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            source: source.to_string(),
            patterns: FieldPatterns::new()?,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| GigscoutError::Archive(format!("Failed to acquire lock: {}", e)))
    }

    /// Delete the performer's rows dated before `today`.
    pub fn cleanup_expired(&self, performer: &str, today: NaiveDate) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM performances WHERE performer_name = ?1 AND performance_date < ?2",
            params![performer, today.format("%Y-%m-%d").to_string()],
        )?;
        Ok(deleted)
    }

    /// Append one record.
    pub fn insert(&self, performer: &str, record: &PerformanceRecord, today: NaiveDate) -> Result<()> {
        let date = self.patterns.date(&record.date_range, today);
        let tier = |name: &str| self.patterns.price(record.ticket_prices.get(name));
        let guests_json = serde_json::to_string(&record.guests)?;
        let time_text = Some(record.date_range.as_str()).filter(|t| !t.trim().is_empty());

        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO performances (
                performer_name, performance_date, performance_time_text,
                venue, address, price_presale, price_regular, price_vip,
                purchase_url, guests_json, source, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                performer,
                date.format("%Y-%m-%d").to_string(),
                time_text,
                record.venue,
                record.address.as_deref().unwrap_or_default(),
                tier("presale"),
                tier("regular"),
                tier("vip"),
                record.source_url,
                guests_json,
                self.source,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Purge expired rows for `performer`, then append `records`.
    ///
    /// A failed insert is logged and skipped. Returns the number of rows written.
    pub fn store(&self, performer: &str, records: &[PerformanceRecord], today: NaiveDate) -> Result<usize> {
        match self.cleanup_expired(performer, today) {
            Ok(deleted) => debug!("Removed {} expired rows for {}", deleted, performer),
            Err(e) => warn!("Failed to remove expired rows for {}: {}", performer, e),
        }

        let mut inserted = 0;
        for record in records {
            match self.insert(performer, record, today) {
                Ok(()) => inserted += 1,
                Err(e) => warn!("Failed to archive {} at {}: {}", performer, record.venue, e),
            }
        }
        info!("Archived {} performances for {}", inserted, performer);
        Ok(inserted)
    }

    /// Rows for `performer`, ordered by date.
    pub fn performances(&self, performer: &str) -> Result<Vec<ArchivedPerformance>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT performer_name, performance_date, performance_time_text, venue, address,
                   price_presale, price_regular, price_vip, purchase_url, guests_json, source
            FROM performances
            WHERE performer_name = ?1
            ORDER BY performance_date, id
            "#,
        )?;

        let rows = stmt.query_map(params![performer], |row| {
            let date: String = row.get(1)?;
            let guests: String = row.get(9)?;
            Ok(ArchivedPerformance {
                performer_name: row.get(0)?,
                performance_date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .map_err(|e| conversion_error(1, e))?,
                time_text: row.get(2)?,
                venue: row.get(3)?,
                address: row.get(4)?,
                price_presale: row.get(5)?,
                price_regular: row.get(6)?,
                price_vip: row.get(7)?,
                purchase_url: row.get(8)?,
                guests: serde_json::from_str(&guests).map_err(|e| conversion_error(9, e))?,
                source: row.get(10)?,
            })
        })?;

        let performances = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(performances)
    }
}

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

/// Writes every successful response into a [`PerformanceArchive`].
///
/// Archive failures are logged and never change the response.
pub struct ArchivingSearch<S> {
    inner: S,
    archive: Arc<PerformanceArchive>,
}

impl<S: PerformanceSearch> ArchivingSearch<S> {
    pub fn new(inner: S, archive: Arc<PerformanceArchive>) -> Self {
        Self { inner, archive }
    }
}

#[async_trait]
impl<S: PerformanceSearch> PerformanceSearch for ArchivingSearch<S> {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let response = self.inner.search(request).await?;
        if response.success {
            let archive = self.archive.clone();
            let performer = response.performer_name.clone();
            let records = response.performances.clone();
            let today = Local::now().date_naive();

            let stored =
                tokio::task::spawn_blocking(move || archive.store(&performer, &records, today)).await;
            match stored {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("Failed to archive results for {}: {}", response.performer_name, e),
                Err(e) => warn!("Archive writer for {} did not finish: {}", response.performer_name, e),
            }
        }
        Ok(response)
    }
}

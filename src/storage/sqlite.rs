//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::extract::Record;
use crate::state::JobStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{CrawlJob, DedupKey, RecordFilter, StoredRecord};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const RECORD_COLUMNS: &str =
    "id, name, phone, address, institution, organization, source_url, scraped_at, metadata";

const JOB_COLUMNS: &str = "url, status, last_crawled, pages_crawled, error_message";

/// SQLite storage backend
///
/// The connection sits behind a mutex so one instance can be shared
/// between tasks.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        tracing::debug!("Opened database at {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

impl Storage for SqliteStorage {
    // ===== Records =====

    fn find_record(&self, key: &DedupKey<'_>) -> StorageResult<Option<i64>> {
        let conn = self.conn()?;

        let id = match key {
            DedupKey::Name { source_url, name } => conn
                .query_row(
                    "SELECT id FROM records WHERE source_url = ?1 AND name = ?2 LIMIT 1",
                    params![source_url, name],
                    |row| row.get(0),
                )
                .optional()?,
            DedupKey::Phone { source_url, phone } => conn
                .query_row(
                    "SELECT id FROM records WHERE source_url = ?1 AND phone = ?2 LIMIT 1",
                    params![source_url, phone],
                    |row| row.get(0),
                )
                .optional()?,
            DedupKey::SourceOnly { source_url } => conn
                .query_row(
                    "SELECT id FROM records WHERE source_url = ?1 LIMIT 1",
                    params![source_url],
                    |row| row.get(0),
                )
                .optional()?,
        };

        Ok(id)
    }

    fn insert_record(&self, record: &Record) -> StorageResult<i64> {
        let metadata = serde_json::to_string(&record.metadata)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO records
                (name, phone, address, institution, organization, source_url, scraped_at, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.name,
                record.phone,
                record.address,
                record.institution,
                record.organization,
                record.source_url,
                timestamp(&record.scraped_at),
                metadata,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn search_records(
        &self,
        filter: &RecordFilter,
        limit: usize,
    ) -> StorageResult<Vec<StoredRecord>> {
        let (where_clause, values) = build_search_clause(filter);
        let sql = format!(
            "SELECT {} FROM records {} ORDER BY id LIMIT {}",
            RECORD_COLUMNS, where_clause, limit
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), RecordRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(RecordRow::into_stored).collect()
    }

    fn get_record(&self, id: i64) -> StorageResult<Option<StoredRecord>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM records WHERE id = ?1", RECORD_COLUMNS),
                params![id],
                RecordRow::from_row,
            )
            .optional()?;

        row.map(RecordRow::into_stored).transpose()
    }

    fn count_matching_records(&self, filter: &RecordFilter) -> StorageResult<u64> {
        let (where_clause, values) = build_search_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM records {}", where_clause);

        let conn = self.conn()?;
        let count: i64 = conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_records(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Crawl Jobs =====

    fn get_job(&self, url: &str) -> StorageResult<Option<CrawlJob>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM crawl_jobs WHERE url = ?1", JOB_COLUMNS),
                params![url],
                JobRow::from_row,
            )
            .optional()?;

        row.map(JobRow::into_job).transpose()
    }

    fn upsert_job(&self, job: &CrawlJob) -> StorageResult<()> {
        let now = timestamp(&Utc::now());
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO crawl_jobs (url, status, last_crawled, pages_crawled, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(url) DO UPDATE SET
                status = excluded.status,
                last_crawled = excluded.last_crawled,
                pages_crawled = excluded.pages_crawled,
                error_message = excluded.error_message",
            params![
                job.url,
                job.status.to_db_string(),
                now,
                job.pages_crawled as i64,
                job.error_message,
            ],
        )?;
        Ok(())
    }

    fn count_jobs(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM crawl_jobs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_jobs_by_status(&self, status: JobStatus) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM crawl_jobs WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn latest_completed_job(&self) -> StorageResult<Option<CrawlJob>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM crawl_jobs
                     WHERE status = ?1 AND last_crawled IS NOT NULL
                     ORDER BY last_crawled DESC, id DESC LIMIT 1",
                    JOB_COLUMNS
                ),
                params![JobStatus::Completed.to_db_string()],
                JobRow::from_row,
            )
            .optional()?;

        row.map(JobRow::into_job).transpose()
    }

    // ===== Response Cache =====

    fn cache_get(&self, key: &str) -> StorageResult<Option<String>> {
        let conn = self.conn()?;
        let entry: Option<(String, String)> = conn
            .query_row(
                "SELECT value, expires_at FROM response_cache WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((value, expires_at)) = entry else {
            return Ok(None);
        };

        if expires_at <= timestamp(&Utc::now()) {
            conn.execute("DELETE FROM response_cache WHERE key = ?1", params![key])?;
            return Ok(None);
        }

        Ok(Some(value))
    }

    fn cache_put(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<()> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StorageError::Database(format!("invalid cache ttl: {}", e)))?;
        let now = Utc::now();

        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO response_cache (key, value, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![key, value, timestamp(&now), timestamp(&(now + ttl))],
        )?;
        Ok(())
    }

    fn purge_expired_cache(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM response_cache WHERE expires_at <= ?1",
            params![timestamp(&Utc::now())],
        )?;
        Ok(removed as u64)
    }
}

/// Fixed-width RFC 3339 timestamp, so stored values sort chronologically
fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Database(format!("invalid timestamp {:?}: {}", value, e)))
}

/// Escapes LIKE wildcards and wraps the term for substring matching
fn like_pattern(term: &str) -> String {
    let escaped = term
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Builds the WHERE clause and its bound values for a search
fn build_search_clause(filter: &RecordFilter) -> (String, Vec<Value>) {
    let mut values = Vec::new();

    let field_conditions: Vec<String> = filter
        .field_terms()
        .into_iter()
        .map(|(field, term)| {
            values.push(Value::Text(like_pattern(term)));
            format!(
                "LOWER(COALESCE({}, '')) LIKE ?{} ESCAPE '\\'",
                field.as_str(),
                values.len()
            )
        })
        .collect();

    let metadata_conditions: Vec<String> = filter
        .all_terms()
        .into_iter()
        .map(|term| {
            values.push(Value::Text(like_pattern(term)));
            format!("LOWER(metadata) LIKE ?{} ESCAPE '\\'", values.len())
        })
        .collect();

    let clause = match (field_conditions.is_empty(), metadata_conditions.is_empty()) {
        (_, true) if filter.details_only => {
            "WHERE metadata <> '{}' OR institution IS NOT NULL".to_string()
        }
        (_, true) => String::new(),
        (true, false) => format!("WHERE {}", metadata_conditions.join(" OR ")),
        (false, false) => format!(
            "WHERE ({}) OR ({})",
            field_conditions.join(" AND "),
            metadata_conditions.join(" OR ")
        ),
    };

    (clause, values)
}

struct RecordRow {
    id: i64,
    name: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    institution: Option<String>,
    organization: Option<String>,
    source_url: String,
    scraped_at: String,
    metadata: String,
}

impl RecordRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            phone: row.get(2)?,
            address: row.get(3)?,
            institution: row.get(4)?,
            organization: row.get(5)?,
            source_url: row.get(6)?,
            scraped_at: row.get(7)?,
            metadata: row.get(8)?,
        })
    }

    fn into_stored(self) -> StorageResult<StoredRecord> {
        let metadata: BTreeMap<String, String> = serde_json::from_str(&self.metadata)?;
        Ok(StoredRecord {
            id: self.id,
            record: Record {
                name: self.name,
                phone: self.phone,
                address: self.address,
                institution: self.institution,
                organization: self.organization,
                source_url: self.source_url,
                scraped_at: parse_timestamp(&self.scraped_at)?,
                metadata,
            },
        })
    }
}

struct JobRow {
    url: String,
    status: String,
    last_crawled: Option<String>,
    pages_crawled: i64,
    error_message: Option<String>,
}

impl JobRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            url: row.get(0)?,
            status: row.get(1)?,
            last_crawled: row.get(2)?,
            pages_crawled: row.get(3)?,
            error_message: row.get(4)?,
        })
    }

    fn into_job(self) -> StorageResult<CrawlJob> {
        let status = JobStatus::from_db_string(&self.status)
            .ok_or_else(|| StorageError::Database(format!("unknown job status {:?}", self.status)))?;
        let last_crawled = self
            .last_crawled
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;

        Ok(CrawlJob {
            url: self.url,
            status,
            last_crawled,
            pages_crawled: self.pages_crawled.max(0) as u64,
            error_message: self.error_message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Field;

    fn storage() -> SqliteStorage {
        SqliteStorage::new_in_memory().unwrap()
    }

    fn asma() -> Record {
        let mut record = Record::new("https://example.edu/list")
            .with(Field::Name, "Asma Khan")
            .with(Field::Phone, "03001234567")
            .with(Field::Institution, "Model College");
        record.metadata.insert("grade".to_string(), "A+".to_string());
        record
    }

    #[test]
    fn test_create_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("records.db");
        let storage = SqliteStorage::new(&path).unwrap();
        assert_eq!(storage.count_records().unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn test_insert_and_find_record() {
        let storage = storage();
        let record = asma();

        assert_eq!(storage.find_record(&DedupKey::for_record(&record)).unwrap(), None);
        let id = storage.insert_record(&record).unwrap();
        assert!(id > 0);
        assert_eq!(
            storage.find_record(&DedupKey::for_record(&record)).unwrap(),
            Some(id)
        );
        assert_eq!(
            storage
                .find_record(&DedupKey::Phone {
                    source_url: "https://example.edu/list",
                    phone: "03001234567"
                })
                .unwrap(),
            Some(id)
        );
    }

    #[test]
    fn test_search_roundtrips_record() {
        let storage = storage();
        let record = asma();
        storage.insert_record(&record).unwrap();

        let filter = RecordFilter {
            name: Some("asma".to_string()),
            ..Default::default()
        };
        let results = storage.search_records(&filter, 10).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.name, record.name);
        assert_eq!(results[0].record.metadata, record.metadata);
        assert_eq!(
            results[0].record.scraped_at.timestamp_micros(),
            record.scraped_at.timestamp_micros()
        );
    }

    #[test]
    fn test_search_fields_are_anded() {
        let storage = storage();
        storage.insert_record(&asma()).unwrap();

        let filter = RecordFilter {
            name: Some("Asma".to_string()),
            phone: Some("9999".to_string()),
            ..Default::default()
        };
        assert!(storage.search_records(&filter, 10).unwrap().is_empty());

        let filter = RecordFilter {
            name: Some("KHAN".to_string()),
            institution: Some("college".to_string()),
            ..Default::default()
        };
        assert_eq!(storage.search_records(&filter, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_search_matches_metadata() {
        let storage = storage();
        storage.insert_record(&asma()).unwrap();

        let filter = RecordFilter {
            metadata_terms: vec!["a+".to_string()],
            ..Default::default()
        };
        assert_eq!(storage.search_records(&filter, 10).unwrap().len(), 1);

        // A field term that misses its column can still hit metadata
        let filter = RecordFilter {
            organization: Some("grade".to_string()),
            ..Default::default()
        };
        assert_eq!(storage.search_records(&filter, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_search_wildcards_are_literal() {
        let storage = storage();
        storage.insert_record(&asma()).unwrap();

        let filter = RecordFilter {
            name: Some("%".to_string()),
            ..Default::default()
        };
        assert!(storage.search_records(&filter, 10).unwrap().is_empty());
    }

    #[test]
    fn test_get_record_and_count_matching() {
        let storage = storage();
        let id = storage.insert_record(&asma()).unwrap();
        storage
            .insert_record(&Record::new("https://example.edu/other").with(Field::Name, "Bilal Ahmed"))
            .unwrap();

        let stored = storage.get_record(id).unwrap().unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.record.name.as_deref(), Some("Asma Khan"));
        assert!(storage.get_record(id + 100).unwrap().is_none());

        let filter = RecordFilter {
            name: Some("khan".to_string()),
            ..Default::default()
        };
        assert_eq!(storage.count_matching_records(&filter).unwrap(), 1);
        assert_eq!(storage.count_matching_records(&RecordFilter::default()).unwrap(), 2);
    }

    #[test]
    fn test_details_only_filter() {
        let storage = storage();
        storage.insert_record(&asma()).unwrap();
        storage
            .insert_record(&Record::new("https://example.edu/b").with(Field::Name, "Bilal Ahmed"))
            .unwrap();
        storage
            .insert_record(
                &Record::new("https://example.edu/c")
                    .with(Field::Name, "Sara Malik")
                    .with(Field::Institution, "Model College"),
            )
            .unwrap();

        let filter = RecordFilter {
            details_only: true,
            ..Default::default()
        };
        let mut sources: Vec<String> = storage
            .search_records(&filter, 10)
            .unwrap()
            .into_iter()
            .map(|stored| stored.record.source_url)
            .collect();
        sources.sort();
        assert_eq!(sources, vec!["https://example.edu/c".to_string(), asma().source_url]);
        assert_eq!(storage.count_matching_records(&filter).unwrap(), 2);
    }

    #[test]
    fn test_search_limit_and_empty_filter() {
        let storage = storage();
        for i in 0..5 {
            let record = Record::new(&format!("https://example.edu/{}", i)).with(Field::Name, "Asma Khan");
            storage.insert_record(&record).unwrap();
        }

        assert_eq!(storage.search_records(&RecordFilter::default(), 3).unwrap().len(), 3);
        assert_eq!(storage.count_records().unwrap(), 5);
    }

    #[test]
    fn test_job_upsert_and_get() {
        let storage = storage();
        assert!(storage.get_job("https://example.edu/").unwrap().is_none());

        let mut job = CrawlJob::new("https://example.edu/");
        job.begin().unwrap();
        storage.upsert_job(&job).unwrap();

        let stored = storage.get_job("https://example.edu/").unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Running);
        assert!(stored.last_crawled.is_some());

        job.fail("timeout").unwrap();
        storage.upsert_job(&job).unwrap();

        let stored = storage.get_job("https://example.edu/").unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some("timeout"));
        assert_eq!(storage.count_jobs().unwrap(), 1);
    }

    #[test]
    fn test_job_counts_and_latest_completed() {
        let storage = storage();
        assert!(storage.latest_completed_job().unwrap().is_none());

        for (url, pages) in [("https://example.edu/a", 1), ("https://example.edu/b", 4)] {
            let mut job = CrawlJob::new(url);
            job.begin().unwrap();
            job.complete(pages).unwrap();
            storage.upsert_job(&job).unwrap();
        }
        let mut failed = CrawlJob::new("https://example.edu/c");
        failed.begin().unwrap();
        failed.fail("boom").unwrap();
        storage.upsert_job(&failed).unwrap();

        assert_eq!(storage.count_jobs().unwrap(), 3);
        assert_eq!(storage.count_jobs_by_status(JobStatus::Completed).unwrap(), 2);
        assert_eq!(storage.count_jobs_by_status(JobStatus::Failed).unwrap(), 1);
        assert_eq!(storage.count_jobs_by_status(JobStatus::Running).unwrap(), 0);

        let latest = storage.latest_completed_job().unwrap().unwrap();
        assert_eq!(latest.url, "https://example.edu/b");
        assert_eq!(latest.pages_crawled, 4);
    }

    #[test]
    fn test_cache_put_get() {
        let storage = storage();
        assert_eq!(storage.cache_get("k").unwrap(), None);

        storage.cache_put("k", "[1,2]", Duration::from_secs(3600)).unwrap();
        assert_eq!(storage.cache_get("k").unwrap().as_deref(), Some("[1,2]"));

        storage.cache_put("k", "[3]", Duration::from_secs(3600)).unwrap();
        assert_eq!(storage.cache_get("k").unwrap().as_deref(), Some("[3]"));
    }

    #[test]
    fn test_expired_cache_entry_removed_on_read() {
        let storage = storage();
        storage.cache_put("stale", "x", Duration::ZERO).unwrap();

        assert_eq!(storage.cache_get("stale").unwrap(), None);
        // Already deleted by the read
        assert_eq!(storage.purge_expired_cache().unwrap(), 0);
    }

    #[test]
    fn test_purge_expired_cache() {
        let storage = storage();
        storage.cache_put("a", "x", Duration::ZERO).unwrap();
        storage.cache_put("b", "x", Duration::ZERO).unwrap();
        storage.cache_put("c", "x", Duration::from_secs(3600)).unwrap();

        assert_eq!(storage.purge_expired_cache().unwrap(), 2);
        assert_eq!(storage.cache_get("c").unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn test_like_pattern_escapes() {
        assert_eq!(like_pattern("Asma"), "%asma%");
        assert_eq!(like_pattern("50%_"), "%50\\%\\_%");
    }
}

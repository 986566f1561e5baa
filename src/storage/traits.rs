//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::extract::Record;
use crate::state::JobStatus;
use crate::storage::{CrawlJob, DedupKey, RecordFilter, StoredRecord};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Methods take `&self`; implementations serialize access internally so a
/// single store can be shared as `Arc<dyn Storage>` between tasks.
pub trait Storage: Send + Sync {
    // ===== Records =====

    /// Looks up a stored record by its deduplication key
    ///
    /// # Returns
    ///
    /// The ID of a matching record, if any
    fn find_record(&self, key: &DedupKey<'_>) -> StorageResult<Option<i64>>;

    /// Inserts a record unconditionally and returns its ID
    fn insert_record(&self, record: &Record) -> StorageResult<i64>;

    /// Finds records matching `filter`, at most `limit` of them
    fn search_records(&self, filter: &RecordFilter, limit: usize)
        -> StorageResult<Vec<StoredRecord>>;

    /// Gets a stored record by ID
    fn get_record(&self, id: i64) -> StorageResult<Option<StoredRecord>>;

    /// Counts records matching `filter`
    fn count_matching_records(&self, filter: &RecordFilter) -> StorageResult<u64>;

    /// Counts all stored records
    fn count_records(&self) -> StorageResult<u64>;

    // ===== Crawl Jobs =====

    /// Gets the job for a URL
    fn get_job(&self, url: &str) -> StorageResult<Option<CrawlJob>>;

    /// Inserts or replaces the job for `job.url`
    ///
    /// `last_crawled` is set to the current time on every call.
    fn upsert_job(&self, job: &CrawlJob) -> StorageResult<()>;

    fn count_jobs(&self) -> StorageResult<u64>;

    fn count_jobs_by_status(&self, status: JobStatus) -> StorageResult<u64>;

    /// Gets the completed job with the most recent `last_crawled`
    fn latest_completed_job(&self) -> StorageResult<Option<CrawlJob>>;

    // ===== Response Cache =====

    /// Gets a cached value; expired entries are deleted and not returned
    fn cache_get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores a value that expires after `ttl`
    fn cache_put(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<()>;

    /// Deletes every expired cache entry and returns how many were removed
    fn purge_expired_cache(&self) -> StorageResult<u64>;
}

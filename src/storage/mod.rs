//! Storage module for persisting records, crawl jobs and cached responses
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Record persistence with (source URL, name | phone) deduplication
//! - Crawl job bookkeeping
//! - An expiring response cache

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::extract::{Field, Record};
use crate::state::JobStatus;
use crate::SweepError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Words that mark an otherwise empty query as asking about results
const DETAIL_QUERY_WORDS: [&str; 7] = ["position", "rank", "result", "grade", "score", "board", "year"];

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Saves a record unless an equivalent one is already stored
///
/// Equivalence is decided by [`DedupKey::for_record`]. The lookup and the
/// insert are separate operations, so two concurrent saves of the same
/// record may both insert.
///
/// # Returns
///
/// * `Ok(true)` - The record was inserted
/// * `Ok(false)` - A matching record already existed
pub fn save_record(store: &dyn Storage, record: &Record) -> StorageResult<bool> {
    let key = DedupKey::for_record(record);
    if store.find_record(&key)?.is_some() {
        tracing::trace!("Skipping duplicate record from {}", record.source_url);
        return Ok(false);
    }

    store.insert_record(record)?;
    Ok(true)
}

/// Lookup key used to detect an already stored record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupKey<'a> {
    Name { source_url: &'a str, name: &'a str },
    Phone { source_url: &'a str, phone: &'a str },
    SourceOnly { source_url: &'a str },
}

impl<'a> DedupKey<'a> {
    /// Source URL plus name, else source URL plus phone, else source URL
    pub fn for_record(record: &'a Record) -> Self {
        let source_url = record.source_url.as_str();
        if let Some(name) = record.get(Field::Name) {
            Self::Name { source_url, name }
        } else if let Some(phone) = record.get(Field::Phone) {
            Self::Phone { source_url, phone }
        } else {
            Self::SourceOnly { source_url }
        }
    }
}

/// A record as read back from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: i64,
    #[serde(flatten)]
    pub record: Record,
}

/// Attribute search criteria
///
/// Standard terms must all match their field (case-insensitive substring).
/// A record whose metadata mentions any term also matches.
/// A filter without terms matches every record, or only records with
/// details when `details_only` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub institution: Option<String>,
    pub organization: Option<String>,

    /// Terms that only match against metadata
    pub metadata_terms: Vec<String>,

    /// Restricts a term-less filter to records with metadata or an institution
    pub details_only: bool,
}

impl RecordFilter {
    /// Builds a filter from an attribute map
    ///
    /// Keys naming a standard field become field terms; other keys become
    /// metadata terms. Blank values are ignored. When no term is left and a
    /// key or value mentions positions, ranks, grades and the like, the
    /// filter is restricted to records with details.
    pub fn from_attributes(attributes: &BTreeMap<String, String>) -> Self {
        let mut filter = Self::default();
        for (key, value) in attributes {
            if value.trim().is_empty() {
                continue;
            }
            match Field::from_name(&key.to_lowercase()) {
                Some(field) => filter.set(field, value.clone()),
                None => filter.metadata_terms.push(value.clone()),
            }
        }

        if filter.is_empty() {
            filter.details_only = attributes
                .iter()
                .any(|(key, value)| mentions_details(key) || mentions_details(value));
        }
        filter
    }

    pub fn set(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::Name => &mut self.name,
            Field::Phone => &mut self.phone,
            Field::Address => &mut self.address,
            Field::Institution => &mut self.institution,
            Field::Organization => &mut self.organization,
        };
        *slot = Some(value);
    }

    /// Non-blank standard field terms
    pub fn field_terms(&self) -> Vec<(Field, &str)> {
        Field::all()
            .into_iter()
            .filter_map(|field| {
                let value = match field {
                    Field::Name => &self.name,
                    Field::Phone => &self.phone,
                    Field::Address => &self.address,
                    Field::Institution => &self.institution,
                    Field::Organization => &self.organization,
                };
                value
                    .as_deref()
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(|v| (field, v))
            })
            .collect()
    }

    /// Every term that is matched against metadata
    pub fn all_terms(&self) -> Vec<&str> {
        let mut terms: Vec<&str> = self.field_terms().into_iter().map(|(_, v)| v).collect();
        terms.extend(
            self.metadata_terms
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty()),
        );
        terms
    }

    pub fn is_empty(&self) -> bool {
        self.all_terms().is_empty()
    }
}

fn mentions_details(text: &str) -> bool {
    let text = text.to_lowercase();
    DETAIL_QUERY_WORDS.iter().any(|word| text.contains(word))
}

/// One crawl job per URL
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlJob {
    pub url: String,
    pub status: JobStatus,
    pub last_crawled: Option<DateTime<Utc>>,
    pub pages_crawled: u64,
    pub error_message: Option<String>,
}

impl CrawlJob {
    /// Creates a pending job for `url`
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            status: JobStatus::Pending,
            last_crawled: None,
            pages_crawled: 0,
            error_message: None,
        }
    }

    /// Moves the job to `Running` and clears the previous outcome
    pub fn begin(&mut self) -> crate::Result<()> {
        self.transition(JobStatus::Running)?;
        self.pages_crawled = 0;
        self.error_message = None;
        Ok(())
    }

    /// Marks the attempt as completed with the subtree's page count
    pub fn complete(&mut self, pages_crawled: u64) -> crate::Result<()> {
        self.transition(JobStatus::Completed)?;
        self.pages_crawled = pages_crawled;
        Ok(())
    }

    /// Marks the attempt as failed
    pub fn fail(&mut self, error: impl Into<String>) -> crate::Result<()> {
        self.transition(JobStatus::Failed)?;
        self.error_message = Some(error.into());
        Ok(())
    }

    fn transition(&mut self, next: JobStatus) -> crate::Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(SweepError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

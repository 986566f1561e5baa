//! Attribute search over stored records
//!
//! Attribute maps (the shape a query-understanding layer produces, e.g.
//! `{"name": "asma", "institution": "model college"}`) are turned into a
//! [`RecordFilter`] and run against the store. Results of attribute
//! searches are cached in the store's response cache.

use crate::config::StorageConfig;
use crate::storage::{RecordFilter, Storage, StorageResult, StoredRecord};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Result limit used when the caller does not give one
pub const DEFAULT_LIMIT: usize = 50;

/// Cache key for a query and its context
///
/// The query is lowercased and trimmed. The key is the hex SHA-256 of the
/// JSON object `{"context": .., "query": ..}` with sorted keys.
pub fn cache_key(query: &str, context: &Value) -> String {
    let payload = json!({
        "context": context,
        "query": query.trim().to_lowercase(),
    });

    let mut hasher = Sha256::new();
    hasher.update(payload.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Record search with an expiring result cache
pub struct SearchService {
    store: Arc<dyn Storage>,
    ttl: Duration,
}

impl SearchService {
    pub fn new(store: Arc<dyn Storage>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Creates a service using the configured cache lifetime
    pub fn from_config(config: &StorageConfig, store: Arc<dyn Storage>) -> Self {
        let ttl = Duration::from_secs(config.cache_ttl_hours.saturating_mul(3600));
        Self::new(store, ttl)
    }

    /// Runs `filter` against the store, bypassing the cache
    pub fn search(&self, filter: &RecordFilter, limit: usize) -> StorageResult<Vec<StoredRecord>> {
        self.store.search_records(filter, limit)
    }

    /// Searches by an attribute map, serving repeated queries from cache
    ///
    /// Keys naming a standard field match that field; any other key only
    /// matches metadata. A map without usable values that asks about
    /// positions, ranks, grades and the like returns records that carry
    /// metadata or an institution. Cache failures are logged and the search
    /// runs uncached.
    pub fn search_by_attributes(
        &self,
        attributes: &BTreeMap<String, String>,
        limit: usize,
    ) -> StorageResult<Vec<StoredRecord>> {
        let filter = RecordFilter::from_attributes(attributes);
        let key = attribute_cache_key(attributes, &filter, limit);

        match self.store.cache_get(&key) {
            Ok(Some(cached)) => match serde_json::from_str(&cached) {
                Ok(records) => {
                    tracing::debug!("Search served from cache");
                    return Ok(records);
                }
                Err(e) => tracing::warn!("Discarding unreadable cache entry: {}", e),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!("Cache lookup failed: {}", e),
        }

        let records = self.store.search_records(&filter, limit)?;
        tracing::debug!("Search matched {} records", records.len());

        match serde_json::to_string(&records) {
            Ok(value) => {
                if let Err(e) = self.store.cache_put(&key, &value, self.ttl) {
                    tracing::warn!("Failed to cache search results: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize search results: {}", e),
        }

        Ok(records)
    }

    pub fn get_by_id(&self, id: i64) -> StorageResult<Option<StoredRecord>> {
        self.store.get_record(id)
    }

    /// Counts the records matching `filter`
    pub fn count_results(&self, filter: &RecordFilter) -> StorageResult<u64> {
        self.store.count_matching_records(filter)
    }

    /// Removes expired cache entries
    pub fn purge_cache(&self) -> StorageResult<u64> {
        let removed = self.store.purge_expired_cache()?;
        if removed > 0 {
            tracing::info!("Purged {} expired cache entries", removed);
        }
        Ok(removed)
    }
}

fn attribute_cache_key(
    attributes: &BTreeMap<String, String>,
    filter: &RecordFilter,
    limit: usize,
) -> String {
    let query = attributes
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(key, value)| format!("{}={}", key.trim(), value.trim()))
        .collect::<Vec<_>>()
        .join("&");

    let context = json!({
        "action": "search",
        "details_only": filter.details_only,
        "limit": limit,
    });
    cache_key(&query, &context)
}

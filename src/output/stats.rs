//! Status report generation from the record database
//!
//! This module provides functionality for extracting and displaying
//! record and crawl job statistics from the storage layer.

use crate::state::JobStatus;
use crate::storage::{Storage, StorageResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// The most recently completed crawl job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastCrawl {
    pub url: String,
    pub last_crawled: Option<DateTime<Utc>>,
    pub pages_crawled: u64,
}

/// Record and crawl job statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    /// Total number of stored records
    pub total_records: u64,

    /// Total number of crawl jobs
    pub crawl_jobs: u64,

    /// Count of jobs by status
    pub jobs_by_status: BTreeMap<String, u64>,

    /// Completed job with the latest crawl time
    pub last_crawl: Option<LastCrawl>,
}

/// Loads the status report from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(StatusReport)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_status(storage: &dyn Storage) -> StorageResult<StatusReport> {
    let total_records = storage.count_records()?;
    let crawl_jobs = storage.count_jobs()?;

    let mut jobs_by_status = BTreeMap::new();
    for status in JobStatus::all() {
        let count = storage.count_jobs_by_status(status)?;
        if count > 0 {
            jobs_by_status.insert(status.to_db_string().to_string(), count);
        }
    }

    let last_crawl = storage.latest_completed_job()?.map(|job| LastCrawl {
        url: job.url,
        last_crawled: job.last_crawled,
        pages_crawled: job.pages_crawled,
    });

    Ok(StatusReport {
        total_records,
        crawl_jobs,
        jobs_by_status,
        last_crawl,
    })
}

/// Prints the status report to stdout in a formatted manner
pub fn print_status(report: &StatusReport) {
    println!("=== Record Sweep Status ===\n");

    println!("Overview:");
    println!("  Total records: {}", report.total_records);
    println!("  Crawl jobs: {}", report.crawl_jobs);
    println!();

    if !report.jobs_by_status.is_empty() {
        println!("Jobs by Status:");
        let mut counts: Vec<_> = report.jobs_by_status.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1));

        for (status, count) in counts {
            let percentage = if report.crawl_jobs > 0 {
                (*count as f64 / report.crawl_jobs as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", status, count, percentage);
        }
        println!();
    }

    match &report.last_crawl {
        Some(last) => {
            let when = last
                .last_crawled
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string());
            println!("Last Crawl: {} at {} ({} pages)", last.url, when, last.pages_crawled);
        }
        None => println!("Last Crawl: none"),
    }
}

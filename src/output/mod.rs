//! Output module for reporting on stored records and crawl jobs

pub mod stats;

pub use stats::{load_status, print_status, LastCrawl, StatusReport};

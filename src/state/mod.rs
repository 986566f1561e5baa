//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `JobStatus`: Lifecycle of a crawl job (pending, running, completed, failed)

mod job_state;

pub use job_state::JobStatus;

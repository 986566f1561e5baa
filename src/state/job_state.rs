/// Crawl job status definitions
///
/// Every crawled URL owns one job row whose status follows
/// `pending -> running -> {completed | failed}`; a later attempt moves a
/// finished job back to `running`.
use std::fmt;

/// Represents the current status of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    /// Job exists but no attempt has started
    Pending,

    /// An attempt is in progress
    Running,

    /// The last attempt finished without error
    Completed,

    /// The last attempt stopped on an error
    Failed,
}

impl JobStatus {
    /// Checks whether moving from this status to `next` is legal
    ///
    /// A job may only finish from `Running`, and may only start (again)
    /// from a non-running status.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (Self::Running, Self::Completed | Self::Failed) => true,
            (Self::Pending | Self::Completed | Self::Failed, Self::Running) => true,
            _ => false,
        }
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all statuses
    pub fn all() -> [Self; 4] {
        [Self::Pending, Self::Running, Self::Completed, Self::Failed]
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

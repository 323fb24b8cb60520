//! Job Queue Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A job error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for queue and worker operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The queue backend (broker connection, stream command) failed.
    #[display("queue error")]
    Queue,
    /// A job payload could not be (de)serialized.
    #[display("invalid job payload")]
    Serialization,
    /// The scan phase of a job failed (fail-fast traversal error).
    #[display("scan failed")]
    Scan,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Queue | Self::Scan)
    }
}

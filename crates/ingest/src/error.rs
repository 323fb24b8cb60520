//! Ingestion Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Only failures that abort an entire operation become errors here. The
//! per-group, per-file and per-archive-entry failures described in the
//! ingestion contracts are contained where they happen: logged, counted
//! in the summary, and never raised.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// An ingestion error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A catalog lookup or upsert that the operation cannot proceed
    /// without (resolving the library, upserting the destination model).
    #[display("catalog error")]
    Catalog,
    /// The destination directory could not be created or written.
    #[display("storage error: {}", _0.display())]
    Storage(#[error(not(source))] PathBuf),
    /// Underlying I/O error.
    #[display("I/O error: {_0}")]
    Io(IoError),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

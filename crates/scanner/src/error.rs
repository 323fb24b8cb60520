//! Scanner Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A scanner error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for scanner operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// The scanner is deliberately fail-fast: any of these aborts the whole
/// walk and surfaces to the caller as a failed scan. Per-item tolerance
/// lives one layer up, in reconciliation.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The scan root does not exist or is not a directory.
    #[display("invalid scan root: {}", _0.display())]
    InvalidRoot(#[error(not(source))] PathBuf),
    /// Access denied somewhere under the scan root.
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Underlying I/O error during traversal or hashing.
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

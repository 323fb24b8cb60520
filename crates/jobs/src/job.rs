//! The scan job payload.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// One request to scan a library root, as carried by the queue.
///
/// The id is assigned at submission time and handed back to the caller
/// as an opaque receipt; there is no status contract behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanJob {
    pub id: Uuid,
    pub library_id: i64,
    pub root: PathBuf,
}

impl ScanJob {
    pub fn new(library_id: i64, root: impl Into<PathBuf>) -> Self {
        Self { id: Uuid::new_v4(), library_id, root: root.into() }
    }

    /// Serialize for transport over a broker.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).or_raise(|| ErrorKind::Serialization)
    }

    /// Deserialize a payload received from a broker.
    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).or_raise(|| ErrorKind::Serialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_round_trip() {
        let job = ScanJob::new(7, "/srv/library");
        let json = job.to_json().unwrap();
        assert_eq!(ScanJob::from_json(&json).unwrap(), job);
    }

    #[test]
    fn test_each_submission_gets_a_fresh_id() {
        let a = ScanJob::new(1, "/srv/library");
        let b = ScanJob::new(1, "/srv/library");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_garbage_payload_is_rejected() {
        assert!(ScanJob::from_json("{not json").is_err());
    }
}

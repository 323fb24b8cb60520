//! Ingestion: turning observed files into catalog rows.
//!
//! Two front doors, one core. The background scan path feeds a whole
//! walked tree through [`reconcile`] with
//! [`NamePolicy::PreserveExisting`](trove_catalog::NamePolicy); the
//! upload path ([`ingest_upload`]) writes payloads (expanding zip
//! archives) into the destination model directory and upserts through
//! the same repository operations with
//! [`NamePolicy::OverwriteFromSource`](trove_catalog::NamePolicy).
//!
//! Both are best-effort batch operations: individual failures are
//! logged and skipped, and re-running either over the same input is
//! idempotent thanks to the catalog's natural-key upserts.

pub mod error;
mod reconcile;
mod upload;

pub use crate::reconcile::{ScanSummary, reconcile};
pub use crate::upload::{UploadOutcome, UploadPayload, ingest_upload};

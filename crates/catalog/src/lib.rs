//! SQLite catalog database for model libraries.
//!
//! This crate persists the current known state of every library: which
//! logical models exist, and which physical files belong to them. The
//! database is not the source of truth - the files on disk are. If the
//! catalog is deleted, it can be rebuilt by re-scanning each library root.
//!
//! # Architecture
//! Three entity types, in a strict hierarchy:
//! - **Library**: a root filesystem path registered as a scan/upload target.
//! - **Model**: a logical unit of content, one per directory under a library
//!   root, unique on (library_id, path).
//! - **ModelFile**: one physical file with its size, mime classification and
//!   content digest, unique on its absolute path.
//!
//! All mutation during ingestion goes through natural-key upserts on the
//! [`Repository`], which is what makes repeated and concurrent scans
//! idempotent at the row level.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::models::{Library, Model, ModelFile};
pub use crate::repo::{NamePolicy, Repository};

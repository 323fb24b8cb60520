//! Filesystem discovery and content fingerprinting.
//!
//! Given a library root, [`scan_root`] walks the tree, filters to the
//! supported 3D model extensions and emits one [`DiscoveredFile`] per
//! accepted file - path, size, content digest and mime classification.
//! The descriptors are ephemeral input for reconciliation; nothing in
//! this crate touches the catalog.
//!
//! Error policy is fail-fast throughout (see [`error::ErrorKind`]): a
//! scan either observes the whole tree or reports why it couldn't.

mod digest;
pub mod error;
mod file;
mod walk;

pub use crate::digest::{digest_bytes, digest_file};
pub use crate::file::{DiscoveredFile, SUPPORTED_EXTENSIONS, is_model_file, lowercase_extension, mime_type};
pub use crate::walk::scan_root;

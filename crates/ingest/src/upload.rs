//! Direct upload ingestion.
//!
//! Uploads skip the job queue entirely: the payloads are written into the
//! destination model directory, digested in the same pass, and upserted
//! into the catalog synchronously within the calling request. Zip
//! archives are expanded entry-by-entry, preserving their internal
//! relative paths.
//!
//! Unlike the background scan, the destination model's name IS
//! overwritten with the caller-supplied one ([`NamePolicy::OverwriteFromSource`]).
//! The caller named the model explicitly; the scan only infers it.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tokio::fs;
use trove_catalog::{NamePolicy, Repository};
use trove_scanner::{digest_bytes, lowercase_extension, mime_type};

/// One uploaded file: original filename plus its bytes.
///
/// The transport (multipart form, CLI, ...) is somebody else's problem;
/// by the time a payload reaches this module it's just a named buffer.
#[derive(Debug, Clone)]
pub struct UploadPayload {
    pub filename: String,
    pub data: Vec<u8>,
}
impl UploadPayload {
    pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self { filename: filename.into(), data: data.into() }
    }

    fn is_archive(&self) -> bool {
        self.filename.to_ascii_lowercase().ends_with(".zip")
    }
}

/// What an upload managed to ingest.
///
/// Only successes are listed; per-file and per-entry failures are logged
/// and dropped, so a caller cannot distinguish "skipped due to error"
/// from "never sent" here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Successfully ingested filenames, archive entries included under
    /// their entry names.
    pub ingested: Vec<String>,
    pub count: usize,
}

/// A file written to disk during archive expansion, pending its catalog
/// upsert.
struct ExtractedEntry {
    /// The archive entry's own name, reported back to the caller.
    entry_name: String,
    /// Absolute path the entry was extracted to.
    path: PathBuf,
    size: u64,
    digest: String,
}

/// Copy `reader` into `writer` while feeding the same bytes through a
/// BLAKE3 hasher: one pass, no re-read of what was just written.
fn copy_and_digest(reader: &mut impl Read, writer: &mut impl Write) -> std::io::Result<(u64, String)> {
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 64 * 1024];
    let mut size = 0u64;
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        writer.write_all(&buffer[..read])?;
        hasher.update(&buffer[..read]);
        size += read as u64;
    }
    writer.flush()?;
    Ok((size, hasher.finalize().to_string()))
}

fn starts_with_dot(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with('.'))
}

/// Expand a zip payload into `dest`, hashing each entry while writing it.
///
/// Sync and blocking by nature (the zip reader seeks), so this runs
/// under `spawn_blocking`. The archive is first persisted to temporary
/// storage; the temp file is removed on drop regardless of outcome.
///
/// Skipped without failing the archive: directory entries, entries whose
/// base name starts with a dot (`.DS_Store`, `__MACOSX/._*`), entries
/// with unsafe names, and entries that fail to open or write (logged).
fn extract_archive(archive_name: &str, data: &[u8], dest: &Path) -> std::io::Result<Vec<ExtractedEntry>> {
    let mut spool = tempfile::NamedTempFile::new()?;
    spool.write_all(data)?;
    spool.as_file_mut().seek(SeekFrom::Start(0))?;
    let mut archive = zip::ZipArchive::new(spool.as_file_mut()).map_err(std::io::Error::other)?;

    let mut extracted = Vec::new();
    for index in 0..archive.len() {
        let mut entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(error) => {
                tracing::warn!(archive = archive_name, index, %error, "unreadable zip entry; skipped");
                continue;
            },
        };
        if entry.is_dir() {
            continue;
        }
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!(archive = archive_name, entry = entry.name(), "zip entry escapes destination; skipped");
            continue;
        };
        if starts_with_dot(&relative) {
            continue;
        }
        let out_path = dest.join(&relative);
        let written = (|| -> std::io::Result<(u64, String)> {
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = std::fs::File::create(&out_path)?;
            copy_and_digest(&mut entry, &mut out)
        })();
        match written {
            Ok((size, digest)) => extracted.push(ExtractedEntry {
                entry_name: entry.name().to_string(),
                path: out_path,
                size,
                digest,
            }),
            Err(error) => {
                tracing::warn!(archive = archive_name, entry = entry.name(), %error, "zip entry extraction failed; skipped");
            },
        }
    }
    Ok(extracted)
}

/// Ingest a set of uploaded payloads as (part of) one named model.
///
/// Creates `<library root>/<model name>` if absent, upserts the model
/// row (overwriting its display name), then ingests every payload:
/// archives are expanded, everything else is written verbatim. Digests
/// are computed in the same pass as the write. Per-payload and
/// per-entry failures are logged and skipped; the batch never aborts
/// for them.
///
/// Hard errors are limited to what the whole operation cannot survive:
/// an unknown library, an uncreatable destination directory, or the
/// destination model upsert failing.
pub async fn ingest_upload(
    repo: &Repository,
    library_id: i64,
    model_name: &str,
    payloads: Vec<UploadPayload>,
) -> Result<UploadOutcome> {
    let library = repo.require_library(library_id).await.or_raise(|| ErrorKind::Catalog)?;
    let dest = library.path.join(model_name);
    fs::create_dir_all(&dest).await.or_raise(|| ErrorKind::Storage(dest.clone()))?;
    let model = repo
        .upsert_model(library_id, model_name, &dest, NamePolicy::OverwriteFromSource)
        .await
        .or_raise(|| ErrorKind::Catalog)?;

    let mut ingested = Vec::new();
    for payload in payloads {
        if payload.is_archive() {
            let archive_name = payload.filename.clone();
            let blocking_dest = dest.clone();
            let entries = tokio::task::spawn_blocking(move || {
                extract_archive(&payload.filename, &payload.data, &blocking_dest)
            })
            .await;
            let entries = match entries {
                Ok(Ok(entries)) => entries,
                Ok(Err(error)) => {
                    tracing::warn!(archive = archive_name, %error, "archive could not be processed; skipped");
                    continue;
                },
                Err(error) => {
                    tracing::warn!(archive = archive_name, %error, "archive extraction task failed; skipped");
                    continue;
                },
            };
            for entry in entries {
                let filename = entry.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                let mime = lowercase_extension(&entry.path).as_deref().and_then(mime_type);
                match repo
                    .upsert_model_file(model.id, &filename, &entry.path, entry.size, mime, &entry.digest)
                    .await
                {
                    Ok(_) => ingested.push(entry.entry_name),
                    Err(error) => {
                        tracing::warn!(path = %entry.path.display(), %error, "file upsert failed; skipped");
                    },
                }
            }
            continue;
        }

        let out_path = dest.join(&payload.filename);
        let digest = digest_bytes(&payload.data);
        let size = payload.data.len() as u64;
        if let Err(error) = fs::write(&out_path, &payload.data).await {
            tracing::warn!(path = %out_path.display(), %error, "payload write failed; skipped");
            continue;
        }
        let mime = lowercase_extension(&out_path).as_deref().and_then(mime_type);
        match repo.upsert_model_file(model.id, &payload.filename, &out_path, size, mime, &digest).await {
            Ok(_) => ingested.push(payload.filename),
            Err(error) => {
                tracing::warn!(path = %out_path.display(), %error, "file upsert failed; skipped");
            },
        }
    }

    let count = ingested.len();
    tracing::info!(library = library_id, model = model_name, count, "upload ingestion complete");
    Ok(UploadOutcome { ingested, count })
}

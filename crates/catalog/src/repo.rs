//! Repository for library, model and file entries in the catalog.
//!
//! Every ingestion path mutates the catalog exclusively through the
//! natural-key upserts in here. That is the whole concurrency story:
//! no duplicate rows can exist for a (library, path) or file path no
//! matter how often or how concurrently a scan is re-run, and the last
//! writer wins on the refreshed fields.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{Library, LibraryRow, Model, ModelFile, ModelFileRow, ModelRow};
use exn::{OptionExt, ResultExt};
use sqlx::SqlitePool;
use std::path::Path;
use time::UtcDateTime;

/// What to do with a model's display name when the (library_id, path)
/// key already exists.
///
/// The background scan preserves names so that manual edits through the
/// model-update API survive re-scans; uploads overwrite because the
/// caller supplied the name explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamePolicy {
    /// Keep the stored name, only refresh `updated_at`.
    PreserveExisting,
    /// Replace the stored name with the freshly supplied one.
    OverwriteFromSource,
}

/// Repository for catalog entities over a shared connection pool.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn sqlx_hates_paths(path: impl AsRef<Path>) -> Result<String> {
        Ok(path.as_ref().to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))?.to_string())
    }

    // =========================================================================
    // Libraries
    // =========================================================================

    /// Register a new library root.
    ///
    /// Library management proper lives with the HTTP layer; the catalog only
    /// needs enough of a surface for ingestion (and its tests) to resolve a
    /// library's id and root path.
    pub async fn create_library(
        &self,
        name: impl AsRef<str>,
        path: impl AsRef<Path>,
        storage: impl AsRef<str>,
    ) -> Result<Library> {
        let now = UtcDateTime::now().unix_timestamp();
        let row: LibraryRow = sqlx::query_as(
            r#"
            INSERT INTO libraries (name, path, storage, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(name.as_ref())
        .bind(Self::sqlx_hates_paths(path)?)
        .bind(storage.as_ref())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .or_raise(|| ErrorKind::Database)?;
        row.try_into()
    }

    /// Fetch a library by id.
    pub async fn get_library(&self, id: i64) -> Result<Option<Library>> {
        let row: Option<LibraryRow> = sqlx::query_as("SELECT * FROM libraries WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(|r| r.try_into()).transpose()
    }

    /// Fetch a library by id, raising [`ErrorKind::LibraryNotFound`] if absent.
    pub async fn require_library(&self, id: i64) -> Result<Library> {
        self.get_library(id).await?.ok_or_raise(|| ErrorKind::LibraryNotFound(id))
    }

    // =========================================================================
    // Models
    // =========================================================================

    /// Insert or refresh a model keyed on (library_id, path).
    ///
    /// On conflict, `updated_at` is always refreshed; whether `name` is
    /// overwritten is decided by the [`NamePolicy`]. The description and
    /// preview reference are never touched by ingestion.
    pub async fn upsert_model(
        &self,
        library_id: i64,
        name: impl AsRef<str>,
        path: impl AsRef<Path>,
        policy: NamePolicy,
    ) -> Result<Model> {
        let now = UtcDateTime::now().unix_timestamp();
        let sql = match policy {
            NamePolicy::PreserveExisting => {
                r#"
                INSERT INTO models (library_id, name, path, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT (library_id, path) DO UPDATE
                SET updated_at = excluded.updated_at
                RETURNING *
                "#
            },
            NamePolicy::OverwriteFromSource => {
                r#"
                INSERT INTO models (library_id, name, path, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT (library_id, path) DO UPDATE
                SET name = excluded.name, updated_at = excluded.updated_at
                RETURNING *
                "#
            },
        };
        let row: ModelRow = sqlx::query_as(sql)
            .bind(library_id)
            .bind(name.as_ref())
            .bind(Self::sqlx_hates_paths(path)?)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.try_into()
    }

    /// Fetch a model by its natural key.
    pub async fn get_model_by_path(&self, library_id: i64, path: impl AsRef<Path>) -> Result<Option<Model>> {
        let row: Option<ModelRow> = sqlx::query_as("SELECT * FROM models WHERE library_id = ? AND path = ?")
            .bind(library_id)
            .bind(Self::sqlx_hates_paths(path)?)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(|r| r.try_into()).transpose()
    }

    /// Count models belonging to a library.
    pub async fn count_models(&self, library_id: i64) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM models WHERE library_id = ?")
            .bind(library_id)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(count as u64)
    }

    // =========================================================================
    // Model files
    // =========================================================================

    /// Insert or refresh a file keyed on its path.
    ///
    /// On conflict the size, mime type and digest are overwritten with the
    /// freshly observed values (the content may have changed on disk), and
    /// the row is re-parented to the upserting model. `created_at` is left
    /// alone; file rows are never deleted by ingestion.
    pub async fn upsert_model_file(
        &self,
        model_id: i64,
        filename: impl AsRef<str>,
        path: impl AsRef<Path>,
        size: u64,
        mime_type: Option<&str>,
        digest: impl AsRef<str>,
    ) -> Result<ModelFile> {
        let size = i64::try_from(size).or_raise(|| ErrorKind::InvalidData("file size"))?;
        let now = UtcDateTime::now().unix_timestamp();
        let row: ModelFileRow = sqlx::query_as(
            r#"
            INSERT INTO model_files (model_id, filename, path, size, mime_type, digest, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (path) DO UPDATE
            SET model_id = excluded.model_id,
                size = excluded.size,
                mime_type = excluded.mime_type,
                digest = excluded.digest
            RETURNING *
            "#,
        )
        .bind(model_id)
        .bind(filename.as_ref())
        .bind(Self::sqlx_hates_paths(path)?)
        .bind(size)
        .bind(mime_type)
        .bind(digest.as_ref())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .or_raise(|| ErrorKind::Database)?;
        row.try_into()
    }

    /// List all files belonging to a model, ordered by path.
    pub async fn list_model_files(&self, model_id: i64) -> Result<Vec<ModelFile>> {
        let rows: Vec<ModelFileRow> =
            sqlx::query_as("SELECT * FROM model_files WHERE model_id = ? ORDER BY path")
                .bind(model_id)
                .fetch_all(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Count files across all models of a library.
    pub async fn count_model_files(&self, library_id: i64) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM model_files
            JOIN models ON models.id = model_files.model_id
            WHERE models.library_id = ?
            "#,
        )
        .bind(library_id)
        .fetch_one(&self.pool)
        .await
        .or_raise(|| ErrorKind::Database)?;
        Ok(count as u64)
    }
}

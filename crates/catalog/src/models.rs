//! Row types and their public model counterparts.
//!
//! The `*Row` structs mirror the SQLite schema exactly (i64 timestamps,
//! TEXT paths) and stay private to this crate; the public models expose
//! `PathBuf` and [`UtcDateTime`] instead.

use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use std::path::PathBuf;
use time::UtcDateTime;

/// A root filesystem path registered as a scanning/upload target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    pub id: i64,
    pub name: String,
    pub path: PathBuf,
    /// Storage backend tag (currently always `"local"`).
    pub storage: String,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}

/// A logical unit of content: one directory under a library root.
///
/// Unique on (library_id, path). The name defaults to the directory's
/// base name on first discovery; whether re-ingestion may overwrite it
/// is decided by [`NamePolicy`](crate::NamePolicy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub id: i64,
    pub library_id: i64,
    pub name: String,
    pub path: PathBuf,
    pub description: Option<String>,
    pub preview_file_id: Option<i64>,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}

/// One physical file belonging to a [`Model`], unique on its path.
///
/// Size, mime type and digest are refreshed to the freshly observed
/// values on every re-ingestion; the row itself is never deleted by a
/// scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFile {
    pub id: i64,
    pub model_id: i64,
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
    pub mime_type: Option<String>,
    pub digest: Option<String>,
    pub created_at: UtcDateTime,
}

fn timestamp(seconds: i64) -> Result<UtcDateTime, Error> {
    UtcDateTime::from_unix_timestamp(seconds).or_raise(|| ErrorKind::InvalidData("timestamp"))
}

#[derive(sqlx::FromRow)]
pub(crate) struct LibraryRow {
    id: i64,
    name: String,
    path: String,
    storage: String,
    created_at: i64,
    updated_at: i64,
}
impl TryFrom<LibraryRow> for Library {
    type Error = Error;
    fn try_from(row: LibraryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            path: PathBuf::from(row.path),
            storage: row.storage,
            created_at: timestamp(row.created_at)?,
            updated_at: timestamp(row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ModelRow {
    id: i64,
    library_id: i64,
    name: String,
    path: String,
    description: Option<String>,
    preview_file_id: Option<i64>,
    created_at: i64,
    updated_at: i64,
}
impl TryFrom<ModelRow> for Model {
    type Error = Error;
    fn try_from(row: ModelRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            library_id: row.library_id,
            name: row.name,
            path: PathBuf::from(row.path),
            description: row.description,
            preview_file_id: row.preview_file_id,
            created_at: timestamp(row.created_at)?,
            updated_at: timestamp(row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ModelFileRow {
    id: i64,
    model_id: i64,
    filename: String,
    path: String,
    size: i64,
    mime_type: Option<String>,
    digest: Option<String>,
    created_at: i64,
}
impl TryFrom<ModelFileRow> for ModelFile {
    type Error = Error;
    fn try_from(row: ModelFileRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            model_id: row.model_id,
            filename: row.filename,
            path: PathBuf::from(row.path),
            size: u64::try_from(row.size).or_raise(|| ErrorKind::InvalidData("file size"))?,
            mime_type: row.mime_type,
            digest: row.digest,
            created_at: timestamp(row.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_to_model() {
        let now = UtcDateTime::now().unix_timestamp();
        let row = ModelFileRow {
            id: 7,
            model_id: 3,
            filename: "hinge.stl".to_string(),
            path: "/srv/library/WidgetV2/hinge.stl".to_string(),
            size: 1024,
            mime_type: Some("model/stl".to_string()),
            digest: Some("6f1b17063da8508541eb76dac260748a2d815c2c88b27cefb6205c90ae16fef5".to_string()),
            created_at: now,
        };
        let file = ModelFile::try_from(row).unwrap();
        assert_eq!(file.size, 1024);
        assert_eq!(file.path, PathBuf::from("/srv/library/WidgetV2/hinge.stl"));
        assert_eq!(file.created_at.unix_timestamp(), now);
    }

    #[test]
    fn test_negative_size_is_rejected() {
        let row = ModelFileRow {
            id: 1,
            model_id: 1,
            filename: "broken.obj".to_string(),
            path: "/broken.obj".to_string(),
            size: -1,
            mime_type: None,
            digest: None,
            created_at: 0,
        };
        assert!(ModelFile::try_from(row).is_err());
    }
}

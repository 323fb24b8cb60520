//! Reconciliation of discovered filesystem state into the catalog.
//!
//! Turns the scanner's flat file list into catalog upserts: files are
//! grouped by their parent directory (one directory: one model) and
//! merged into the catalog via the natural-key upserts on
//! [`Repository`]. Both the background scan and the upload path funnel
//! through this one routine; they differ only in the [`NamePolicy`]
//! they pass.
//!
//! Error policy is best-effort, the opposite of the scanner's: a model
//! upsert failure skips that whole group, a file upsert failure skips
//! that file, and everything else carries on. The skips are collected
//! in the [`ScanSummary`] so the job runner can log them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use trove_catalog::{NamePolicy, Repository};
use trove_scanner::DiscoveredFile;

/// Outcome of reconciling one batch of discovered files.
///
/// Returned to the job runner for logging; deliberately not surfaced to
/// any end user (background scans are fire-and-forget).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    /// Total descriptors that entered reconciliation.
    pub files_seen: usize,
    /// Distinct models successfully upserted.
    pub models_touched: usize,
    /// Files successfully upserted.
    pub files_upserted: usize,
    /// Paths skipped because of a per-group or per-file failure.
    pub skipped: Vec<PathBuf>,
}

fn model_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        // A file directly at the filesystem root has no parent basename
        // to speak of; fall back to the full path as the display name.
        .unwrap_or_else(|| dir.to_string_lossy().into_owned())
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Group descriptors by parent directory, both levels ordered
/// lexicographically so that repeated scans upsert (and log) in a
/// reproducible order.
fn group_by_directory(files: Vec<DiscoveredFile>) -> BTreeMap<PathBuf, Vec<DiscoveredFile>> {
    let mut groups: BTreeMap<PathBuf, Vec<DiscoveredFile>> = BTreeMap::new();
    for file in files {
        let Some(parent) = file.path.parent().map(Path::to_path_buf) else {
            // Unreachable for anything the walk can produce, but a
            // descriptor is caller-supplied data; don't panic over it.
            tracing::warn!(path = %file.path.display(), "discovered file has no parent directory; skipped");
            continue;
        };
        groups.entry(parent).or_default().push(file);
    }
    for group in groups.values_mut() {
        group.sort_by(|a, b| a.path.cmp(&b.path));
    }
    groups
}

/// Merge a batch of discovered files into the catalog for one library.
///
/// Idempotent: re-running over the same input produces no duplicate
/// rows, only refreshed fields and timestamps. This is what makes
/// at-least-once job delivery safe.
pub async fn reconcile(
    repo: &Repository,
    library_id: i64,
    files: Vec<DiscoveredFile>,
    policy: NamePolicy,
) -> ScanSummary {
    let mut summary = ScanSummary { files_seen: files.len(), ..Default::default() };
    for (dir, group) in group_by_directory(files) {
        let name = model_name(&dir);
        let model = match repo.upsert_model(library_id, &name, &dir, policy).await {
            Ok(model) => model,
            Err(error) => {
                tracing::warn!(
                    model = name,
                    path = %dir.display(),
                    %error,
                    "model upsert failed; skipping its files",
                );
                summary.skipped.extend(group.into_iter().map(|f| f.path));
                continue;
            },
        };
        summary.models_touched += 1;
        for file in group {
            match repo
                .upsert_model_file(model.id, file_name(&file.path), &file.path, file.size, file.mime_type, &file.digest)
                .await
            {
                Ok(_) => summary.files_upserted += 1,
                Err(error) => {
                    tracing::warn!(path = %file.path.display(), %error, "file upsert failed; skipped");
                    summary.skipped.push(file.path);
                },
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use trove_catalog::Database;

    fn descriptor(path: &str, digest: &str) -> DiscoveredFile {
        DiscoveredFile {
            path: PathBuf::from(path),
            size: 42,
            digest: digest.to_string(),
            mime_type: Some("model/stl"),
        }
    }

    async fn repo_with_library() -> (Repository, i64) {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let library = repo.create_library("prints", "/srv/library", "local").await.unwrap();
        (repo, library.id)
    }

    #[tokio::test]
    async fn test_grouping_one_model_per_directory() {
        let (repo, library_id) = repo_with_library().await;
        let files = vec![
            descriptor("/srv/library/WidgetV2/a.stl", "d1"),
            descriptor("/srv/library/WidgetV2/b.obj", "d2"),
        ];
        let summary = reconcile(&repo, library_id, files, NamePolicy::PreserveExisting).await;
        assert_eq!(summary.models_touched, 1);
        assert_eq!(summary.files_upserted, 2);
        assert!(summary.skipped.is_empty());
        let model = repo.get_model_by_path(library_id, "/srv/library/WidgetV2").await.unwrap().unwrap();
        assert_eq!(model.name, "WidgetV2");
        assert_eq!(repo.list_model_files(model.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let (repo, library_id) = repo_with_library().await;
        let files = vec![
            descriptor("/srv/library/WidgetV2/a.stl", "d1"),
            descriptor("/srv/library/Gears/g.gcode", "d2"),
        ];
        let first = reconcile(&repo, library_id, files.clone(), NamePolicy::PreserveExisting).await;
        let second = reconcile(&repo, library_id, files, NamePolicy::PreserveExisting).await;
        assert_eq!(first.files_upserted, 2);
        assert_eq!(second.files_upserted, 2);
        assert_eq!(repo.count_models(library_id).await.unwrap(), 2);
        assert_eq!(repo.count_model_files(library_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_rescan_preserves_manual_name_edit() {
        let (repo, library_id) = repo_with_library().await;
        let files = vec![descriptor("/srv/library/WidgetV2/a.stl", "d1")];
        reconcile(&repo, library_id, files.clone(), NamePolicy::PreserveExisting).await;
        // Simulate a manual rename through the model-update API.
        repo.upsert_model(library_id, "My Widget", "/srv/library/WidgetV2", NamePolicy::OverwriteFromSource)
            .await
            .unwrap();
        reconcile(&repo, library_id, files, NamePolicy::PreserveExisting).await;
        let model = repo.get_model_by_path(library_id, "/srv/library/WidgetV2").await.unwrap().unwrap();
        assert_eq!(model.name, "My Widget");
    }

    #[tokio::test]
    async fn test_duplicate_content_across_paths() {
        let (repo, library_id) = repo_with_library().await;
        let files = vec![
            descriptor("/srv/library/A/part.stl", "same-digest"),
            descriptor("/srv/library/B/part.stl", "same-digest"),
        ];
        let summary = reconcile(&repo, library_id, files, NamePolicy::PreserveExisting).await;
        assert_eq!(summary.models_touched, 2);
        assert_eq!(repo.count_model_files(library_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_bad_library_skips_all_groups_without_error() {
        let (repo, _library_id) = repo_with_library().await;
        // Nonexistent library id: every model upsert fails its FK, every
        // file lands in `skipped`, and reconcile still completes.
        let files = vec![
            descriptor("/srv/library/WidgetV2/a.stl", "d1"),
            descriptor("/srv/library/Gears/g.gcode", "d2"),
        ];
        let summary = reconcile(&repo, 999, files, NamePolicy::PreserveExisting).await;
        assert_eq!(summary.files_seen, 2);
        assert_eq!(summary.models_touched, 0);
        assert_eq!(summary.files_upserted, 0);
        assert_eq!(summary.skipped.len(), 2);
    }

    #[tokio::test]
    async fn test_unpersistable_file_is_skipped_but_group_continues() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let (repo, library_id) = repo_with_library().await;
        // A non-UTF-8 path cannot be bound as TEXT, so its file upsert
        // fails while the surrounding group is healthy.
        let bad_path = PathBuf::from(OsString::from_vec(b"/srv/library/WidgetV2/bad\xFF.stl".to_vec()));
        let files = vec![
            descriptor("/srv/library/WidgetV2/a.stl", "d1"),
            DiscoveredFile {
                path: bad_path.clone(),
                size: 42,
                digest: "d2".to_string(),
                mime_type: Some("model/stl"),
            },
        ];
        let summary = reconcile(&repo, library_id, files, NamePolicy::PreserveExisting).await;
        assert_eq!(summary.models_touched, 1);
        assert_eq!(summary.files_upserted, 1);
        assert_eq!(summary.skipped, [bad_path]);
        let model = repo.get_model_by_path(library_id, "/srv/library/WidgetV2").await.unwrap().unwrap();
        assert_eq!(repo.list_model_files(model.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_vanished_files_are_not_removed_on_rescan() {
        let (repo, library_id) = repo_with_library().await;
        let full = vec![
            descriptor("/srv/library/WidgetV2/a.stl", "d1"),
            descriptor("/srv/library/WidgetV2/b.stl", "d2"),
        ];
        reconcile(&repo, library_id, full, NamePolicy::PreserveExisting).await;
        // b.stl has disappeared from disk; the rescan only sees a.stl.
        let partial = vec![descriptor("/srv/library/WidgetV2/a.stl", "d1")];
        reconcile(&repo, library_id, partial, NamePolicy::PreserveExisting).await;
        // No tombstoning: the stale row stays until someone deletes it.
        assert_eq!(repo.count_model_files(library_id).await.unwrap(), 2);
    }

    #[test]
    fn test_groups_are_lexicographically_ordered() {
        let files = vec![
            descriptor("/root/b/one.stl", "d1"),
            descriptor("/root/a/two.stl", "d2"),
            descriptor("/root/a/one.stl", "d3"),
        ];
        let groups = group_by_directory(files);
        let dirs: Vec<_> = groups.keys().cloned().collect();
        assert_eq!(dirs, [PathBuf::from("/root/a"), PathBuf::from("/root/b")]);
        let a_group: Vec<_> = groups[&PathBuf::from("/root/a")].iter().map(|f| f.path.clone()).collect();
        assert_eq!(a_group, [PathBuf::from("/root/a/one.stl"), PathBuf::from("/root/a/two.stl")]);
    }
}

//! Directory tree synchronization.
//!
//! File operations are asynchronous but intentionally not parallelized
//! across files, to bound contention on a shared build host. Cancellation is
//! checked between (not mid-) file operations.

use crate::cancellation::CancellationToken;
use crate::errors::PipelineError;
use md5::{Digest, Md5};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Per-call knobs for a synchronization run.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Delete files present only in the target. The release track keeps this
    /// off to retain some previously-published files.
    pub delete_removed: bool,
    /// Sidecar suffixes removed when their base file no longer exists.
    pub sidecar_suffixes: Vec<String>,
}

/// What a synchronization run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Files copied that did not exist in the target.
    pub added: usize,
    /// Files overwritten because their content differed.
    pub updated: usize,
    /// Files removed from the target.
    pub deleted: usize,
    /// Orphaned sidecar files removed.
    pub sidecars_removed: usize,
}

impl SyncReport {
    /// True when the run changed nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} added, {} updated, {} deleted, {} sidecars removed",
            self.added, self.updated, self.deleted, self.sidecars_removed
        )
    }
}

/// Brings a target tree into the same content state as a source tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSynchronizer;

impl FileSynchronizer {
    /// Creates a synchronizer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Reconciles `target` against `source`.
    ///
    /// Files only in source are added; files in both are updated when their
    /// content differs (size first, then an md5 tie-break for equal-size
    /// files, which keeps a second run over unchanged trees a no-op); files
    /// only in target are deleted when `delete_removed` is set, except
    /// sidecar files, which are handled by the orphaned-sidecar cleanup
    /// pass that follows.
    ///
    /// # Errors
    ///
    /// IO failures and `PipelineError::Cancelled` between file operations.
    pub async fn sync(
        &self,
        source: &Path,
        target: &Path,
        options: &SyncOptions,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, PipelineError> {
        let mut report = SyncReport::default();
        let source_files = walk_files(source).await?;

        fs::create_dir_all(target).await?;

        for relative in &source_files {
            cancel.check()?;
            let from = source.join(relative);
            let to = target.join(relative);

            match file_state(&from, &to).await? {
                FileState::Missing => {
                    copy_file(&from, &to).await?;
                    report.added += 1;
                }
                FileState::Differs => {
                    copy_file(&from, &to).await?;
                    report.updated += 1;
                }
                FileState::Same => {}
            }
        }

        if options.delete_removed {
            let target_files = walk_files(target).await?;
            for relative in &target_files {
                cancel.check()?;
                if source_files.contains(relative) {
                    continue;
                }
                // Sidecars live only beside the target; they are removed by
                // the orphan pass once their base file is gone, never here.
                let name = relative.to_string_lossy();
                if options
                    .sidecar_suffixes
                    .iter()
                    .any(|suffix| name.ends_with(suffix.as_str()))
                {
                    continue;
                }
                fs::remove_file(target.join(relative)).await?;
                report.deleted += 1;
                debug!(file = %relative.display(), "deleted removed file");
            }

            report.sidecars_removed = self
                .remove_orphaned_sidecars(target, &options.sidecar_suffixes, cancel)
                .await?;
        }

        Ok(report)
    }

    /// Removes sidecar files whose base content no longer exists.
    async fn remove_orphaned_sidecars(
        &self,
        target: &Path,
        suffixes: &[String],
        cancel: &CancellationToken,
    ) -> Result<usize, PipelineError> {
        let mut removed = 0;
        for relative in walk_files(target).await? {
            cancel.check()?;
            let name = relative.to_string_lossy().to_string();
            let Some(base) = suffixes
                .iter()
                .find_map(|suffix| name.strip_suffix(suffix.as_str()))
            else {
                continue;
            };

            if fs::metadata(target.join(base)).await.is_err() {
                fs::remove_file(target.join(&relative)).await?;
                removed += 1;
                debug!(sidecar = %relative.display(), "removed orphaned sidecar");
            }
        }
        Ok(removed)
    }
}

/// Copies a whole subtree, creating directories as needed.
///
/// Returns the number of files copied. Serves backup/restore and "move
/// compiled output into the build tree" use cases.
///
/// # Errors
///
/// IO failures and `PipelineError::Cancelled` between file operations.
pub async fn copy_tree(
    source: &Path,
    target: &Path,
    cancel: &CancellationToken,
) -> Result<usize, PipelineError> {
    let files = walk_files(source).await?;
    fs::create_dir_all(target).await?;

    let mut copied = 0;
    for relative in &files {
        cancel.check()?;
        copy_file(&source.join(relative), &target.join(relative)).await?;
        copied += 1;
    }
    Ok(copied)
}

/// Removes a whole subtree. Missing trees are tolerated.
///
/// # Errors
///
/// IO failures other than the tree not existing.
pub async fn remove_tree(path: &Path) -> Result<(), PipelineError> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

enum FileState {
    Missing,
    Same,
    Differs,
}

async fn file_state(source: &Path, target: &Path) -> Result<FileState, PipelineError> {
    let source_meta = fs::metadata(source).await?;
    let target_meta = match fs::metadata(target).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(FileState::Missing),
        Err(e) => return Err(e.into()),
    };

    if source_meta.len() != target_meta.len() {
        return Ok(FileState::Differs);
    }

    // Equal sizes prove nothing; timestamps are not trusted either, since a
    // repack can produce same-size output within filesystem granularity. The
    // digest decides.
    if file_digest(source).await? == file_digest(target).await? {
        Ok(FileState::Same)
    } else {
        Ok(FileState::Differs)
    }
}

async fn copy_file(from: &Path, to: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::copy(from, to).await?;
    Ok(())
}

async fn file_digest(path: &Path) -> Result<[u8; 16], PipelineError> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = Md5::new();
    let mut buffer = vec![0_u8; 64 * 1024];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize().into())
}

/// Collects relative paths of all files under `root`, sorted for
/// deterministic operation order. A missing root yields an empty list.
async fn walk_files(root: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let mut files = Vec::new();
    if fs::metadata(root).await.is_err() {
        return Ok(files);
    }

    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() {
                if let Ok(relative) = entry.path().strip_prefix(root) {
                    files.push(relative.to_path_buf());
                }
            }
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    async fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.unwrap();
        }
        fs::write(path, content).await.unwrap();
    }

    fn options(delete_removed: bool) -> SyncOptions {
        SyncOptions {
            delete_removed,
            sidecar_suffixes: vec![".zsync".to_string(), ".md5".to_string()],
        }
    }

    #[tokio::test]
    async fn test_sync_adds_missing_files() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write(source.path(), "a.pbo", "alpha").await;
        write(source.path(), "nested/b.pbo", "bravo").await;

        let report = FileSynchronizer::new()
            .sync(source.path(), target.path(), &options(true), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.added, 2);
        assert_eq!(report.updated, 0);
        let copied = fs::read_to_string(target.path().join("nested/b.pbo"))
            .await
            .unwrap();
        assert_eq!(copied, "bravo");
    }

    #[tokio::test]
    async fn test_sync_updates_changed_files() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write(source.path(), "a.pbo", "new content").await;
        write(target.path(), "a.pbo", "old").await;

        let report = FileSynchronizer::new()
            .sync(source.path(), target.path(), &options(true), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.updated, 1);
        let copied = fs::read_to_string(target.path().join("a.pbo")).await.unwrap();
        assert_eq!(copied, "new content");
    }

    #[tokio::test]
    async fn test_sync_updates_same_size_changed_content() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        // Same length, different bytes, written back to back so the
        // timestamps may well coincide.
        write(source.path(), "a.pbo", "version-two").await;
        write(target.path(), "a.pbo", "version-one").await;

        let report = FileSynchronizer::new()
            .sync(source.path(), target.path(), &options(true), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.updated, 1);
        let copied = fs::read_to_string(target.path().join("a.pbo")).await.unwrap();
        assert_eq!(copied, "version-two");
    }

    #[tokio::test]
    async fn test_sync_is_idempotent() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write(source.path(), "a.pbo", "alpha").await;
        write(source.path(), "b/c.pbo", "charlie").await;

        let sync = FileSynchronizer::new();
        let cancel = CancellationToken::new();
        let first = sync
            .sync(source.path(), target.path(), &options(true), &cancel)
            .await
            .unwrap();
        assert_eq!(first.added, 2);

        let second = sync
            .sync(source.path(), target.path(), &options(true), &cancel)
            .await
            .unwrap();
        assert!(second.is_noop(), "second run should be a no-op: {second}");
    }

    #[tokio::test]
    async fn test_sync_deletes_only_when_asked() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write(target.path(), "stale.pbo", "old").await;

        let sync = FileSynchronizer::new();
        let cancel = CancellationToken::new();

        let retained = sync
            .sync(source.path(), target.path(), &options(false), &cancel)
            .await
            .unwrap();
        assert_eq!(retained.deleted, 0);
        assert!(fs::metadata(target.path().join("stale.pbo")).await.is_ok());

        let deleted = sync
            .sync(source.path(), target.path(), &options(true), &cancel)
            .await
            .unwrap();
        assert_eq!(deleted.deleted, 1);
        assert!(fs::metadata(target.path().join("stale.pbo")).await.is_err());
    }

    #[tokio::test]
    async fn test_sync_removes_orphaned_sidecars() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write(source.path(), "kept.pbo", "content").await;
        write(target.path(), "kept.pbo", "content").await;
        write(target.path(), "kept.pbo.zsync", "sidecar").await;
        write(target.path(), "gone.pbo", "old").await;
        write(target.path(), "gone.pbo.zsync", "sidecar").await;
        write(target.path(), "gone.pbo.md5", "digest").await;

        let report = FileSynchronizer::new()
            .sync(source.path(), target.path(), &options(true), &CancellationToken::new())
            .await
            .unwrap();

        // gone.pbo plus its two sidecars disappear; kept.pbo.zsync stays.
        assert_eq!(report.deleted, 1);
        assert_eq!(report.sidecars_removed, 2);
        assert!(fs::metadata(target.path().join("kept.pbo.zsync")).await.is_ok());
        assert!(fs::metadata(target.path().join("gone.pbo.zsync")).await.is_err());
        assert!(fs::metadata(target.path().join("gone.pbo.md5")).await.is_err());
    }

    #[tokio::test]
    async fn test_sync_respects_cancellation() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write(source.path(), "a.pbo", "alpha").await;

        let cancel = CancellationToken::new();
        cancel.cancel("operator");

        let result = FileSynchronizer::new()
            .sync(source.path(), target.path(), &options(true), &cancel)
            .await;
        assert!(matches!(result, Err(PipelineError::Cancelled(_))));
    }

    #[tokio::test]
    async fn test_copy_tree_and_remove_tree() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write(source.path(), "x/y.bin", "data").await;
        write(source.path(), "z.bin", "data").await;

        let copied = copy_tree(source.path(), target.path(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(copied, 2);
        assert!(fs::metadata(target.path().join("x/y.bin")).await.is_ok());

        let subtree = target.path().join("x");
        remove_tree(&subtree).await.unwrap();
        assert!(fs::metadata(&subtree).await.is_err());

        // Removing an already-missing tree is fine.
        remove_tree(&subtree).await.unwrap();
    }

    #[tokio::test]
    async fn test_walk_missing_root_is_empty() {
        let files = walk_files(&PathBuf::from("/definitely/not/here")).await.unwrap();
        assert!(files.is_empty());
    }
}

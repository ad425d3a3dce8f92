//! Version-control plumbing.
//!
//! Thin wrapper over the `git` binary. Commands here are short-lived
//! bookkeeping calls (log, checkout, merge), so output is captured whole
//! rather than streamed through the step logger.

use crate::core::CommitInfo;
use crate::errors::StepError;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Unit separator; safe in format strings because commit text never
/// contains it.
const FIELD_SEP: char = '\u{1f}';

/// Runs git commands against one working copy.
#[derive(Debug, Clone)]
pub struct GitCli {
    work_dir: PathBuf,
    quiet: bool,
    allowed_exit_codes: Vec<i32>,
}

impl GitCli {
    /// Creates a client for the given working copy.
    #[must_use]
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            quiet: false,
            allowed_exit_codes: Vec::new(),
        }
    }

    /// Tolerates any exit code. Quiet commands never fail on status alone.
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Accepts an additional exit code as success.
    #[must_use]
    pub fn allow_exit_code(mut self, code: i32) -> Self {
        self.allowed_exit_codes.push(code);
        self
    }

    fn exit_allowed(&self, code: i32) -> bool {
        code == 0 || self.quiet || self.allowed_exit_codes.contains(&code)
    }

    /// Runs one git command, returning trimmed stdout.
    ///
    /// # Errors
    ///
    /// `StepError::Failed` on a disallowed exit code, with stderr in the
    /// message.
    pub async fn run(&self, args: &[&str]) -> Result<String, StepError> {
        debug!(args = ?args, work_dir = %self.work_dir.display(), "running git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| StepError::Failed(format!("failed to run git: {e}")))?;

        let code = output.status.code().unwrap_or(-1);
        if !self.exit_allowed(code) {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StepError::Failed(format!(
                "git {} exited with {}: {}",
                args.join(" "),
                code,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Sha, subject and author of the current HEAD commit.
    ///
    /// # Errors
    ///
    /// `StepError::Failed` when the working copy has no commits or git
    /// itself fails.
    pub async fn head_commit(&self) -> Result<CommitInfo, StepError> {
        let format = format!("%H{FIELD_SEP}%s{FIELD_SEP}%an");
        let line = self
            .run(&["log", "-1", &format!("--pretty=format:{format}")])
            .await?;

        let mut fields = line.split(FIELD_SEP);
        match (fields.next(), fields.next(), fields.next()) {
            (Some(sha), Some(message), Some(author)) => {
                Ok(CommitInfo::new(sha, message, author))
            }
            _ => Err(StepError::Failed(format!(
                "unexpected git log output: {line}"
            ))),
        }
    }

    /// Checks out a branch.
    ///
    /// # Errors
    ///
    /// `StepError::Failed` on git failure.
    pub async fn checkout(&self, branch: &str) -> Result<(), StepError> {
        self.run(&["checkout", branch]).await?;
        Ok(())
    }

    /// Merges `source` into `target`, leaving `target` checked out.
    ///
    /// # Errors
    ///
    /// `StepError::Failed` on checkout or merge failure, including
    /// conflicts.
    pub async fn merge_into(&self, source: &str, target: &str) -> Result<(), StepError> {
        self.checkout(target).await?;
        self.run(&["merge", "--no-ff", "--no-edit", source]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn git(dir: &std::path::Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .status()
            .await
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    async fn init_repo(dir: &std::path::Path) {
        git(dir, &["init", "-q", "-b", "main"]).await;
        git(dir, &["config", "user.email", "ci@example.org"]).await;
        git(dir, &["config", "user.name", "CI"]).await;
        tokio::fs::write(dir.join("readme.txt"), "hello").await.unwrap();
        git(dir, &["add", "."]).await;
        git(dir, &["commit", "-q", "-m", "initial commit"]).await;
    }

    #[tokio::test]
    async fn test_head_commit() {
        let repo = TempDir::new().unwrap();
        init_repo(repo.path()).await;

        let commit = GitCli::new(repo.path()).head_commit().await.unwrap();
        assert_eq!(commit.message, "initial commit");
        assert_eq!(commit.author, "CI");
        assert_eq!(commit.sha.len(), 40);
    }

    #[tokio::test]
    async fn test_merge_into() {
        let repo = TempDir::new().unwrap();
        init_repo(repo.path()).await;
        let cli = GitCli::new(repo.path());

        git(repo.path(), &["checkout", "-q", "-b", "release"]).await;
        tokio::fs::write(repo.path().join("new.txt"), "content").await.unwrap();
        git(repo.path(), &["add", "."]).await;
        git(repo.path(), &["commit", "-q", "-m", "release change"]).await;

        cli.merge_into("release", "main").await.unwrap();
        assert!(repo.path().join("new.txt").exists());
    }

    #[tokio::test]
    async fn test_quiet_tolerates_nonzero_exit() {
        let repo = TempDir::new().unwrap();
        init_repo(repo.path()).await;
        // Unstaged change makes `git diff --quiet` exit with 1.
        tokio::fs::write(repo.path().join("readme.txt"), "changed")
            .await
            .unwrap();

        let strict = GitCli::new(repo.path());
        assert!(strict.run(&["diff", "--quiet"]).await.is_err());

        let tolerant = GitCli::new(repo.path()).quiet();
        tolerant.run(&["diff", "--quiet"]).await.unwrap();
    }

    #[tokio::test]
    async fn test_exit_code_allow_list() {
        let repo = TempDir::new().unwrap();
        init_repo(repo.path()).await;
        tokio::fs::write(repo.path().join("readme.txt"), "changed")
            .await
            .unwrap();

        let cli = GitCli::new(repo.path()).allow_exit_code(1);
        cli.run(&["diff", "--quiet"]).await.unwrap();

        // Codes outside the allow list still fail; this one exits with 128.
        assert!(cli.run(&["merge", "--abort"]).await.is_err());
    }

    #[tokio::test]
    async fn test_failure_carries_stderr() {
        let repo = TempDir::new().unwrap();
        init_repo(repo.path()).await;

        let result = GitCli::new(repo.path()).checkout("no-such-branch").await;
        let Err(StepError::Failed(message)) = result else {
            panic!("expected failure, got {result:?}");
        };
        assert!(message.contains("no-such-branch"));
    }
}

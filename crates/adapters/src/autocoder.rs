//! Auto-coder: runs the test suite and commits milestone work.
//!
//! Invoked by the dispatcher when a paid cycle completes a milestone.
//! The test suite is a pluggable command; on success the configured
//! source and test directories are committed with a structured message.

use crate::subprocess::{run_capture, run_with_timeout, GIT_TIMEOUT, TEST_SUITE_TIMEOUT};
use async_trait::async_trait;
use minder_core::{Goal, Milestone};
use std::path::PathBuf;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

/// Errors from auto-coder operations.
#[derive(Debug, Error)]
pub enum AutoCoderError {
    #[error("git failed: {0}")]
    Git(String),
    #[error("test run failed to start: {0}")]
    TestRun(String),
}

/// Outcome of one test-suite run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRun {
    pub passed: bool,
    pub output: String,
}

/// Outcome of a commit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    pub committed: bool,
    pub message: String,
    pub files: Vec<String>,
}

/// Adapter for the auto-coder subsystem.
#[async_trait]
pub trait AutoCoder: Send + Sync + 'static {
    /// Pick the milestone a paid cycle should work on: highest-priority
    /// active or in-progress goal with a pending milestone.
    fn pick_milestone<'g>(&self, goals: &'g [Goal]) -> Option<(&'g Goal, &'g Milestone)> {
        goals
            .iter()
            .filter(|g| g.has_pending_milestones() && !g.status.is_terminal())
            .max_by_key(|g| g.priority)
            .and_then(|g| g.next_pending_milestone().map(|m| (g, m)))
    }

    /// Brief injected into Sonnet-cycle prompts: names the goal, the
    /// milestone and the response tags the engine expects back.
    fn build_milestone_brief(&self, goal: &Goal, milestone: &Milestone) -> String {
        format!(
            "Auto-coder brief: goal \"{}\" ({}, priority {}) has milestone \"{}\" ({}) pending. \
             If you complete it this cycle, reply with \
             <milestone_complete goal=\"{}\" milestone=\"{}\">evidence</milestone_complete> \
             and an <action_taken> entry describing the change.",
            goal.title,
            goal.id,
            goal.priority,
            milestone.title,
            milestone.id,
            goal.id,
            milestone.id,
        )
    }

    async fn run_tests(&self) -> Result<TestRun, AutoCoderError>;

    /// Commit modified source and test files with a structured message.
    async fn commit_and_report(
        &self,
        goal: &Goal,
        milestone: &Milestone,
        evidence: &str,
    ) -> Result<CommitReport, AutoCoderError>;

    /// Per-file diff for the cycle audit, tried in order: unstaged,
    /// staged, last commit, "new file".
    async fn file_diff(&self, path: &str) -> String;

    /// Paths modified in the working tree (for the cycle diff record).
    async fn modified_files(&self) -> Vec<String>;
}

/// Strip shell metacharacters from a commit message field.
///
/// Commits run without a shell, but the message also flows into
/// notifications and logs; scrubbing keeps those surfaces inert.
pub fn sanitize_commit_field(field: &str) -> String {
    field
        .chars()
        .filter(|c| !matches!(c, '`' | '$' | ';' | '|' | '&' | '<' | '>' | '\\' | '\n' | '\r'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Git-backed auto-coder rooted at the assistant's own repository.
pub struct GitAutoCoder {
    repo_root: PathBuf,
    /// Test command run through `sh -c`; pluggable via configuration.
    test_command: String,
    /// Directories staged on commit.
    commit_paths: Vec<String>,
}

impl GitAutoCoder {
    pub fn new(repo_root: impl Into<PathBuf>, test_command: impl Into<String>) -> Self {
        Self {
            repo_root: repo_root.into(),
            test_command: test_command.into(),
            commit_paths: vec!["lib/".to_string(), "test/".to_string()],
        }
    }

    pub fn with_commit_paths(mut self, paths: Vec<String>) -> Self {
        self.commit_paths = paths;
        self
    }

    fn git(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.repo_root);
        cmd
    }
}

#[async_trait]
impl AutoCoder for GitAutoCoder {
    async fn run_tests(&self) -> Result<TestRun, AutoCoderError> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&self.test_command)
            .current_dir(&self.repo_root);
        let output = run_with_timeout(cmd, TEST_SUITE_TIMEOUT, "test suite")
            .await
            .map_err(AutoCoderError::TestRun)?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(TestRun {
            passed: output.status.success(),
            output: text,
        })
    }

    async fn commit_and_report(
        &self,
        goal: &Goal,
        milestone: &Milestone,
        evidence: &str,
    ) -> Result<CommitReport, AutoCoderError> {
        let files = self.modified_files().await;
        if files.is_empty() {
            return Ok(CommitReport {
                committed: false,
                message: "nothing to commit".to_string(),
                files,
            });
        }

        let mut add = self.git();
        add.arg("add").args(&self.commit_paths);
        run_with_timeout(add, GIT_TIMEOUT, "git add")
            .await
            .map_err(AutoCoderError::Git)?;

        let message = format!(
            "milestone: {} ({})\n\nGoal: {}\nEvidence: {}",
            sanitize_commit_field(milestone.title.as_str()),
            milestone.id,
            sanitize_commit_field(goal.title.as_str()),
            sanitize_commit_field(evidence),
        );
        let mut commit = self.git();
        commit.arg("commit").arg("-m").arg(&message);
        let output = run_with_timeout(commit, GIT_TIMEOUT, "git commit")
            .await
            .map_err(AutoCoderError::Git)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            warn!(error = %stderr, "git commit failed");
            return Err(AutoCoderError::Git(stderr));
        }

        info!(milestone = %milestone.id, files = files.len(), "milestone work committed");
        Ok(CommitReport {
            committed: true,
            message,
            files,
        })
    }

    async fn file_diff(&self, path: &str) -> String {
        // Unstaged
        let mut unstaged = self.git();
        unstaged.args(["diff", "--", path]);
        if let Ok(diff) = run_capture(unstaged, GIT_TIMEOUT, "git diff").await {
            if !diff.trim().is_empty() {
                return diff;
            }
        }
        // Staged
        let mut staged = self.git();
        staged.args(["diff", "--cached", "--", path]);
        if let Ok(diff) = run_capture(staged, GIT_TIMEOUT, "git diff --cached").await {
            if !diff.trim().is_empty() {
                return diff;
            }
        }
        // Last commit
        let mut last = self.git();
        last.args(["diff", "HEAD~1..HEAD", "--", path]);
        if let Ok(diff) = run_capture(last, GIT_TIMEOUT, "git diff HEAD~1").await {
            if !diff.trim().is_empty() {
                return diff;
            }
        }
        "new file".to_string()
    }

    async fn modified_files(&self) -> Vec<String> {
        let mut status = self.git();
        status.args(["status", "--porcelain"]);
        let Ok(output) = run_capture(status, GIT_TIMEOUT, "git status").await else {
            return Vec::new();
        };
        output
            .lines()
            .filter_map(|line| line.get(3..))
            .filter(|path| {
                self.commit_paths
                    .iter()
                    .any(|prefix| path.starts_with(prefix.as_str()))
            })
            .map(str::to_string)
            .collect()
    }
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeAutoCoder;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Scripted auto-coder.
    #[derive(Clone)]
    pub struct FakeAutoCoder {
        pub tests_pass: Arc<std::sync::atomic::AtomicBool>,
        commits: Arc<Mutex<Vec<String>>>,
        modified: Arc<Mutex<Vec<String>>>,
    }

    impl FakeAutoCoder {
        pub fn new() -> Self {
            Self {
                tests_pass: Arc::new(std::sync::atomic::AtomicBool::new(true)),
                commits: Arc::new(Mutex::new(Vec::new())),
                modified: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn set_tests_pass(&self, pass: bool) {
            self.tests_pass
                .store(pass, std::sync::atomic::Ordering::SeqCst);
        }

        pub fn set_modified_files(&self, files: Vec<String>) {
            *self.modified.lock() = files;
        }

        pub fn commits(&self) -> Vec<String> {
            self.commits.lock().clone()
        }
    }

    impl Default for FakeAutoCoder {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl AutoCoder for FakeAutoCoder {
        async fn run_tests(&self) -> Result<TestRun, AutoCoderError> {
            let passed = self.tests_pass.load(std::sync::atomic::Ordering::SeqCst);
            Ok(TestRun {
                passed,
                output: if passed { "ok".into() } else { "1 failed".into() },
            })
        }

        async fn commit_and_report(
            &self,
            goal: &Goal,
            milestone: &Milestone,
            evidence: &str,
        ) -> Result<CommitReport, AutoCoderError> {
            let message = format!(
                "milestone: {} ({})\n\nGoal: {}\nEvidence: {}",
                sanitize_commit_field(&milestone.title),
                milestone.id,
                sanitize_commit_field(&goal.title),
                sanitize_commit_field(evidence),
            );
            self.commits.lock().push(message.clone());
            Ok(CommitReport {
                committed: true,
                message,
                files: self.modified.lock().clone(),
            })
        }

        async fn file_diff(&self, _path: &str) -> String {
            "fake diff".to_string()
        }

        async fn modified_files(&self) -> Vec<String> {
            self.modified.lock().clone()
        }
    }
}

/// Default milestone picking, exposed for tests of the trait's
/// provided methods.
#[cfg(test)]
pub(crate) struct PickOnly;

#[cfg(test)]
#[async_trait]
impl AutoCoder for PickOnly {
    async fn run_tests(&self) -> Result<TestRun, AutoCoderError> {
        Ok(TestRun {
            passed: true,
            output: String::new(),
        })
    }

    async fn commit_and_report(
        &self,
        _goal: &Goal,
        _milestone: &Milestone,
        _evidence: &str,
    ) -> Result<CommitReport, AutoCoderError> {
        Ok(CommitReport {
            committed: false,
            message: String::new(),
            files: Vec::new(),
        })
    }

    async fn file_diff(&self, _path: &str) -> String {
        String::new()
    }

    async fn modified_files(&self) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
#[path = "autocoder_tests.rs"]
mod tests;

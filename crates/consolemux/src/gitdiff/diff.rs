// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;
use std::path::{Path, PathBuf};

use git2::{DiffOptions, Repository};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::TargetRef;

/// Errors surfaced while resolving refs or computing a diff.
#[derive(Debug)]
pub enum GitDiffError {
    NotARepository,
    BadRef { raw: String },
    Git2(git2::Error),
}

impl fmt::Display for GitDiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotARepository => write!(f, "path is not inside a git repository"),
            Self::BadRef { raw } => write!(f, "could not resolve ref '{raw}'"),
            Self::Git2(e) => write!(f, "git operation failed: {e}"),
        }
    }
}

impl std::error::Error for GitDiffError {}

impl From<git2::Error> for GitDiffError {
    fn from(e: git2::Error) -> Self {
        Self::Git2(e)
    }
}

/// Whether a changed file's hunks are staged, unstaged, or untracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Staged,
    Unstaged,
    Untracked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffFileEntry {
    pub path: String,
    pub additions: usize,
    pub deletions: usize,
    pub is_binary: bool,
    pub stage_state: StageState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffSummary {
    pub files: Vec<DiffFileEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    pub summary: DiffSummary,
    pub raw_diff: String,
}

/// Per-session diff engine: resolves `(baseCommit, targetRef)` against a
/// worktree and produces a unified patch plus a per-file summary.
pub struct GitDiffEngine {
    worktree_path: PathBuf,
    base_commit: Option<String>,
    target_ref: TargetRef,
    cached: Option<DiffResult>,
}

impl GitDiffEngine {
    pub fn new(worktree_path: PathBuf) -> Self {
        Self { worktree_path, base_commit: None, target_ref: TargetRef::WorkingDir, cached: None }
    }

    pub fn target_ref(&self) -> &TargetRef {
        &self.target_ref
    }

    pub fn cached(&self) -> Option<&DiffResult> {
        self.cached.as_ref()
    }

    /// Resolve `git_ref` to a commit hash and adopt it as the diff base.
    /// Invalid refs fail with [`GitDiffError::BadRef`].
    pub fn set_base_commit(&mut self, git_ref: &str) -> Result<(), GitDiffError> {
        let repo = self.open_repo()?;
        let hash = resolve_to_commit_hash(&repo, git_ref).map_err(|e| {
            warn!(event = "gitdiff.bad_ref", git_ref, error = %e, "could not resolve base commit");
            GitDiffError::BadRef { raw: git_ref.to_owned() }
        })?;
        self.base_commit = Some(hash);
        Ok(())
    }

    pub fn set_target_ref(&mut self, target: TargetRef) {
        self.target_ref = target;
    }

    fn open_repo(&self) -> Result<Repository, GitDiffError> {
        Repository::discover(&self.worktree_path).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                GitDiffError::NotARepository
            } else {
                GitDiffError::Git2(e)
            }
        })
    }

    /// Recompute the diff summary and raw patch, caching and returning it.
    pub fn refresh(&mut self) -> Result<DiffResult, GitDiffError> {
        let repo = self.open_repo()?;
        let base_commit = self.base_commit.clone().ok_or(GitDiffError::BadRef { raw: String::new() })?;

        let base_tree = {
            let obj = repo.revparse_single(&base_commit)?;
            obj.peel_to_tree()?
        };

        let mut opts = DiffOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(true);

        let diff = match &self.target_ref {
            TargetRef::WorkingDir => repo.diff_tree_to_workdir_with_index(Some(&base_tree), Some(&mut opts))?,
            TargetRef::Head => {
                let head_tree = repo.head()?.peel_to_tree()?;
                repo.diff_tree_to_tree(Some(&base_tree), Some(&head_tree), Some(&mut opts))?
            }
            TargetRef::Commit(hash) => {
                let target_obj =
                    repo.revparse_single(hash).map_err(|_| GitDiffError::BadRef { raw: hash.clone() })?;
                let target_tree = target_obj.peel_to_tree()?;
                repo.diff_tree_to_tree(Some(&base_tree), Some(&target_tree), Some(&mut opts))?
            }
        };

        let mut raw = Vec::new();
        diff.print(git2::DiffFormat::Patch, |_delta, _hunk, line| {
            // File ('F') and hunk ('H') header lines come pre-formatted with
            // no marker prefix; content lines need their +/-/space origin.
            if matches!(line.origin(), '+' | '-' | ' ') {
                raw.push(line.origin() as u8);
            }
            raw.extend_from_slice(line.content());
            true
        })
        .map_err(GitDiffError::Git2)?;
        let raw_diff = String::from_utf8_lossy(&raw).into_owned();

        let stage_default = if self.target_ref.is_working_dir() { StageState::Unstaged } else { StageState::Staged };

        let mut files = Vec::new();
        let deltas: Vec<_> = diff.deltas().collect();
        let stats_per_file = diff_stats_per_file(&diff)?;
        for (i, delta) in deltas.iter().enumerate() {
            let path = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(path_to_string)
                .unwrap_or_default();
            let is_binary = delta.flags().is_binary();
            let (additions, deletions) = stats_per_file.get(i).copied().unwrap_or((0, 0));
            let untracked = delta.status() == git2::Delta::Untracked;
            files.push(DiffFileEntry {
                path,
                additions,
                deletions,
                is_binary,
                stage_state: if untracked { StageState::Untracked } else { stage_default },
            });
        }

        debug!(event = "gitdiff.refresh", files = files.len(), base = %base_commit, target = %self.target_ref, "recomputed diff");

        let result = DiffResult { summary: DiffSummary { files }, raw_diff };
        self.cached = Some(result.clone());
        Ok(result)
    }
}

fn resolve_to_commit_hash(repo: &Repository, git_ref: &str) -> Result<String, git2::Error> {
    let obj = repo.revparse_single(git_ref)?;
    let commit = obj.peel_to_commit()?;
    Ok(commit.id().to_string())
}

fn path_to_string(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

/// Per-delta (additions, deletions) line counts, in delta order.
///
/// `Diff::foreach`'s line callback receives the delta itself, not an index,
/// so counts are accumulated in file-visit order: `file_cb` pushes a new
/// `(0, 0)` entry per delta, and `line_cb` bumps the most recently pushed
/// entry. This relies on libgit2 visiting a delta's lines only between that
/// delta's `file_cb` call and the next one.
fn diff_stats_per_file(diff: &git2::Diff<'_>) -> Result<Vec<(usize, usize)>, git2::Error> {
    let mut counts: Vec<(usize, usize)> = Vec::new();
    diff.foreach(
        &mut |_delta, _progress| {
            counts.push((0, 0));
            true
        },
        None,
        None,
        Some(&mut |_delta, _hunk, line| {
            if let Some(entry) = counts.last_mut() {
                match line.origin() {
                    '+' => entry.0 += 1,
                    '-' => entry.1 += 1,
                    _ => {}
                }
            }
            true
        }),
    )?;
    Ok(counts)
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod tests;

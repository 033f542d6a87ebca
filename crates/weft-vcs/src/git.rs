// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{is_network_error, Result, VcsError};
use crate::types::{CommitSignature, MergeStyle, RepositoryStatus, UpdateOutcome};

/// A checked-out component repository driven through the git CLI.
#[derive(Debug)]
pub struct GitRepository {
	path: PathBuf,
	branch: String,
}

impl GitRepository {
	/// Opens an existing working tree.
	pub async fn open(path: impl Into<PathBuf>, branch: impl Into<String>) -> Result<Self> {
		let repo = Self { path: path.into(), branch: branch.into() };
		if run_git(&repo.path, &["rev-parse", "--git-dir"]).await.is_err() {
			return Err(VcsError::NotARepository(repo.path.display().to_string()));
		}
		Ok(repo)
	}

	/// Clones `url` into `path` and checks out `branch`.
	#[instrument(skip(url), fields(path = %path.as_ref().display(), branch = %branch))]
	pub async fn clone_from(url: &str, path: impl AsRef<Path>, branch: &str) -> Result<Self> {
		let path = path.as_ref();
		if let Some(parent) = path.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}

		let path_str = path.display().to_string();
		let result = run_git(
			Path::new("."),
			&["clone", "--branch", branch, "--", url, &path_str],
		)
		.await;

		if let Err(VcsError::CommandFailed { ref stderr, .. }) = result {
			if is_network_error(stderr) {
				return Err(VcsError::Network(stderr.clone()));
			}
		}
		result?;

		info!(url = %url, "cloned repository");
		Ok(Self { path: path.to_path_buf(), branch: branch.to_string() })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn branch(&self) -> &str {
		&self.branch
	}

	/// Fetches the remote without touching the working tree.
	pub async fn update_remote(&self) -> Result<()> {
		match run_git(&self.path, &["fetch", "origin", &self.branch]).await {
			Ok(_) => Ok(()),
			Err(VcsError::CommandFailed { stderr, args }) => {
				if is_network_error(&stderr) {
					Err(VcsError::Network(stderr))
				} else {
					Err(VcsError::CommandFailed { stderr, args })
				}
			}
			Err(e) => Err(e),
		}
	}

	/// Fetches and integrates remote changes using the component's merge
	/// style. On conflict the merge or rebase is aborted so the working
	/// tree stays clean, and the error names the conflicting paths.
	#[instrument(skip(self), fields(path = %self.path.display(), style = style.as_str()))]
	pub async fn update(&self, style: MergeStyle) -> Result<UpdateOutcome> {
		self.update_remote().await?;

		let before = self.last_revision().await?;
		let remote = self.remote_revision().await?;
		if before == remote {
			debug!("already up to date");
			return Ok(UpdateOutcome::NoChanges { revision: before });
		}

		let upstream = format!("origin/{}", self.branch);
		let integrate = match style {
			MergeStyle::Merge => run_git(&self.path, &["merge", "--no-edit", &upstream]).await,
			MergeStyle::Rebase => run_git(&self.path, &["rebase", &upstream]).await,
		};

		if let Err(VcsError::CommandFailed { ref stderr, .. }) = integrate {
			let paths = self.conflict_paths().await.unwrap_or_default();
			if !paths.is_empty() || stderr.to_lowercase().contains("conflict") {
				warn!(paths = ?paths, "integration conflict, aborting");
				let abort = match style {
					MergeStyle::Merge => ["merge", "--abort"],
					MergeStyle::Rebase => ["rebase", "--abort"],
				};
				let _ = run_git(&self.path, &abort).await;
				return Err(VcsError::Conflict { paths });
			}
		}
		integrate?;

		let revision = self.last_revision().await?;
		info!(revision = %revision, "integrated remote changes");
		Ok(UpdateOutcome::Updated { revision })
	}

	/// Stages `files` (all tracked changes when empty) and commits them
	/// with the translator as author. Returns the new revision.
	#[instrument(skip(self, message), fields(path = %self.path.display()))]
	pub async fn commit(
		&self,
		message: &str,
		author: &CommitSignature,
		files: &[&str],
	) -> Result<String> {
		if files.is_empty() {
			run_git(&self.path, &["add", "-A"]).await?;
		} else {
			let mut args = vec!["add", "--"];
			args.extend_from_slice(files);
			run_git(&self.path, &args).await?;
		}

		let author_arg = format!("--author={}", author.to_author());
		run_git(
			&self.path,
			&[
				"-c",
				"user.name=Weft",
				"-c",
				"user.email=noreply@weft.invalid",
				"commit",
				"-m",
				message,
				&author_arg,
			],
		)
		.await?;

		let sha = self.last_revision().await?;
		debug!(sha = %sha, "created commit");
		Ok(sha)
	}

	/// Pushes the local branch. Network failures are distinguished from
	/// rejections so callers can retry the former.
	pub async fn push(&self) -> Result<()> {
		match run_git(&self.path, &["push", "origin", &self.branch]).await {
			Ok(_) => {
				info!(branch = %self.branch, "pushed");
				Ok(())
			}
			Err(VcsError::CommandFailed { stderr, args }) => {
				if is_network_error(&stderr) {
					Err(VcsError::Network(stderr))
				} else {
					Err(VcsError::CommandFailed { stderr, args })
				}
			}
			Err(e) => Err(e),
		}
	}

	/// Discards all local commits and working tree changes, resetting to
	/// the remote branch head.
	#[instrument(skip(self), fields(path = %self.path.display()))]
	pub async fn reset(&self) -> Result<String> {
		self.update_remote().await?;
		let upstream = format!("origin/{}", self.branch);
		run_git(&self.path, &["reset", "--hard", &upstream]).await?;
		run_git(&self.path, &["clean", "-fd"]).await?;
		let revision = self.last_revision().await?;
		warn!(revision = %revision, "reset to remote head");
		Ok(revision)
	}

	pub async fn status(&self) -> Result<RepositoryStatus> {
		let porcelain = run_git(&self.path, &["status", "--porcelain"]).await?;
		let dirty_files = porcelain
			.lines()
			.filter_map(|line| (line.len() > 3).then(|| line[3..].to_string()))
			.collect();

		let upstream = format!("origin/{}...HEAD", self.branch);
		let counts = run_git(&self.path, &["rev-list", "--left-right", "--count", &upstream])
			.await
			.unwrap_or_default();
		let mut parts = counts.split_whitespace();
		let behind = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
		let ahead = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);

		Ok(RepositoryStatus { dirty_files, ahead, behind })
	}

	/// True when any tracked file under `pathspec` has uncommitted changes.
	pub async fn needs_commit(&self, pathspec: &str) -> Result<bool> {
		let output = run_git(&self.path, &["status", "--porcelain", "--", pathspec]).await?;
		Ok(!output.trim().is_empty())
	}

	pub async fn last_revision(&self) -> Result<String> {
		run_git(&self.path, &["rev-parse", "HEAD"]).await
	}

	pub async fn remote_revision(&self) -> Result<String> {
		let upstream = format!("origin/{}", self.branch);
		run_git(&self.path, &["rev-parse", &upstream]).await
	}

	/// Paths currently in the unmerged state.
	async fn conflict_paths(&self) -> Result<Vec<String>> {
		let output =
			run_git(&self.path, &["diff", "--name-only", "--diff-filter=U"]).await?;
		Ok(output.lines().map(str::to_string).filter(|l| !l.is_empty()).collect())
	}
}

/// Runs a git command in `path`, returning trimmed stdout on success.
async fn run_git(path: &Path, args: &[&str]) -> Result<String> {
	let mut cmd = Command::new("git");
	cmd.arg("-C").arg(path).args(args);

	trace!(cmd = %format!("git -C {} {}", path.display(), args.join(" ")), "running git");

	let output = cmd.output().await.map_err(|e| {
		if e.kind() == std::io::ErrorKind::NotFound {
			warn!("git not found in PATH");
			VcsError::GitNotInstalled
		} else {
			VcsError::Io(e)
		}
	})?;

	if output.status.success() {
		Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
	} else {
		Err(VcsError::CommandFailed {
			args: args.iter().map(|s| s.to_string()).collect(),
			stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
		})
	}
}

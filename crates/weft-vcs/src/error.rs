// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

pub type Result<T> = std::result::Result<T, VcsError>;

#[derive(Error, Debug)]
pub enum VcsError {
	#[error("git not installed or not in PATH")]
	GitNotInstalled,

	#[error("git {args:?} failed: {stderr}")]
	CommandFailed { args: Vec<String>, stderr: String },

	#[error("network error talking to remote: {0}")]
	Network(String),

	#[error("merge conflict in {}", paths.join(", "))]
	Conflict { paths: Vec<String> },

	#[error("not a git repository: {0}")]
	NotARepository(String),

	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
}

impl VcsError {
	/// True for errors worth retrying: transient network failures rather
	/// than repository state problems.
	pub fn is_transient(&self) -> bool {
		matches!(self, VcsError::Network(_))
	}
}

/// Classifies git stderr as a network failure.
pub(crate) fn is_network_error(stderr: &str) -> bool {
	let lower = stderr.to_lowercase();
	lower.contains("could not resolve host")
		|| lower.contains("connection refused")
		|| lower.contains("connection timed out")
		|| lower.contains("failed to connect")
		|| lower.contains("could not read from remote repository")
		|| lower.contains("the remote end hung up")
		|| lower.contains("early eof")
		|| lower.contains("operation timed out")
}

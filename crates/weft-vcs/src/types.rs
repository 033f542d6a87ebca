// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

/// How remote changes are integrated into the local branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStyle {
	Merge,
	Rebase,
}

impl MergeStyle {
	pub fn as_str(&self) -> &'static str {
		match self {
			MergeStyle::Merge => "merge",
			MergeStyle::Rebase => "rebase",
		}
	}
}

impl std::str::FromStr for MergeStyle {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"merge" => Ok(MergeStyle::Merge),
			"rebase" => Ok(MergeStyle::Rebase),
			other => Err(format!("unknown merge style: {other}")),
		}
	}
}

/// Author identity stamped on commits made on behalf of a translator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSignature {
	pub name: String,
	pub email: String,
}

impl CommitSignature {
	pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
		Self { name: name.into(), email: email.into() }
	}

	/// `Name <email>` form accepted by `git commit --author`.
	pub fn to_author(&self) -> String {
		format!("{} <{}>", self.name, self.email)
	}
}

/// Snapshot of where the working tree stands relative to its remote.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RepositoryStatus {
	pub dirty_files: Vec<String>,
	pub ahead: usize,
	pub behind: usize,
}

impl RepositoryStatus {
	pub fn needs_commit(&self) -> bool {
		!self.dirty_files.is_empty()
	}

	pub fn needs_push(&self) -> bool {
		self.ahead > 0
	}

	pub fn needs_merge(&self) -> bool {
		self.behind > 0
	}
}

/// Result of pulling remote changes into the working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
	/// Remote had new commits and they were integrated.
	Updated { revision: String },
	/// Local branch already matched the remote.
	NoChanges { revision: String },
}

impl UpdateOutcome {
	pub fn revision(&self) -> &str {
		match self {
			UpdateOutcome::Updated { revision } | UpdateOutcome::NoChanges { revision } => revision,
		}
	}
}

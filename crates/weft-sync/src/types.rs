// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

/// Which existing translations an upload may overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
	/// Only fill in units that are empty or marked for editing.
	OnlyUntranslated,
	/// Overwrite translated units too, but never approved ones.
	ReplaceTranslated,
	/// Overwrite everything except read-only units.
	ReplaceApproved,
}

impl std::str::FromStr for ConflictPolicy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"only-untranslated" => Ok(ConflictPolicy::OnlyUntranslated),
			"replace-translated" => Ok(ConflictPolicy::ReplaceTranslated),
			"replace-approved" => Ok(ConflictPolicy::ReplaceApproved),
			other => Err(format!("unknown conflict policy: {other}")),
		}
	}
}

/// Per-unit counters from one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct UploadOutcome {
	pub not_found: u64,
	pub skipped: u64,
	pub accepted: u64,
	pub total: u64,
}

/// Counters from one `pull_and_parse` pass over a component.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncReport {
	/// Working-copy revision after the update.
	pub revision: String,
	/// Translations whose stored revision already matched.
	pub skipped_translations: u64,
	/// Translation rows created for newly discovered files.
	pub new_translations: u64,
	/// Files that failed to parse (recorded as changes, not fatal).
	pub parse_errors: u64,
	pub units_created: u64,
	pub units_updated: u64,
	pub units_source_changed: u64,
	pub units_removed: u64,
	pub units_obsoleted: u64,
	pub units_unchanged: u64,
}

impl SyncReport {
	/// True when the pass changed nothing.
	pub fn is_noop(&self) -> bool {
		self.new_translations == 0
			&& self.parse_errors == 0
			&& self.units_created == 0
			&& self.units_updated == 0
			&& self.units_source_changed == 0
			&& self.units_removed == 0
			&& self.units_obsoleted == 0
	}
}

/// Result of `commit_pending`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
	/// No units carried uncommitted edits.
	NothingPending,
	Committed { revision: String, files: Vec<String> },
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_conflict_policy_parse() {
		assert_eq!(
			"only-untranslated".parse::<ConflictPolicy>().unwrap(),
			ConflictPolicy::OnlyUntranslated
		);
		assert_eq!(
			"replace-approved".parse::<ConflictPolicy>().unwrap(),
			ConflictPolicy::ReplaceApproved
		);
		assert!("overwrite-all".parse::<ConflictPolicy>().is_err());
	}

	#[test]
	fn test_sync_report_noop() {
		let mut report = SyncReport::default();
		report.skipped_translations = 3;
		report.units_unchanged = 10;
		assert!(report.is_noop());

		report.units_created = 1;
		assert!(!report.is_noop());
	}
}

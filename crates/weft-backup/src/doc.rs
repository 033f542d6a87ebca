// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

/// Archive entry holding the project manifest.
pub const MANIFEST_NAME: &str = "weft-backup.json";

/// Current archive document version. Bump on breaking layout changes.
pub const BACKUP_VERSION: i64 = 1;

/// `weft-backup.json`: project metadata plus the distinct label set in
/// use across the project's units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestDoc {
	pub version: i64,
	pub project: ProjectDoc,
	pub labels: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDoc {
	/// Original id, only used as a remapping key on restore.
	pub id: String,
	pub slug: String,
	pub name: String,
}

/// `components/<slug>.json`: one component with all translations and
/// units. Ids are the original ones; restore assigns fresh ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentDoc {
	pub id: String,
	pub slug: String,
	pub name: String,
	pub repo_url: String,
	pub branch: String,
	pub push_url: Option<String>,
	pub filemask: String,
	pub format: String,
	pub merge_style: String,
	pub locked: bool,
	pub remove_missing: bool,
	pub translations: Vec<TranslationDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationDoc {
	pub id: String,
	pub language: String,
	pub plural_count: i64,
	pub filename: String,
	pub revision: Option<String>,
	pub units: Vec<UnitDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitDoc {
	pub id: String,
	pub id_hash: i64,
	pub context: String,
	pub source: Vec<String>,
	pub target: Vec<String>,
	pub state: String,
	pub position: i64,
	pub content_hash: i64,
	pub target_hash: i64,
	pub explanation: String,
	pub extra_flags: String,
	pub labels: Vec<String>,
	pub pending: bool,
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

/// One string entry as a file format sees it: context plus source and
/// target plural forms. The database identity (`id_hash`) is derived from
/// `context` + `source` upstream; formats only carry the texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringRecord {
	pub context: String,
	pub source: Vec<String>,
	pub target: Vec<String>,
	pub flags: String,
	pub is_plural: bool,
}

impl StringRecord {
	pub fn new(context: impl Into<String>, source: impl Into<String>) -> Self {
		Self {
			context: context.into(),
			source: vec![source.into()],
			target: vec![String::new()],
			flags: String::new(),
			is_plural: false,
		}
	}

	/// Identity key within one file: context plus all source plural forms.
	pub fn key(&self) -> (String, Vec<String>) {
		(self.context.clone(), self.source.clone())
	}

	/// True when every target plural form is empty.
	pub fn is_untranslated(&self) -> bool {
		self.target.iter().all(|t| t.is_empty())
	}

	pub fn has_flag(&self, flag: &str) -> bool {
		self.flags.split(',').any(|f| f.trim() == flag)
	}
}

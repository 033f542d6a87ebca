// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::Path;

use globset::{Glob, GlobMatcher};

use crate::error::{Result, SyncError};

/// A component filemask like `po/*.po`: the single `*` stands for the
/// language code. Matching files are discovered under the working copy
/// and the language extracted from the starred segment.
pub struct Filemask {
	prefix: String,
	suffix: String,
	matcher: GlobMatcher,
}

impl Filemask {
	pub fn parse(mask: &str) -> Result<Self> {
		let (prefix, suffix) = mask
			.split_once('*')
			.ok_or_else(|| SyncError::InvalidFilemask(format!("{mask}: missing *")))?;
		if suffix.contains('*') {
			return Err(SyncError::InvalidFilemask(format!("{mask}: more than one *")));
		}

		let matcher = Glob::new(mask)
			.map_err(|e| SyncError::InvalidFilemask(e.to_string()))?
			.compile_matcher();

		Ok(Self { prefix: prefix.to_string(), suffix: suffix.to_string(), matcher })
	}

	/// Language code for a matching relative path, if any.
	pub fn language_of(&self, relative: &str) -> Option<String> {
		let language = relative.strip_prefix(&self.prefix)?.strip_suffix(&self.suffix)?;
		if language.is_empty() || language.contains('/') {
			return None;
		}
		Some(language.to_string())
	}

	/// Walks `root` and returns `(language, relative_path)` pairs for
	/// every file the mask matches, sorted by language.
	pub fn discover(&self, root: &Path) -> Result<Vec<(String, String)>> {
		let mut found = Vec::new();
		let mut stack = vec![root.to_path_buf()];

		while let Some(dir) = stack.pop() {
			for entry in std::fs::read_dir(&dir)? {
				let entry = entry?;
				let path = entry.path();
				if entry.file_type()?.is_dir() {
					if entry.file_name() != ".git" {
						stack.push(path);
					}
					continue;
				}

				let relative = match path.strip_prefix(root) {
					Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
					Err(_) => continue,
				};
				if self.matcher.is_match(&relative) {
					if let Some(language) = self.language_of(&relative) {
						found.push((language, relative));
					}
				}
			}
		}

		found.sort();
		Ok(found)
	}
}

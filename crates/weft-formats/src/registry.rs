// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{FormatError, Result};
use crate::json::JsonFormat;
use crate::po::PoFormat;
use crate::FileFormat;

/// Explicit registry of format adapters, keyed by identifier.
///
/// Built once at startup; components reference formats by identifier
/// string, and an unknown identifier is a hard error rather than a
/// silent fallback.
pub struct FormatRegistry {
	formats: HashMap<&'static str, Arc<dyn FileFormat>>,
}

impl FormatRegistry {
	pub fn new() -> Self {
		Self { formats: HashMap::new() }
	}

	/// Registry with all built-in formats.
	pub fn builtin() -> Self {
		let mut registry = Self::new();
		registry.register(Arc::new(PoFormat::new()));
		registry.register(Arc::new(JsonFormat::new()));
		registry
	}

	pub fn register(&mut self, format: Arc<dyn FileFormat>) {
		self.formats.insert(format.identifier(), format);
	}

	pub fn get(&self, identifier: &str) -> Result<Arc<dyn FileFormat>> {
		self.formats
			.get(identifier)
			.cloned()
			.ok_or_else(|| FormatError::UnsupportedFormat(identifier.to_string()))
	}

	pub fn contains(&self, identifier: &str) -> bool {
		self.formats.contains_key(identifier)
	}

	pub fn identifiers(&self) -> Vec<&'static str> {
		let mut ids: Vec<_> = self.formats.keys().copied().collect();
		ids.sort_unstable();
		ids
	}
}

impl Default for FormatRegistry {
	fn default() -> Self {
		Self::builtin()
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

/// Translation state of one unit.
///
/// `Empty` holds exactly when every target plural form is empty. `ReadOnly`
/// is terminal and set externally (glossary-locked terms); it rejects all
/// edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
	Empty,
	NeedsEditing,
	Translated,
	Approved,
	ReadOnly,
}

impl UnitState {
	pub fn as_str(&self) -> &'static str {
		match self {
			UnitState::Empty => "empty",
			UnitState::NeedsEditing => "needs_editing",
			UnitState::Translated => "translated",
			UnitState::Approved => "approved",
			UnitState::ReadOnly => "read_only",
		}
	}

	/// Numeric ordering used for comparisons (higher is further along).
	pub fn level(&self) -> i64 {
		match self {
			UnitState::Empty => 0,
			UnitState::NeedsEditing => 10,
			UnitState::Translated => 20,
			UnitState::Approved => 30,
			UnitState::ReadOnly => 100,
		}
	}

	pub fn is_translated(&self) -> bool {
		matches!(self, UnitState::Translated | UnitState::Approved)
	}
}

impl std::str::FromStr for UnitState {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"empty" => Ok(UnitState::Empty),
			"needs_editing" => Ok(UnitState::NeedsEditing),
			"translated" => Ok(UnitState::Translated),
			"approved" => Ok(UnitState::Approved),
			"read_only" => Ok(UnitState::ReadOnly),
			other => Err(format!("unknown unit state: {other}")),
		}
	}
}

impl std::fmt::Display for UnitState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

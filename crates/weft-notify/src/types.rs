// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

/// Subscription scope, from broadest to most specific. The numeric value
/// is what the store persists and orders by; higher shadows lower for the
/// same user and kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
	All,
	Watched,
	Admin,
	Project,
	Component,
}

impl Scope {
	pub fn as_i64(&self) -> i64 {
		match self {
			Scope::All => 10,
			Scope::Watched => 20,
			Scope::Admin => 30,
			Scope::Project => 40,
			Scope::Component => 50,
		}
	}

	pub fn from_i64(value: i64) -> Option<Self> {
		match value {
			10 => Some(Scope::All),
			20 => Some(Scope::Watched),
			30 => Some(Scope::Admin),
			40 => Some(Scope::Project),
			50 => Some(Scope::Component),
			_ => None,
		}
	}
}

/// How often a subscriber hears about matching changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
	Instant,
	Daily,
	Weekly,
	Monthly,
}

impl Frequency {
	pub fn as_str(&self) -> &'static str {
		match self {
			Frequency::Instant => "instant",
			Frequency::Daily => "daily",
			Frequency::Weekly => "weekly",
			Frequency::Monthly => "monthly",
		}
	}
}

impl std::str::FromStr for Frequency {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"instant" => Ok(Frequency::Instant),
			"daily" => Ok(Frequency::Daily),
			"weekly" => Ok(Frequency::Weekly),
			"monthly" => Ok(Frequency::Monthly),
			_ => Err(()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_scope_roundtrip() {
		for scope in [
			Scope::All,
			Scope::Watched,
			Scope::Admin,
			Scope::Project,
			Scope::Component,
		] {
			assert_eq!(Scope::from_i64(scope.as_i64()), Some(scope));
		}
		assert_eq!(Scope::from_i64(99), None);
	}

	#[test]
	fn test_scope_specificity_ordering() {
		assert!(Scope::Component.as_i64() > Scope::Project.as_i64());
		assert!(Scope::Project.as_i64() > Scope::Admin.as_i64());
		assert!(Scope::Admin.as_i64() > Scope::Watched.as_i64());
		assert!(Scope::Watched.as_i64() > Scope::All.as_i64());
	}

	#[test]
	fn test_frequency_roundtrip() {
		for frequency in [
			Frequency::Instant,
			Frequency::Daily,
			Frequency::Weekly,
			Frequency::Monthly,
		] {
			assert_eq!(frequency.as_str().parse::<Frequency>(), Ok(frequency));
		}
		assert!("hourly".parse::<Frequency>().is_err());
	}
}

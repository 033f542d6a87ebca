// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;

use weft_db::ChangeAction;

use crate::error::{NotifyError, Result};

/// The closed set of notification kinds. New kinds are added here, not
/// registered at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
	NewString,
	TranslatedString,
	ApprovedString,
	NewSuggestion,
	NewComment,
	MentionComment,
	LastAuthorComment,
	MergeFailure,
	ParseError,
	ComponentLocked,
	PendingSuggestions,
}

impl NotificationKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			NotificationKind::NewString => "new_string",
			NotificationKind::TranslatedString => "translated_string",
			NotificationKind::ApprovedString => "approved_string",
			NotificationKind::NewSuggestion => "new_suggestion",
			NotificationKind::NewComment => "new_comment",
			NotificationKind::MentionComment => "mention_comment",
			NotificationKind::LastAuthorComment => "last_author_comment",
			NotificationKind::MergeFailure => "merge_failure",
			NotificationKind::ParseError => "parse_error",
			NotificationKind::ComponentLocked => "component_locked",
			NotificationKind::PendingSuggestions => "pending_suggestions",
		}
	}
}

impl std::str::FromStr for NotificationKind {
	type Err = ();

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"new_string" => Ok(NotificationKind::NewString),
			"translated_string" => Ok(NotificationKind::TranslatedString),
			"approved_string" => Ok(NotificationKind::ApprovedString),
			"new_suggestion" => Ok(NotificationKind::NewSuggestion),
			"new_comment" => Ok(NotificationKind::NewComment),
			"mention_comment" => Ok(NotificationKind::MentionComment),
			"last_author_comment" => Ok(NotificationKind::LastAuthorComment),
			"merge_failure" => Ok(NotificationKind::MergeFailure),
			"parse_error" => Ok(NotificationKind::ParseError),
			"component_locked" => Ok(NotificationKind::ComponentLocked),
			"pending_suggestions" => Ok(NotificationKind::PendingSuggestions),
			_ => Err(()),
		}
	}
}

/// How one notification kind behaves.
#[derive(Debug, Clone)]
pub struct KindSpec {
	/// Change actions that trigger this kind.
	pub actions: Vec<ChangeAction>,
	/// Watched-scope subscriptions never match this kind.
	pub ignore_watched: bool,
	/// Suppress this kind for a user who would also be notified by any
	/// of these kinds for the same change.
	pub skip_when_notify: Vec<NotificationKind>,
	/// Never sent instantly, only gathered into digests.
	pub digest_only: bool,
}

impl KindSpec {
	fn new(actions: Vec<ChangeAction>) -> Self {
		Self {
			actions,
			ignore_watched: false,
			skip_when_notify: Vec::new(),
			digest_only: false,
		}
	}

	fn skip_when(mut self, kinds: Vec<NotificationKind>) -> Self {
		self.skip_when_notify = kinds;
		self
	}

	fn digest_only(mut self) -> Self {
		self.digest_only = true;
		self
	}
}

/// Static kind table, built once at startup and passed by reference.
/// Construction fails if the skip-rule graph has a cycle.
pub struct NotificationRegistry {
	entries: HashMap<NotificationKind, KindSpec>,
}

impl NotificationRegistry {
	pub fn builtin() -> Result<Self> {
		let mut entries = HashMap::new();

		entries.insert(
			NotificationKind::NewString,
			KindSpec::new(vec![ChangeAction::NewUnit, ChangeAction::NewTranslationFile]),
		);
		entries.insert(
			NotificationKind::TranslatedString,
			KindSpec::new(vec![ChangeAction::Translated]),
		);
		entries.insert(
			NotificationKind::ApprovedString,
			KindSpec::new(vec![ChangeAction::Approved]),
		);
		entries.insert(
			NotificationKind::NewSuggestion,
			KindSpec::new(vec![ChangeAction::Suggestion]),
		);
		// The generic comment kind yields to the two targeted ones.
		entries.insert(
			NotificationKind::NewComment,
			KindSpec::new(vec![ChangeAction::Comment]).skip_when(vec![
				NotificationKind::MentionComment,
				NotificationKind::LastAuthorComment,
			]),
		);
		entries.insert(
			NotificationKind::MentionComment,
			KindSpec::new(vec![ChangeAction::Comment]),
		);
		entries.insert(
			NotificationKind::LastAuthorComment,
			KindSpec::new(vec![ChangeAction::Comment]),
		);
		entries.insert(
			NotificationKind::MergeFailure,
			KindSpec::new(vec![
				ChangeAction::FailedMerge,
				ChangeAction::FailedRebase,
				ChangeAction::FailedPush,
			]),
		);
		entries.insert(
			NotificationKind::ParseError,
			KindSpec::new(vec![ChangeAction::ParseError]),
		);
		entries.insert(
			NotificationKind::ComponentLocked,
			KindSpec::new(vec![ChangeAction::Locked, ChangeAction::Unlocked]),
		);
		entries.insert(
			NotificationKind::PendingSuggestions,
			KindSpec::new(vec![ChangeAction::Suggestion]).digest_only(),
		);

		Self::from_entries(entries)
	}

	/// Validates the skip-rule graph before accepting the table.
	pub fn from_entries(entries: HashMap<NotificationKind, KindSpec>) -> Result<Self> {
		let registry = Self { entries };
		registry.check_acyclic()?;
		Ok(registry)
	}

	pub fn spec(&self, kind: NotificationKind) -> Result<&KindSpec> {
		self
			.entries
			.get(&kind)
			.ok_or_else(|| NotifyError::UnknownKind(kind.as_str().to_string()))
	}

	pub fn kinds(&self) -> impl Iterator<Item = NotificationKind> + '_ {
		self.entries.keys().copied()
	}

	/// Kinds triggered by the given change action.
	pub fn kinds_for_action(&self, action: ChangeAction) -> Vec<NotificationKind> {
		let mut kinds: Vec<NotificationKind> = self
			.entries
			.iter()
			.filter(|(_, spec)| spec.actions.contains(&action))
			.map(|(kind, _)| *kind)
			.collect();
		kinds.sort_by_key(|k| k.as_str());
		kinds
	}

	fn check_acyclic(&self) -> Result<()> {
		for start in self.entries.keys() {
			let mut path = vec![*start];
			self.walk(*start, &mut path)?;
		}
		Ok(())
	}

	fn walk(&self, kind: NotificationKind, path: &mut Vec<NotificationKind>) -> Result<()> {
		let Some(spec) = self.entries.get(&kind) else {
			return Ok(());
		};
		for next in &spec.skip_when_notify {
			if path.contains(next) {
				let mut names: Vec<&str> = path.iter().map(|k| k.as_str()).collect();
				names.push(next.as_str());
				return Err(NotifyError::SkipCycle(names.join(" -> ")));
			}
			path.push(*next);
			self.walk(*next, path)?;
			path.pop();
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_builtin_registry_is_valid() {
		let registry = NotificationRegistry::builtin().unwrap();
		assert!(registry.spec(NotificationKind::NewString).is_ok());
	}

	#[test]
	fn test_kinds_for_action() {
		let registry = NotificationRegistry::builtin().unwrap();

		let kinds = registry.kinds_for_action(ChangeAction::Comment);
		assert!(kinds.contains(&NotificationKind::NewComment));
		assert!(kinds.contains(&NotificationKind::MentionComment));
		assert!(kinds.contains(&NotificationKind::LastAuthorComment));

		let kinds = registry.kinds_for_action(ChangeAction::NewUnit);
		assert_eq!(kinds, vec![NotificationKind::NewString]);

		assert!(registry.kinds_for_action(ChangeAction::Commit).is_empty());
	}

	#[test]
	fn test_cycle_is_rejected() {
		let mut entries = HashMap::new();
		entries.insert(
			NotificationKind::NewComment,
			KindSpec::new(vec![ChangeAction::Comment])
				.skip_when(vec![NotificationKind::MentionComment]),
		);
		entries.insert(
			NotificationKind::MentionComment,
			KindSpec::new(vec![ChangeAction::Comment]).skip_when(vec![NotificationKind::NewComment]),
		);

		let result = NotificationRegistry::from_entries(entries);
		assert!(matches!(result, Err(NotifyError::SkipCycle(_))));
	}

	#[test]
	fn test_self_cycle_is_rejected() {
		let mut entries = HashMap::new();
		entries.insert(
			NotificationKind::NewComment,
			KindSpec::new(vec![ChangeAction::Comment]).skip_when(vec![NotificationKind::NewComment]),
		);

		let result = NotificationRegistry::from_entries(entries);
		assert!(matches!(result, Err(NotifyError::SkipCycle(_))));
	}

	#[test]
	fn test_kind_str_roundtrip() {
		for kind in [
			NotificationKind::NewString,
			NotificationKind::MentionComment,
			NotificationKind::PendingSuggestions,
		] {
			assert_eq!(kind.as_str().parse::<NotificationKind>(), Ok(kind));
		}
	}
}

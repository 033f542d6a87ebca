// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use weft_db::{
	ChangeAction, ChangeRepository, ComponentRepository, DbError, NewChange, TranslationRecord,
	UnitRecord, UnitRepository,
};

use crate::error::{Result, UnitError};
use crate::hash::{calculate_content_hash, calculate_target_hash};
use crate::query::parse_query;
use crate::state::UnitState;

/// Hashes the caller fetched before editing. An edit is rejected when the
/// row has moved past these values under someone else's hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditPrecondition {
	pub content_hash: i64,
	pub target_hash: i64,
}

impl From<&UnitRecord> for EditPrecondition {
	fn from(unit: &UnitRecord) -> Self {
		Self { content_hash: unit.content_hash, target_hash: unit.target_hash }
	}
}

/// Result of reconciling one parsed string against the unit table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindOrCreateOutcome {
	Created(UnitRecord),
	Unchanged(UnitRecord),
	/// Source text or structural flags changed upstream; translated
	/// targets were demoted to needs_editing.
	SourceChanged(UnitRecord),
}

impl FindOrCreateOutcome {
	pub fn unit(&self) -> &UnitRecord {
		match self {
			FindOrCreateOutcome::Created(u)
			| FindOrCreateOutcome::Unchanged(u)
			| FindOrCreateOutcome::SourceChanged(u) => u,
		}
	}

	pub fn is_unchanged(&self) -> bool {
		matches!(self, FindOrCreateOutcome::Unchanged(_))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BulkEditOutcome {
	pub applied: u64,
	pub failed: u64,
}

/// Domain operations over units. All writes append a change record in the
/// same transaction as the row mutation.
#[derive(Clone)]
pub struct UnitService {
	units: UnitRepository,
	components: ComponentRepository,
	changes: ChangeRepository,
}

impl UnitService {
	pub fn new(
		units: UnitRepository,
		components: ComponentRepository,
		changes: ChangeRepository,
	) -> Self {
		Self { units, components, changes }
	}

	pub fn units(&self) -> &UnitRepository {
		&self.units
	}

	async fn change_base(
		&self,
		translation: &TranslationRecord,
		action: ChangeAction,
	) -> Result<NewChange> {
		let component = self
			.components
			.get_component_by_id(translation.component_id)
			.await?
			.ok_or(UnitError::TranslationNotFound(translation.id))?;
		Ok(NewChange::new(action)
			.project(component.project_id)
			.component(component.id)
			.translation(translation.id))
	}

	/// Idempotent by `id_hash`. A content change on an existing unit never
	/// blindly overwrites: the source is updated and any translated target
	/// is demoted to needs_editing for re-review.
	#[instrument(skip(self, translation, context, source), fields(translation_id = %translation.id, id_hash))]
	pub async fn find_or_create(
		&self,
		translation: &TranslationRecord,
		id_hash: i64,
		context: &str,
		source: &[String],
		extra_flags: &str,
		position: i64,
	) -> Result<FindOrCreateOutcome> {
		let content_hash = calculate_content_hash(context, source, extra_flags);

		if let Some(mut existing) = self.units.get_by_id_hash(translation.id, id_hash).await? {
			if existing.content_hash == content_hash {
				if existing.position != position {
					existing.position = position;
					existing.updated_at = Utc::now();
					self.units.update(&existing).await?;
				}
				return Ok(FindOrCreateOutcome::Unchanged(existing));
			}

			let state: UnitState =
				existing.state.parse().map_err(UnitError::InvalidState)?;
			existing.context = context.to_string();
			existing.source = source.to_vec();
			existing.extra_flags = extra_flags.to_string();
			existing.content_hash = content_hash;
			existing.position = position;
			if state.is_translated() {
				existing.state = UnitState::NeedsEditing.as_str().to_string();
			}
			existing.updated_at = Utc::now();

			let change = self
				.change_base(translation, ChangeAction::SourceChange)
				.await?
				.unit(existing.id);

			let mut tx = self.units.pool().begin().await.map_err(DbError::from)?;
			self.units.update_with_executor(&mut *tx, &existing).await?;
			self.changes.append_with_executor(&mut *tx, &change).await?;
			tx.commit().await.map_err(DbError::from)?;

			info!(unit_id = %existing.id, "source changed, demoted to needs_editing");
			return Ok(FindOrCreateOutcome::SourceChanged(existing));
		}

		let now = Utc::now();
		let unit = UnitRecord {
			id: Uuid::new_v4(),
			translation_id: translation.id,
			id_hash,
			context: context.to_string(),
			source: source.to_vec(),
			target: vec![String::new(); source.len().max(1)],
			state: UnitState::Empty.as_str().to_string(),
			position,
			content_hash,
			target_hash: calculate_target_hash(&vec![String::new(); source.len().max(1)]),
			explanation: String::new(),
			extra_flags: extra_flags.to_string(),
			labels: Vec::new(),
			last_edited_by: None,
			pending: false,
			created_at: now,
			updated_at: now,
		};

		let change = self
			.change_base(translation, ChangeAction::NewUnit)
			.await?
			.unit(unit.id);

		let mut tx = self.units.pool().begin().await.map_err(DbError::from)?;
		self.units.create_with_executor(&mut *tx, &unit).await?;
		self.changes.append_with_executor(&mut *tx, &change).await?;
		tx.commit().await.map_err(DbError::from)?;

		debug!(unit_id = %unit.id, "created unit");
		Ok(FindOrCreateOutcome::Created(unit))
	}

	/// Applies a translator edit with optimistic concurrency.
	///
	/// The precondition carries the hashes the caller saw when it loaded
	/// the unit. A mismatch fails with [`UnitError::ConcurrentEdit`] unless
	/// the last editor is the acting user again (repeated self-edits are
	/// not conflicts).
	#[instrument(skip(self, new_target), fields(unit_id = %unit_id, actor = %actor, new_state = %new_state))]
	pub async fn translate(
		&self,
		unit_id: Uuid,
		new_target: Vec<String>,
		new_state: UnitState,
		actor: Uuid,
		precondition: EditPrecondition,
		can_review: bool,
	) -> Result<UnitRecord> {
		let mut unit = self
			.units
			.get_by_id(unit_id)
			.await?
			.ok_or(UnitError::NotFound(unit_id))?;
		let translation = self
			.components
			.get_translation_by_id(unit.translation_id)
			.await?
			.ok_or(UnitError::TranslationNotFound(unit.translation_id))?;

		let current: UnitState = unit.state.parse().map_err(UnitError::InvalidState)?;
		if current == UnitState::ReadOnly {
			return Err(UnitError::ReadOnly);
		}
		if new_state == UnitState::ReadOnly {
			return Err(UnitError::InvalidState(
				"read_only is set through flags, not through translate".to_string(),
			));
		}

		let required = if unit.source.len() > 1 {
			translation.plural_count as usize
		} else {
			1
		};
		if new_target.len() != required {
			return Err(UnitError::PluralMismatch { expected: required, got: new_target.len() });
		}

		let target_empty = new_target.iter().all(|t| t.is_empty());
		if target_empty != (new_state == UnitState::Empty) {
			return Err(UnitError::InvalidState(format!(
				"state {new_state} does not match {} target",
				if target_empty { "an empty" } else { "a non-empty" }
			)));
		}
		if new_state == UnitState::Approved && !can_review {
			return Err(UnitError::ReviewPermissionRequired);
		}

		let stale = unit.content_hash != precondition.content_hash
			|| unit.target_hash != precondition.target_hash;
		if stale && unit.last_edited_by != Some(actor) {
			warn!(unit_id = %unit.id, "rejecting concurrent edit");
			return Err(UnitError::ConcurrentEdit { unit_id: unit.id });
		}

		unit.target = new_target;
		unit.target_hash = calculate_target_hash(&unit.target);
		unit.state = new_state.as_str().to_string();
		unit.last_edited_by = Some(actor);
		unit.pending = true;
		unit.updated_at = Utc::now();

		let action = match new_state {
			UnitState::Approved => ChangeAction::Approved,
			UnitState::NeedsEditing | UnitState::Empty => ChangeAction::MarkedForEdit,
			_ => ChangeAction::Translated,
		};
		let change = self
			.change_base(&translation, action)
			.await?
			.unit(unit.id)
			.user(actor);

		let mut tx = self.units.pool().begin().await.map_err(DbError::from)?;
		self.units.update_with_executor(&mut *tx, &unit).await?;
		self.changes.append_with_executor(&mut *tx, &change).await?;
		tx.commit().await.map_err(DbError::from)?;

		info!(unit_id = %unit.id, state = %new_state, "unit translated");
		Ok(unit)
	}

	/// Copies target and state from another unit with the same source
	/// text. The comparison is literal, not by hash, so a hash collision
	/// can never smuggle in a wrong translation.
	#[instrument(skip(self), fields(unit_id = %unit_id, source_unit_id = %source_unit_id))]
	pub async fn merge(
		&self,
		unit_id: Uuid,
		source_unit_id: Uuid,
		actor: Uuid,
		can_review: bool,
	) -> Result<UnitRecord> {
		let mut unit = self
			.units
			.get_by_id(unit_id)
			.await?
			.ok_or(UnitError::NotFound(unit_id))?;
		let other = self
			.units
			.get_by_id(source_unit_id)
			.await?
			.ok_or(UnitError::NotFound(source_unit_id))?;

		let current: UnitState = unit.state.parse().map_err(UnitError::InvalidState)?;
		if current == UnitState::ReadOnly {
			return Err(UnitError::ReadOnly);
		}
		if unit.source != other.source {
			return Err(UnitError::SourceMismatch);
		}

		let mut state: UnitState = other.state.parse().map_err(UnitError::InvalidState)?;
		if state == UnitState::Approved && !can_review {
			state = UnitState::Translated;
		}
		if other.target.iter().all(|t| t.is_empty()) {
			state = UnitState::Empty;
		}

		let translation = self
			.components
			.get_translation_by_id(unit.translation_id)
			.await?
			.ok_or(UnitError::TranslationNotFound(unit.translation_id))?;

		unit.target = other.target.clone();
		unit.target_hash = calculate_target_hash(&unit.target);
		unit.state = state.as_str().to_string();
		unit.last_edited_by = Some(actor);
		unit.pending = true;
		unit.updated_at = Utc::now();

		let change = self
			.change_base(&translation, ChangeAction::Translated)
			.await?
			.unit(unit.id)
			.user(actor)
			.details(serde_json::json!({ "merged_from": source_unit_id }));

		let mut tx = self.units.pool().begin().await.map_err(DbError::from)?;
		self.units.update_with_executor(&mut *tx, &unit).await?;
		self.changes.append_with_executor(&mut *tx, &change).await?;
		tx.commit().await.map_err(DbError::from)?;

		Ok(unit)
	}

	/// Applies state and flag edits to every unit matching `query`.
	///
	/// Atomic per unit only: a unit that cannot take the edit (read-only,
	/// approval without review rights, state that contradicts its target)
	/// is counted as failed and the rest proceed.
	#[instrument(skip(self, query), fields(translation_id = %translation_id, actor = %actor))]
	pub async fn bulk_edit(
		&self,
		translation_id: Uuid,
		query: &str,
		new_state: Option<UnitState>,
		add_flags: &[&str],
		remove_flags: &[&str],
		actor: Uuid,
		can_review: bool,
	) -> Result<BulkEditOutcome> {
		let predicate = parse_query(query)?;
		let translation = self
			.components
			.get_translation_by_id(translation_id)
			.await?
			.ok_or(UnitError::TranslationNotFound(translation_id))?;

		let units = self.units.list_by_translation(translation_id).await?;
		let mut outcome = BulkEditOutcome::default();

		for unit in units.into_iter().filter(|u| predicate.matches(u)) {
			match self
				.apply_bulk_edit(&translation, unit, new_state, add_flags, remove_flags, actor, can_review)
				.await
			{
				Ok(()) => outcome.applied += 1,
				Err(UnitError::Db(e)) => return Err(UnitError::Db(e)),
				Err(e) => {
					debug!(error = %e, "bulk edit skipped unit");
					outcome.failed += 1;
				}
			}
		}

		info!(applied = outcome.applied, failed = outcome.failed, "bulk edit finished");
		Ok(outcome)
	}

	async fn apply_bulk_edit(
		&self,
		translation: &TranslationRecord,
		mut unit: UnitRecord,
		new_state: Option<UnitState>,
		add_flags: &[&str],
		remove_flags: &[&str],
		actor: Uuid,
		can_review: bool,
	) -> Result<()> {
		let current: UnitState = unit.state.parse().map_err(UnitError::InvalidState)?;
		if current == UnitState::ReadOnly {
			return Err(UnitError::ReadOnly);
		}

		if let Some(state) = new_state {
			if state == UnitState::Approved && !can_review {
				return Err(UnitError::ReviewPermissionRequired);
			}
			let target_empty = unit.target.iter().all(|t| t.is_empty());
			if target_empty != (state == UnitState::Empty) {
				return Err(UnitError::InvalidState(format!(
					"cannot set state {state} on this unit"
				)));
			}
			unit.state = state.as_str().to_string();
		}

		if !add_flags.is_empty() || !remove_flags.is_empty() {
			let mut flags: Vec<String> = unit
				.extra_flags
				.split(',')
				.map(str::trim)
				.filter(|f| !f.is_empty() && !remove_flags.contains(f))
				.map(str::to_string)
				.collect();
			for flag in add_flags {
				if !flags.iter().any(|f| f == flag) {
					flags.push(flag.to_string());
				}
			}
			unit.extra_flags = flags.join(", ");
			unit.content_hash =
				calculate_content_hash(&unit.context, &unit.source, &unit.extra_flags);
		}

		unit.last_edited_by = Some(actor);
		unit.updated_at = Utc::now();

		let change = self
			.change_base(translation, ChangeAction::BulkEdit)
			.await?
			.unit(unit.id)
			.user(actor);

		let mut tx = self.units.pool().begin().await.map_err(DbError::from)?;
		self.units.update_with_executor(&mut *tx, &unit).await?;
		self.changes.append_with_executor(&mut *tx, &change).await?;
		tx.commit().await.map_err(DbError::from)?;
		Ok(())
	}

	/// Removes a unit and records the removal. The file itself is updated
	/// by the sync engine on the next commit pass.
	#[instrument(skip(self), fields(unit_id = %unit_id, actor = %actor))]
	pub async fn delete(&self, unit_id: Uuid, actor: Uuid) -> Result<()> {
		let unit = self
			.units
			.get_by_id(unit_id)
			.await?
			.ok_or(UnitError::NotFound(unit_id))?;
		let translation = self
			.components
			.get_translation_by_id(unit.translation_id)
			.await?
			.ok_or(UnitError::TranslationNotFound(unit.translation_id))?;

		let change = self
			.change_base(&translation, ChangeAction::RemovedUnit)
			.await?
			.user(actor)
			.details(serde_json::json!({ "context": unit.context, "source": unit.source }));

		self.units.delete(unit_id).await?;
		self.changes.append(&change).await?;
		info!(unit_id = %unit_id, "unit removed");
		Ok(())
	}

	/// Units of a translation matching a search query.
	pub async fn search(&self, translation_id: Uuid, query: &str) -> Result<Vec<UnitRecord>> {
		let predicate = parse_query(query)?;
		let units = self.units.list_by_translation(translation_id).await?;
		Ok(units.into_iter().filter(|u| predicate.matches(u)).collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use weft_db::testing::{create_core_test_pool, seed_translation, seed_translation_for_language};

	async fn service(pool: &sqlx::SqlitePool) -> UnitService {
		UnitService::new(
			UnitRepository::new(pool.clone()),
			ComponentRepository::new(pool.clone()),
			ChangeRepository::new(pool.clone()),
		)
	}

	async fn translation_record(
		pool: &sqlx::SqlitePool,
		translation_id: Uuid,
	) -> TranslationRecord {
		ComponentRepository::new(pool.clone())
			.get_translation_by_id(translation_id)
			.await
			.unwrap()
			.unwrap()
	}

	async fn change_count(pool: &sqlx::SqlitePool, translation_id: Uuid) -> usize {
		ChangeRepository::new(pool.clone())
			.list(&weft_db::ChangeFilter {
				translation_id: Some(translation_id),
				..Default::default()
			})
			.await
			.unwrap()
			.len()
	}

	async fn seed_unit(svc: &UnitService, translation: &TranslationRecord) -> UnitRecord {
		let source = vec!["Hello".to_string()];
		let id_hash = crate::hash::calculate_id_hash("", &source);
		match svc
			.find_or_create(translation, id_hash, "", &source, "", 0)
			.await
			.unwrap()
		{
			FindOrCreateOutcome::Created(unit) => unit,
			other => panic!("expected created, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn test_find_or_create_is_idempotent() {
		let pool = create_core_test_pool().await;
		let svc = service(&pool).await;
		let translation_id = seed_translation(&pool).await;
		let translation = translation_record(&pool, translation_id).await;

		let unit = seed_unit(&svc, &translation).await;
		assert_eq!(unit.state, "empty");
		let changes_after_create = change_count(&pool, translation_id).await;

		let again = svc
			.find_or_create(&translation, unit.id_hash, "", &unit.source, "", 0)
			.await
			.unwrap();
		assert!(again.is_unchanged());
		assert_eq!(again.unit().id, unit.id);
		// No new change record on the idempotent pass
		assert_eq!(change_count(&pool, translation_id).await, changes_after_create);
	}

	#[tokio::test]
	async fn test_source_change_demotes_translated_unit() {
		let pool = create_core_test_pool().await;
		let svc = service(&pool).await;
		let translation_id = seed_translation(&pool).await;
		let translation = translation_record(&pool, translation_id).await;

		let unit = seed_unit(&svc, &translation).await;
		let translated = svc
			.translate(
				unit.id,
				vec!["Ahoj".to_string()],
				UnitState::Translated,
				Uuid::new_v4(),
				EditPrecondition::from(&unit),
				false,
			)
			.await
			.unwrap();
		assert_eq!(translated.state, "translated");

		// Same id_hash, new source text (monolingual-style key reuse)
		let outcome = svc
			.find_or_create(&translation, unit.id_hash, "", &["Hello world".to_string()], "", 0)
			.await
			.unwrap();
		match outcome {
			FindOrCreateOutcome::SourceChanged(updated) => {
				assert_eq!(updated.state, "needs_editing");
				assert_eq!(updated.source, vec!["Hello world"]);
				// Target survives for the translator to fix up
				assert_eq!(updated.target, vec!["Ahoj"]);
			}
			other => panic!("expected source change, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn test_translate_happy_path_records_change() {
		let pool = create_core_test_pool().await;
		let svc = service(&pool).await;
		let translation_id = seed_translation(&pool).await;
		let translation = translation_record(&pool, translation_id).await;

		let unit = seed_unit(&svc, &translation).await;
		let before = change_count(&pool, translation_id).await;
		let actor = Uuid::new_v4();

		let updated = svc
			.translate(
				unit.id,
				vec!["Ahoj".to_string()],
				UnitState::Translated,
				actor,
				EditPrecondition::from(&unit),
				false,
			)
			.await
			.unwrap();

		assert_eq!(updated.state, "translated");
		assert!(updated.pending);
		assert_eq!(updated.last_edited_by, Some(actor));
		assert_ne!(updated.target_hash, unit.target_hash);
		assert_eq!(change_count(&pool, translation_id).await, before + 1);
	}

	#[tokio::test]
	async fn test_concurrent_edit_by_other_user_rejected() {
		let pool = create_core_test_pool().await;
		let svc = service(&pool).await;
		let translation_id = seed_translation(&pool).await;
		let translation = translation_record(&pool, translation_id).await;

		let unit = seed_unit(&svc, &translation).await;
		let stale = EditPrecondition::from(&unit);

		let alice = Uuid::new_v4();
		let bob = Uuid::new_v4();

		svc.translate(
			unit.id,
			vec!["Ahoj".to_string()],
			UnitState::Translated,
			alice,
			stale,
			false,
		)
		.await
		.unwrap();

		// Bob still holds the pre-edit hashes
		let err = svc
			.translate(
				unit.id,
				vec!["Nazdar".to_string()],
				UnitState::Translated,
				bob,
				stale,
				false,
			)
			.await
			.unwrap_err();
		assert!(matches!(err, UnitError::ConcurrentEdit { .. }));

		// Alice editing again with her stale hashes is allowed
		svc.translate(
			unit.id,
			vec!["Dobrý den".to_string()],
			UnitState::Translated,
			alice,
			stale,
			false,
		)
		.await
		.unwrap();
	}

	#[tokio::test]
	async fn test_state_must_match_target_emptiness() {
		let pool = create_core_test_pool().await;
		let svc = service(&pool).await;
		let translation_id = seed_translation(&pool).await;
		let translation = translation_record(&pool, translation_id).await;
		let unit = seed_unit(&svc, &translation).await;
		let actor = Uuid::new_v4();

		let err = svc
			.translate(
				unit.id,
				vec![String::new()],
				UnitState::Translated,
				actor,
				EditPrecondition::from(&unit),
				false,
			)
			.await
			.unwrap_err();
		assert!(matches!(err, UnitError::InvalidState(_)));

		let err = svc
			.translate(
				unit.id,
				vec!["Ahoj".to_string()],
				UnitState::Empty,
				actor,
				EditPrecondition::from(&unit),
				false,
			)
			.await
			.unwrap_err();
		assert!(matches!(err, UnitError::InvalidState(_)));
	}

	#[tokio::test]
	async fn test_plural_count_validated() {
		let pool = create_core_test_pool().await;
		let svc = service(&pool).await;
		let (_, _, translation_id) = seed_translation_for_language(&pool, "cs", 3).await;
		let translation = translation_record(&pool, translation_id).await;

		let source = vec!["%d file".to_string(), "%d files".to_string()];
		let id_hash = crate::hash::calculate_id_hash("", &source);
		let unit = svc
			.find_or_create(&translation, id_hash, "", &source, "", 0)
			.await
			.unwrap()
			.unit()
			.clone();

		// Czech needs 3 plural forms
		let err = svc
			.translate(
				unit.id,
				vec!["%d soubor".to_string(), "%d soubory".to_string()],
				UnitState::Translated,
				Uuid::new_v4(),
				EditPrecondition::from(&unit),
				false,
			)
			.await
			.unwrap_err();
		match err {
			UnitError::PluralMismatch { expected, got } => {
				assert_eq!(expected, 3);
				assert_eq!(got, 2);
			}
			other => panic!("expected plural mismatch, got {other:?}"),
		}

		svc.translate(
			unit.id,
			vec![
				"%d soubor".to_string(),
				"%d soubory".to_string(),
				"%d souborů".to_string(),
			],
			UnitState::Translated,
			Uuid::new_v4(),
			EditPrecondition::from(&unit),
			false,
		)
		.await
		.unwrap();
	}

	#[tokio::test]
	async fn test_approve_requires_review_permission() {
		let pool = create_core_test_pool().await;
		let svc = service(&pool).await;
		let translation_id = seed_translation(&pool).await;
		let translation = translation_record(&pool, translation_id).await;
		let unit = seed_unit(&svc, &translation).await;
		let actor = Uuid::new_v4();

		let err = svc
			.translate(
				unit.id,
				vec!["Ahoj".to_string()],
				UnitState::Approved,
				actor,
				EditPrecondition::from(&unit),
				false,
			)
			.await
			.unwrap_err();
		assert!(matches!(err, UnitError::ReviewPermissionRequired));

		let approved = svc
			.translate(
				unit.id,
				vec!["Ahoj".to_string()],
				UnitState::Approved,
				actor,
				EditPrecondition::from(&unit),
				true,
			)
			.await
			.unwrap();
		assert_eq!(approved.state, "approved");
	}

	#[tokio::test]
	async fn test_read_only_rejects_translate() {
		let pool = create_core_test_pool().await;
		let svc = service(&pool).await;
		let translation_id = seed_translation(&pool).await;
		let translation = translation_record(&pool, translation_id).await;

		let mut unit = seed_unit(&svc, &translation).await;
		unit.state = UnitState::ReadOnly.as_str().to_string();
		svc.units().update(&unit).await.unwrap();

		let err = svc
			.translate(
				unit.id,
				vec!["Ahoj".to_string()],
				UnitState::Translated,
				Uuid::new_v4(),
				EditPrecondition::from(&unit),
				false,
			)
			.await
			.unwrap_err();
		assert!(matches!(err, UnitError::ReadOnly));
	}

	#[tokio::test]
	async fn test_merge_requires_identical_source() {
		let pool = create_core_test_pool().await;
		let svc = service(&pool).await;
		let translation_id = seed_translation(&pool).await;
		let translation = translation_record(&pool, translation_id).await;
		let actor = Uuid::new_v4();

		let unit = seed_unit(&svc, &translation).await;

		let other_source = vec!["Hello".to_string()];
		let other = svc
			.find_or_create(
				&translation,
				crate::hash::calculate_id_hash("menu", &other_source),
				"menu",
				&other_source,
				"",
				1,
			)
			.await
			.unwrap()
			.unit()
			.clone();
		let other = svc
			.translate(
				other.id,
				vec!["Ahoj".to_string()],
				UnitState::Translated,
				actor,
				EditPrecondition::from(&other),
				false,
			)
			.await
			.unwrap();

		let merged = svc.merge(unit.id, other.id, actor, false).await.unwrap();
		assert_eq!(merged.target, vec!["Ahoj"]);
		assert_eq!(merged.state, "translated");

		// Different source text refuses to merge
		let different_source = vec!["Goodbye".to_string()];
		let different = svc
			.find_or_create(
				&translation,
				crate::hash::calculate_id_hash("", &different_source),
				"",
				&different_source,
				"",
				2,
			)
			.await
			.unwrap()
			.unit()
			.clone();
		let err = svc.merge(different.id, other.id, actor, false).await.unwrap_err();
		assert!(matches!(err, UnitError::SourceMismatch));
	}

	#[tokio::test]
	async fn test_bulk_edit_reports_applied_and_failed() {
		let pool = create_core_test_pool().await;
		let svc = service(&pool).await;
		let translation_id = seed_translation(&pool).await;
		let translation = translation_record(&pool, translation_id).await;
		let actor = Uuid::new_v4();

		// Two translated units plus one read-only one, all matching the query
		for (i, text) in ["One", "Two", "Three"].iter().enumerate() {
			let source = vec![text.to_string()];
			let unit = svc
				.find_or_create(
					&translation,
					crate::hash::calculate_id_hash("", &source),
					"",
					&source,
					"",
					i as i64,
				)
				.await
				.unwrap()
				.unit()
				.clone();
			let unit = svc
				.translate(
					unit.id,
					vec![format!("cz-{text}")],
					UnitState::Translated,
					actor,
					EditPrecondition::from(&unit),
					false,
				)
				.await
				.unwrap();
			if i == 2 {
				let mut frozen = unit;
				frozen.state = UnitState::ReadOnly.as_str().to_string();
				svc.units().update(&frozen).await.unwrap();
			}
		}

		let outcome = svc
			.bulk_edit(
				translation_id,
				"target:cz-",
				Some(UnitState::NeedsEditing),
				&["review-me"],
				&[],
				actor,
				false,
			)
			.await
			.unwrap();
		assert_eq!(outcome, BulkEditOutcome { applied: 2, failed: 1 });

		let marked = svc.search(translation_id, "state:needs_editing flag:review-me").await.unwrap();
		assert_eq!(marked.len(), 2);
	}

	#[tokio::test]
	async fn test_delete_records_removal() {
		let pool = create_core_test_pool().await;
		let svc = service(&pool).await;
		let translation_id = seed_translation(&pool).await;
		let translation = translation_record(&pool, translation_id).await;

		let unit = seed_unit(&svc, &translation).await;
		svc.delete(unit.id, Uuid::new_v4()).await.unwrap();

		assert!(svc.units().get_by_id(unit.id).await.unwrap().is_none());
		let removals = ChangeRepository::new(pool.clone())
			.list(&weft_db::ChangeFilter {
				translation_id: Some(translation_id),
				actions: Some(vec![ChangeAction::RemovedUnit]),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(removals.len(), 1);
	}
}

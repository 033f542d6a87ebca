// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use weft_db::{
	ChangeAction, ChangeRepository, ComponentRecord, ComponentRepository, DbError, NewChange,
	TranslationRecord, UnitRecord, UnitRepository,
};
use weft_formats::{FormatRegistry, StringRecord};
use weft_locks::{LockManager, LockScope, OperationId};
use weft_units::{calculate_content_hash, calculate_id_hash, calculate_target_hash, UnitState};
use weft_vcs::{CommitSignature, GitRepository, MergeStyle, VcsError};

use crate::error::{Result, SyncError};
use crate::filemask::Filemask;
use crate::lang::plural_count_for;
use crate::types::{CommitOutcome, ConflictPolicy, SyncReport, UploadOutcome};

/// Flag marking units whose string disappeared upstream, for components
/// configured to keep rather than delete them.
const OBSOLETE_FLAG: &str = "obsolete";

pub struct SyncEngine {
	components: ComponentRepository,
	units: UnitRepository,
	changes: ChangeRepository,
	formats: Arc<FormatRegistry>,
	locks: Arc<LockManager>,
	/// Root directory holding one working copy per component.
	workdir: PathBuf,
}

impl SyncEngine {
	pub fn new(
		components: ComponentRepository,
		units: UnitRepository,
		changes: ChangeRepository,
		formats: Arc<FormatRegistry>,
		locks: Arc<LockManager>,
		workdir: PathBuf,
	) -> Self {
		Self { components, units, changes, formats, locks, workdir }
	}

	pub fn workdir(&self) -> &std::path::Path {
		&self.workdir
	}

	async fn load_component(&self, component_id: Uuid) -> Result<ComponentRecord> {
		self.components
			.get_component_by_id(component_id)
			.await?
			.ok_or(SyncError::ComponentNotFound(component_id))
	}

	async fn open_repo(&self, component: &ComponentRecord) -> Result<GitRepository> {
		let path = self.workdir.join(component.id.to_string());
		if path.join(".git").exists() {
			Ok(GitRepository::open(path, &component.branch).await?)
		} else {
			Ok(GitRepository::clone_from(&component.repo_url, path, &component.branch).await?)
		}
	}

	fn change(&self, component: &ComponentRecord, action: ChangeAction) -> NewChange {
		NewChange::new(action)
			.project(component.project_id)
			.component(component.id)
	}

	/// Pulls remote changes and reconciles every translation file with the
	/// unit tables.
	///
	/// Idempotent: a second call with no intervening VCS change skips every
	/// translation on its stored revision and writes nothing. Merge
	/// conflicts and parse errors are recorded as changes; a parse error
	/// skips that one file, a merge conflict fails the whole pass.
	#[instrument(skip(self), fields(component_id = %component_id))]
	pub async fn pull_and_parse(
		&self,
		component_id: Uuid,
		operation: OperationId,
	) -> Result<SyncReport> {
		let component = self.load_component(component_id).await?;
		if component.locked {
			return Err(SyncError::ComponentLocked(component.slug.clone()));
		}

		let _repo_lock = self
			.locks
			.acquire(LockScope::Repo, &component.slug, operation)
			.await?;
		let _update_lock = self
			.locks
			.acquire(LockScope::ComponentUpdate, &component.slug, operation)
			.await?;

		let repo = self.open_repo(&component).await?;
		let style: MergeStyle = component
			.merge_style
			.parse()
			.map_err(SyncError::Config)?;

		if let Err(err) = repo.update(style).await {
			if let VcsError::Conflict { ref paths } = err {
				let action = match style {
					MergeStyle::Merge => ChangeAction::FailedMerge,
					MergeStyle::Rebase => ChangeAction::FailedRebase,
				};
				self.changes
					.append(&self.change(&component, action).details(
						serde_json::json!({ "paths": paths }),
					))
					.await?;
				warn!(component = %component.slug, paths = ?paths, "merge conflict during update");
			}
			return Err(err.into());
		}

		let revision = repo.last_revision().await?;
		let mask = Filemask::parse(&component.filemask)?;
		let files = mask.discover(repo.path())?;
		if files.is_empty() {
			warn!(component = %component.slug, filemask = %component.filemask, "filemask matches no files");
		}

		let mut report = SyncReport { revision: revision.clone(), ..Default::default() };

		for (language, relative) in files {
			let translation = match self
				.components
				.get_translation_by_language(component.id, &language)
				.await?
			{
				Some(t) => t,
				None => {
					let translation =
						self.create_translation(&component, &language, &relative).await?;
					report.new_translations += 1;
					translation
				}
			};

			if translation.revision.as_deref() == Some(revision.as_str()) {
				report.skipped_translations += 1;
				continue;
			}

			let bytes = tokio::fs::read(repo.path().join(&relative)).await?;
			let format = self.formats.get(&component.format)?;
			let records = match format.parse(&bytes) {
				Ok(records) => records,
				Err(weft_formats::FormatError::Parse { line, message }) => {
					self.changes
						.append(
							&self
								.change(&component, ChangeAction::ParseError)
								.translation(translation.id)
								.details(serde_json::json!({
									"filename": relative,
									"line": line,
									"message": message,
								})),
						)
						.await?;
					warn!(file = %relative, line, %message, "parse error, skipping file");
					report.parse_errors += 1;
					continue;
				}
				Err(e) => return Err(e.into()),
			};

			self.reconcile_translation(&component, &translation, &records, &revision, &mut report)
				.await?;
		}

		info!(
			component = %component.slug,
			revision = %report.revision,
			created = report.units_created,
			updated = report.units_updated,
			source_changed = report.units_source_changed,
			"pull_and_parse finished"
		);
		Ok(report)
	}

	async fn create_translation(
		&self,
		component: &ComponentRecord,
		language: &str,
		filename: &str,
	) -> Result<TranslationRecord> {
		let now = Utc::now();
		let translation = TranslationRecord {
			id: Uuid::new_v4(),
			component_id: component.id,
			language: language.to_string(),
			plural_count: plural_count_for(language),
			filename: filename.to_string(),
			revision: None,
			created_at: now,
			updated_at: now,
		};
		self.components.create_translation(&translation).await?;
		self.changes
			.append(
				&self
					.change(component, ChangeAction::NewTranslationFile)
					.translation(translation.id)
					.details(serde_json::json!({ "language": language, "filename": filename })),
			)
			.await?;
		debug!(language = %language, filename = %filename, "discovered new translation file");
		Ok(translation)
	}

	/// Diffs parsed records against the stored units by `id_hash` inside a
	/// single transaction; the revision marker is written last, so either
	/// the full reconcile lands or none of it does.
	async fn reconcile_translation(
		&self,
		component: &ComponentRecord,
		translation: &TranslationRecord,
		records: &[StringRecord],
		revision: &str,
		report: &mut SyncReport,
	) -> Result<()> {
		let existing = self.units.list_by_translation(translation.id).await?;
		let mut by_hash: HashMap<i64, UnitRecord> =
			existing.into_iter().map(|u| (u.id_hash, u)).collect();

		let mut tx = self.units.pool().begin().await.map_err(DbError::from)?;

		for (position, record) in records.iter().enumerate() {
			let position = position as i64;
			let id_hash = calculate_id_hash(&record.context, &record.source);
			let content_hash =
				calculate_content_hash(&record.context, &record.source, &record.flags);

			match by_hash.remove(&id_hash) {
				None => {
					let unit = new_unit_from_record(translation.id, id_hash, record, position);
					self.units.create_with_executor(&mut *tx, &unit).await?;
					self.changes
						.append_with_executor(
							&mut *tx,
							&self
								.change(component, ChangeAction::NewUnit)
								.translation(translation.id)
								.unit(unit.id),
						)
						.await?;
					report.units_created += 1;
				}
				Some(mut unit) => {
					let mut mutated = false;

					if unit.content_hash != content_hash {
						let state: UnitState =
							unit.state.parse().map_err(SyncError::Config)?;
						unit.context = record.context.clone();
						unit.source = record.source.clone();
						unit.extra_flags = record.flags.clone();
						unit.content_hash = content_hash;
						if state.is_translated() {
							unit.state = UnitState::NeedsEditing.as_str().to_string();
						}
						self.changes
							.append_with_executor(
								&mut *tx,
								&self
									.change(component, ChangeAction::SourceChange)
									.translation(translation.id)
									.unit(unit.id),
							)
							.await?;
						report.units_source_changed += 1;
						mutated = true;
					}

					// A target edited directly in the repository wins over
					// the stored value unless local edits are pending.
					if !unit.pending && unit.target != record.target {
						unit.target = record.target.clone();
						unit.target_hash = calculate_target_hash(&unit.target);
						if unit.state != UnitState::ReadOnly.as_str() {
							unit.state = state_for_record(record).as_str().to_string();
						}
						report.units_updated += 1;
						mutated = true;
					}

					if unit.position != position {
						unit.position = position;
						mutated = true;
					}

					if mutated {
						unit.updated_at = Utc::now();
						self.units.update_with_executor(&mut *tx, &unit).await?;
					} else {
						report.units_unchanged += 1;
					}
				}
			}
		}

		// Strings that vanished upstream
		for unit in by_hash.into_values() {
			if component.remove_missing {
				self.units.delete_with_executor(&mut *tx, unit.id).await?;
				self.changes
					.append_with_executor(
						&mut *tx,
						&self
							.change(component, ChangeAction::RemovedUnit)
							.translation(translation.id)
							.details(serde_json::json!({
								"context": unit.context,
								"source": unit.source,
							})),
					)
					.await?;
				report.units_removed += 1;
			} else if !has_flag(&unit.extra_flags, OBSOLETE_FLAG) {
				let mut unit = unit;
				unit.extra_flags = append_flag(&unit.extra_flags, OBSOLETE_FLAG);
				unit.updated_at = Utc::now();
				self.units.update_with_executor(&mut *tx, &unit).await?;
				report.units_obsoleted += 1;
			} else {
				report.units_unchanged += 1;
			}
		}

		self.components
			.set_revision_with_executor(&mut *tx, translation.id, Some(revision))
			.await?;
		tx.commit().await.map_err(DbError::from)?;
		Ok(())
	}

	/// Serializes pending translator edits back into their files and
	/// commits them as one revision. No-op when nothing is pending.
	#[instrument(skip(self, message, author), fields(component_id = %component_id))]
	pub async fn commit_pending(
		&self,
		component_id: Uuid,
		message: &str,
		author: &CommitSignature,
		actor: Option<Uuid>,
		operation: OperationId,
	) -> Result<CommitOutcome> {
		let component = self.load_component(component_id).await?;
		let _repo_lock = self
			.locks
			.acquire(LockScope::Repo, &component.slug, operation)
			.await?;

		let repo = self.open_repo(&component).await?;
		let format = self.formats.get(&component.format)?;
		let translations = self
			.components
			.list_translations_by_component(component.id)
			.await?;

		let mut touched: Vec<TranslationRecord> = Vec::new();
		for translation in translations {
			let pending = self.units.list_pending(translation.id).await?;
			if pending.is_empty() {
				continue;
			}

			let path = repo.path().join(&translation.filename);
			let existing = tokio::fs::read(&path).await.unwrap_or_default();
			let records: Vec<StringRecord> = pending.iter().map(unit_to_record).collect();
			let bytes = format.serialize(&existing, &records)?;
			tokio::fs::write(&path, bytes).await?;
			touched.push(translation);
		}

		if touched.is_empty() {
			debug!(component = %component.slug, "nothing pending to commit");
			return Ok(CommitOutcome::NothingPending);
		}

		let files: Vec<String> = touched.iter().map(|t| t.filename.clone()).collect();
		let file_refs: Vec<&str> = files.iter().map(String::as_str).collect();
		let revision = repo.commit(message, author, &file_refs).await?;

		for translation in &touched {
			self.units.clear_pending(translation.id).await?;
			self.components
				.set_revision(translation.id, Some(&revision))
				.await?;
		}

		let mut change = self
			.change(&component, ChangeAction::Commit)
			.details(serde_json::json!({ "files": files, "revision": revision }));
		if let Some(actor) = actor {
			change = change.user(actor);
		}
		self.changes.append(&change).await?;

		info!(component = %component.slug, revision = %revision, files = files.len(), "committed pending edits");
		Ok(CommitOutcome::Committed { revision, files })
	}

	/// Pushes local commits to the remote. Failures are recorded so the
	/// component shows why it is out of sync.
	#[instrument(skip(self), fields(component_id = %component_id))]
	pub async fn push(
		&self,
		component_id: Uuid,
		actor: Option<Uuid>,
		operation: OperationId,
	) -> Result<()> {
		let component = self.load_component(component_id).await?;
		let _repo_lock = self
			.locks
			.acquire(LockScope::Repo, &component.slug, operation)
			.await?;
		let repo = self.open_repo(&component).await?;

		if let Err(err) = repo.push().await {
			self.changes
				.append(
					&self
						.change(&component, ChangeAction::FailedPush)
						.details(serde_json::json!({ "error": err.to_string() })),
				)
				.await?;
			return Err(err.into());
		}

		let mut change = self.change(&component, ChangeAction::Push);
		if let Some(actor) = actor {
			change = change.user(actor);
		}
		self.changes.append(&change).await?;
		Ok(())
	}

	/// Discards local commits and working-tree changes, resetting to the
	/// remote head. Pending markers are cleared and revisions dropped so
	/// the next pull re-parses everything.
	#[instrument(skip(self), fields(component_id = %component_id))]
	pub async fn reset(
		&self,
		component_id: Uuid,
		actor: Option<Uuid>,
		operation: OperationId,
	) -> Result<String> {
		let component = self.load_component(component_id).await?;
		let _repo_lock = self
			.locks
			.acquire(LockScope::Repo, &component.slug, operation)
			.await?;
		let repo = self.open_repo(&component).await?;

		let revision = repo.reset().await?;
		for translation in self
			.components
			.list_translations_by_component(component.id)
			.await?
		{
			self.units.clear_pending(translation.id).await?;
			self.components.set_revision(translation.id, None).await?;
		}

		let mut change = self
			.change(&component, ChangeAction::Reset)
			.details(serde_json::json!({ "revision": revision }));
		if let Some(actor) = actor {
			change = change.user(actor);
		}
		self.changes.append(&change).await?;
		Ok(revision)
	}

	/// Imports an uploaded translation file into one translation.
	///
	/// Each unit either lands completely (target, state, change record) or
	/// stays untouched; the policy decides which existing units may be
	/// overwritten.
	#[instrument(skip(self, bytes), fields(translation_id = %translation_id, policy = ?policy))]
	pub async fn handle_upload(
		&self,
		translation_id: Uuid,
		bytes: &[u8],
		policy: ConflictPolicy,
		actor: Uuid,
		operation: OperationId,
	) -> Result<UploadOutcome> {
		let translation = self
			.components
			.get_translation_by_id(translation_id)
			.await?
			.ok_or(SyncError::TranslationNotFound(translation_id))?;
		let component = self.load_component(translation.component_id).await?;
		if component.locked {
			return Err(SyncError::ComponentLocked(component.slug.clone()));
		}

		let _update_lock = self
			.locks
			.acquire(LockScope::ComponentUpdate, &component.slug, operation)
			.await?;

		let format = self.formats.get(&component.format)?;
		let records = match format.parse(bytes) {
			Ok(records) => records,
			Err(weft_formats::FormatError::Parse { line, message }) => {
				self.changes
					.append(
						&self
							.change(&component, ChangeAction::ParseError)
							.translation(translation.id)
							.details(serde_json::json!({
								"source": "upload",
								"line": line,
								"message": message,
							})),
					)
					.await?;
				return Err(weft_formats::FormatError::Parse { line, message }.into());
			}
			Err(e) => return Err(e.into()),
		};

		let mut outcome = UploadOutcome::default();
		for record in &records {
			outcome.total += 1;

			if record.is_untranslated() {
				outcome.skipped += 1;
				continue;
			}

			let id_hash = calculate_id_hash(&record.context, &record.source);
			let Some(mut unit) = self.units.get_by_id_hash(translation.id, id_hash).await? else {
				outcome.not_found += 1;
				continue;
			};

			let state: UnitState = unit.state.parse().map_err(SyncError::Config)?;
			let overwritable = match policy {
				ConflictPolicy::OnlyUntranslated => !state.is_translated(),
				ConflictPolicy::ReplaceTranslated => state != UnitState::Approved,
				ConflictPolicy::ReplaceApproved => true,
			};
			let plural_ok = record.target.len()
				== if unit.source.len() > 1 {
					translation.plural_count as usize
				} else {
					1
				};

			if state == UnitState::ReadOnly
				|| !overwritable
				|| !plural_ok
				|| unit.target == record.target
			{
				outcome.skipped += 1;
				continue;
			}

			unit.target = record.target.clone();
			unit.target_hash = calculate_target_hash(&unit.target);
			unit.state = state_for_record(record).as_str().to_string();
			unit.last_edited_by = Some(actor);
			unit.pending = true;
			unit.updated_at = Utc::now();

			let change = self
				.change(&component, ChangeAction::Translated)
				.translation(translation.id)
				.unit(unit.id)
				.user(actor)
				.details(serde_json::json!({ "via": "upload" }));

			let mut tx = self.units.pool().begin().await.map_err(DbError::from)?;
			self.units.update_with_executor(&mut *tx, &unit).await?;
			self.changes.append_with_executor(&mut *tx, &change).await?;
			tx.commit().await.map_err(DbError::from)?;
			outcome.accepted += 1;
		}

		self.changes
			.append(
				&self
					.change(&component, ChangeAction::Upload)
					.translation(translation.id)
					.user(actor)
					.details(serde_json::json!({
						"not_found": outcome.not_found,
						"skipped": outcome.skipped,
						"accepted": outcome.accepted,
						"total": outcome.total,
					})),
			)
			.await?;

		info!(
			accepted = outcome.accepted,
			skipped = outcome.skipped,
			not_found = outcome.not_found,
			"upload handled"
		);
		Ok(outcome)
	}
}

/// Initial state for a unit as it appears in a file.
fn state_for_record(record: &StringRecord) -> UnitState {
	if record.has_flag("read-only") {
		UnitState::ReadOnly
	} else if record.is_untranslated() {
		UnitState::Empty
	} else if record.has_flag("fuzzy") {
		UnitState::NeedsEditing
	} else {
		UnitState::Translated
	}
}

fn new_unit_from_record(
	translation_id: Uuid,
	id_hash: i64,
	record: &StringRecord,
	position: i64,
) -> UnitRecord {
	let now = Utc::now();
	UnitRecord {
		id: Uuid::new_v4(),
		translation_id,
		id_hash,
		context: record.context.clone(),
		source: record.source.clone(),
		target: record.target.clone(),
		state: state_for_record(record).as_str().to_string(),
		position,
		content_hash: calculate_content_hash(&record.context, &record.source, &record.flags),
		target_hash: calculate_target_hash(&record.target),
		explanation: String::new(),
		extra_flags: record.flags.clone(),
		labels: Vec::new(),
		last_edited_by: None,
		pending: false,
		created_at: now,
		updated_at: now,
	}
}

fn unit_to_record(unit: &UnitRecord) -> StringRecord {
	StringRecord {
		context: unit.context.clone(),
		source: unit.source.clone(),
		target: unit.target.clone(),
		flags: unit.extra_flags.clone(),
		is_plural: unit.source.len() > 1,
	}
}

fn has_flag(flags: &str, flag: &str) -> bool {
	flags.split(',').any(|f| f.trim() == flag)
}

fn append_flag(flags: &str, flag: &str) -> String {
	if flags.trim().is_empty() {
		flag.to_string()
	} else {
		format!("{flags}, {flag}")
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::{BTreeSet, HashMap};
use std::io::{Cursor, Read, Write};
use std::path::Path;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use zip::{write::SimpleFileOptions, ZipArchive, ZipWriter};

use weft_db::{
	ComponentRecord, ComponentRepository, ProjectRecord, TranslationRecord, UnitRecord,
	UnitRepository,
};
use weft_formats::FormatRegistry;

use crate::doc::{
	ComponentDoc, ManifestDoc, ProjectDoc, TranslationDoc, UnitDoc, BACKUP_VERSION, MANIFEST_NAME,
};
use crate::error::{BackupError, Result};
use crate::schema;

/// Counters from one restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RestoreSummary {
	pub project_id: Uuid,
	pub components: u64,
	pub translations: u64,
	pub units: u64,
	pub vcs_files: u64,
}

impl RestoreSummary {
	fn new(project_id: Uuid) -> Self {
		Self {
			project_id,
			..Default::default()
		}
	}
}

/// Exports a project to a zip archive and restores archives into fresh
/// rows. Restore is validate-everything-then-write: schema or format
/// problems abort before the first insert.
pub struct BackupService {
	components: ComponentRepository,
	units: UnitRepository,
	formats: FormatRegistry,
}

impl BackupService {
	pub fn new(components: ComponentRepository, units: UnitRepository) -> Self {
		Self {
			components,
			units,
			formats: FormatRegistry::builtin(),
		}
	}

	/// Builds the archive for one project. When `vcs_root` is given, the
	/// per-component working copies under it are captured as `vcs/<slug>/`
	/// entries (the `.git` directory excluded).
	#[instrument(skip(self, vcs_root), fields(project_id = %project_id))]
	pub async fn export_project(
		&self,
		project_id: Uuid,
		vcs_root: Option<&Path>,
	) -> Result<Vec<u8>> {
		let project = self
			.components
			.get_project_by_id(project_id)
			.await?
			.ok_or_else(|| BackupError::MissingEntry(format!("project {project_id}")))?;

		let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
		let options = SimpleFileOptions::default();

		let components = self.components.list_components_by_project(project_id).await?;
		let mut labels: BTreeSet<String> = BTreeSet::new();
		let mut component_docs: Vec<(String, ComponentDoc)> = Vec::new();

		for component in &components {
			let mut translation_docs = Vec::new();
			for translation in self
				.components
				.list_translations_by_component(component.id)
				.await?
			{
				let mut unit_docs = Vec::new();
				for unit in self.units.list_by_translation(translation.id).await? {
					labels.extend(unit.labels.iter().cloned());
					unit_docs.push(unit_to_doc(&unit));
				}
				translation_docs.push(TranslationDoc {
					id: translation.id.to_string(),
					language: translation.language,
					plural_count: translation.plural_count,
					filename: translation.filename,
					revision: translation.revision,
					units: unit_docs,
				});
			}

			component_docs.push((
				component.slug.clone(),
				ComponentDoc {
					id: component.id.to_string(),
					slug: component.slug.clone(),
					name: component.name.clone(),
					repo_url: component.repo_url.clone(),
					branch: component.branch.clone(),
					push_url: component.push_url.clone(),
					filemask: component.filemask.clone(),
					format: component.format.clone(),
					merge_style: component.merge_style.clone(),
					locked: component.locked,
					remove_missing: component.remove_missing,
					translations: translation_docs,
				},
			));
		}

		let manifest = ManifestDoc {
			version: BACKUP_VERSION,
			project: ProjectDoc {
				id: project.id.to_string(),
				slug: project.slug,
				name: project.name,
			},
			labels: labels.into_iter().collect(),
		};

		writer.start_file(MANIFEST_NAME, options)?;
		writer.write_all(&serde_json::to_vec_pretty(&manifest)?)?;

		for (slug, doc) in &component_docs {
			writer.start_file(format!("components/{slug}.json"), options)?;
			writer.write_all(&serde_json::to_vec_pretty(doc)?)?;
		}

		if let Some(root) = vcs_root {
			for component in &components {
				let workdir = root.join(component.id.to_string());
				if workdir.is_dir() {
					write_tree(&mut writer, &workdir, &format!("vcs/{}", component.slug), options)?;
				}
			}
		}

		let cursor = writer.finish()?;
		info!(bytes = cursor.get_ref().len(), "project exported");
		Ok(cursor.into_inner())
	}

	/// Restores an archive as a new project. Every document is validated
	/// and every format identifier checked before any row is written;
	/// original ids are remapped to fresh ones via an in-memory table.
	#[instrument(skip(self, bytes, vcs_root), fields(bytes = bytes.len()))]
	pub async fn restore_project(
		&self,
		bytes: &[u8],
		vcs_root: Option<&Path>,
	) -> Result<RestoreSummary> {
		let mut archive = ZipArchive::new(Cursor::new(bytes))?;

		let manifest_value = read_json(&mut archive, MANIFEST_NAME)?;
		schema::validate_manifest(&manifest_value)?;
		let manifest: ManifestDoc = serde_json::from_value(manifest_value)?;
		if manifest.version != BACKUP_VERSION {
			return Err(BackupError::UnsupportedVersion(manifest.version));
		}

		// Validate every component document up front, before any write.
		let entry_names: Vec<String> = archive.file_names().map(String::from).collect();
		let mut component_entries: Vec<String> = entry_names
			.iter()
			.filter(|name| name.starts_with("components/") && name.ends_with(".json"))
			.cloned()
			.collect();
		component_entries.sort();

		let mut component_docs = Vec::new();
		for entry in &component_entries {
			let value = read_json(&mut archive, entry)?;
			schema::validate_component(&value, entry)?;
			let doc: ComponentDoc = serde_json::from_value(value)?;
			if !self.formats.contains(&doc.format) {
				return Err(BackupError::UnsupportedFormat(doc.format));
			}
			component_docs.push(doc);
		}

		if self
			.components
			.get_project_by_slug(&manifest.project.slug)
			.await?
			.is_some()
		{
			return Err(BackupError::AlreadyExists(manifest.project.slug));
		}

		// Validation done; start writing with fresh ids.
		let mut id_map: HashMap<String, Uuid> = HashMap::new();
		let now = Utc::now();

		let project_id = Uuid::new_v4();
		id_map.insert(manifest.project.id.clone(), project_id);
		self.components
			.create_project(&ProjectRecord {
				id: project_id,
				slug: manifest.project.slug.clone(),
				name: manifest.project.name.clone(),
				created_at: now,
				updated_at: now,
			})
			.await?;

		let mut summary = RestoreSummary::new(project_id);
		let mut slug_to_id: HashMap<String, Uuid> = HashMap::new();

		for doc in &component_docs {
			let component_id = Uuid::new_v4();
			id_map.insert(doc.id.clone(), component_id);
			slug_to_id.insert(doc.slug.clone(), component_id);

			self.components
				.create_component(&ComponentRecord {
					id: component_id,
					project_id,
					slug: doc.slug.clone(),
					name: doc.name.clone(),
					repo_url: doc.repo_url.clone(),
					branch: doc.branch.clone(),
					push_url: doc.push_url.clone(),
					filemask: doc.filemask.clone(),
					format: doc.format.clone(),
					merge_style: doc.merge_style.clone(),
					locked: doc.locked,
					remove_missing: doc.remove_missing,
					background_task_id: None,
					created_at: now,
					updated_at: now,
				})
				.await?;
			summary.components += 1;

			for translation_doc in &doc.translations {
				let translation_id = Uuid::new_v4();
				id_map.insert(translation_doc.id.clone(), translation_id);

				self.components
					.create_translation(&TranslationRecord {
						id: translation_id,
						component_id,
						language: translation_doc.language.clone(),
						plural_count: translation_doc.plural_count,
						filename: translation_doc.filename.clone(),
						revision: translation_doc.revision.clone(),
						created_at: now,
						updated_at: now,
					})
					.await?;
				summary.translations += 1;

				for unit_doc in &translation_doc.units {
					let unit_id = Uuid::new_v4();
					id_map.insert(unit_doc.id.clone(), unit_id);

					// Editor accounts are not part of the archive.
					self.units
						.create(&UnitRecord {
							id: unit_id,
							translation_id,
							id_hash: unit_doc.id_hash,
							context: unit_doc.context.clone(),
							source: unit_doc.source.clone(),
							target: unit_doc.target.clone(),
							state: unit_doc.state.clone(),
							position: unit_doc.position,
							content_hash: unit_doc.content_hash,
							target_hash: unit_doc.target_hash,
							explanation: unit_doc.explanation.clone(),
							extra_flags: unit_doc.extra_flags.clone(),
							labels: unit_doc.labels.clone(),
							last_edited_by: None,
							pending: unit_doc.pending,
							created_at: now,
							updated_at: now,
						})
						.await?;
					summary.units += 1;
				}
			}
		}

		if let Some(root) = vcs_root {
			summary.vcs_files =
				extract_vcs_entries(&mut archive, &entry_names, &slug_to_id, root)?;
		}

		info!(
			project_id = %project_id,
			components = summary.components,
			translations = summary.translations,
			units = summary.units,
			"project restored"
		);
		Ok(summary)
	}
}

fn unit_to_doc(unit: &UnitRecord) -> UnitDoc {
	UnitDoc {
		id: unit.id.to_string(),
		id_hash: unit.id_hash,
		context: unit.context.clone(),
		source: unit.source.clone(),
		target: unit.target.clone(),
		state: unit.state.clone(),
		position: unit.position,
		content_hash: unit.content_hash,
		target_hash: unit.target_hash,
		explanation: unit.explanation.clone(),
		extra_flags: unit.extra_flags.clone(),
		labels: unit.labels.clone(),
		pending: unit.pending,
	}
}

fn read_json(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<serde_json::Value> {
	let mut entry = archive
		.by_name(name)
		.map_err(|_| BackupError::MissingEntry(name.to_string()))?;
	let mut raw = String::new();
	entry.read_to_string(&mut raw)?;
	Ok(serde_json::from_str(&raw)?)
}

fn write_tree(
	writer: &mut ZipWriter<Cursor<Vec<u8>>>,
	root: &Path,
	prefix: &str,
	options: SimpleFileOptions,
) -> Result<()> {
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
			writer.start_file(format!("{prefix}/{relative}"), options)?;
			writer.write_all(&std::fs::read(&path)?)?;
		}
	}
	Ok(())
}

/// Writes `vcs/<slug>/...` entries under `root/<new component id>/`,
/// mirroring the sync engine's working-copy layout.
fn extract_vcs_entries(
	archive: &mut ZipArchive<Cursor<&[u8]>>,
	entry_names: &[String],
	slug_to_id: &HashMap<String, Uuid>,
	root: &Path,
) -> Result<u64> {
	let mut written = 0u64;

	for name in entry_names {
		let Some(rest) = name.strip_prefix("vcs/") else {
			continue;
		};
		let Some((slug, relative)) = rest.split_once('/') else {
			continue;
		};
		if relative.is_empty() || relative.split('/').any(|part| part == "..") {
			warn!(entry = %name, "skipping suspicious archive path");
			continue;
		}
		let Some(component_id) = slug_to_id.get(slug) else {
			warn!(entry = %name, "skipping vcs entry for unknown component");
			continue;
		};

		let target = root.join(component_id.to_string()).join(relative);
		if let Some(parent) = target.parent() {
			std::fs::create_dir_all(parent)?;
		}

		let mut entry = archive.by_name(name)?;
		let mut contents = Vec::new();
		entry.read_to_end(&mut contents)?;
		std::fs::write(&target, contents)?;
		written += 1;
	}

	Ok(written)
}

#[cfg(test)]
mod tests {
	use super::*;
	use weft_db::testing;

	async fn make_service(pool: &sqlx::SqlitePool) -> BackupService {
		BackupService::new(
			ComponentRepository::new(pool.clone()),
			UnitRepository::new(pool.clone()),
		)
	}

	fn make_unit(translation_id: Uuid, id_hash: i64, context: &str, target: &str) -> UnitRecord {
		let now = Utc::now();
		UnitRecord {
			id: Uuid::new_v4(),
			translation_id,
			id_hash,
			context: context.to_string(),
			source: vec!["Hello".to_string()],
			target: vec![target.to_string()],
			state: if target.is_empty() { "empty" } else { "translated" }.to_string(),
			position: id_hash,
			content_hash: id_hash + 100,
			target_hash: id_hash + 200,
			explanation: String::new(),
			extra_flags: String::new(),
			labels: vec!["glossary".to_string()],
			last_edited_by: Some(Uuid::new_v4()),
			pending: false,
			created_at: now,
			updated_at: now,
		}
	}

	async fn seed_and_export(pool: &sqlx::SqlitePool) -> (Vec<u8>, Uuid) {
		let (project_id, _, translation_id) =
			testing::seed_translation_for_language(pool, "cs", 3).await;

		let units = UnitRepository::new(pool.clone());
		units.create(&make_unit(translation_id, 1, "greeting", "Ahoj")).await.unwrap();
		units.create(&make_unit(translation_id, 2, "farewell", "")).await.unwrap();

		let service = make_service(pool).await;
		let bytes = service.export_project(project_id, None).await.unwrap();
		(bytes, project_id)
	}

	#[tokio::test]
	async fn test_export_then_restore_roundtrip() {
		let source_pool = testing::create_core_test_pool().await;
		let (bytes, _) = seed_and_export(&source_pool).await;

		// Restore into a fresh database
		let target_pool = testing::create_core_test_pool().await;
		let service = make_service(&target_pool).await;
		let summary = service.restore_project(&bytes, None).await.unwrap();

		assert_eq!(summary.components, 1);
		assert_eq!(summary.translations, 1);
		assert_eq!(summary.units, 2);

		let components = ComponentRepository::new(target_pool.clone());
		let restored = components
			.list_components_by_project(summary.project_id)
			.await
			.unwrap();
		assert_eq!(restored.len(), 1);
		assert_eq!(restored[0].slug, "app");
		assert_eq!(restored[0].format, "po");

		let translations = components
			.list_translations_by_component(restored[0].id)
			.await
			.unwrap();
		assert_eq!(translations.len(), 1);
		assert_eq!(translations[0].language, "cs");

		let units = UnitRepository::new(target_pool)
			.list_by_translation(translations[0].id)
			.await
			.unwrap();
		assert_eq!(units.len(), 2);
		let greeting = units.iter().find(|u| u.context == "greeting").unwrap();
		assert_eq!(greeting.target, vec!["Ahoj".to_string()]);
		assert_eq!(greeting.labels, vec!["glossary".to_string()]);
		// Editors are not carried across restore
		assert_eq!(greeting.last_edited_by, None);
	}

	#[tokio::test]
	async fn test_restore_remaps_ids() {
		let source_pool = testing::create_core_test_pool().await;
		let (bytes, original_project_id) = seed_and_export(&source_pool).await;

		let target_pool = testing::create_core_test_pool().await;
		let service = make_service(&target_pool).await;
		let summary = service.restore_project(&bytes, None).await.unwrap();

		assert_ne!(summary.project_id, original_project_id);
	}

	#[tokio::test]
	async fn test_restore_rejects_existing_project_slug() {
		let pool = testing::create_core_test_pool().await;
		let (bytes, _) = seed_and_export(&pool).await;

		// Same database still holds the original slug
		let service = make_service(&pool).await;
		let result = service.restore_project(&bytes, None).await;
		assert!(matches!(result, Err(BackupError::AlreadyExists(_))));
	}

	#[tokio::test]
	async fn test_restore_rejects_unsupported_version() {
		let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
		writer.start_file(MANIFEST_NAME, SimpleFileOptions::default()).unwrap();
		writer
			.write_all(
				serde_json::json!({
					"version": 99,
					"project": { "id": "x", "slug": "horizon", "name": "Horizon" },
					"labels": []
				})
				.to_string()
				.as_bytes(),
			)
			.unwrap();
		let bytes = writer.finish().unwrap().into_inner();

		let pool = testing::create_core_test_pool().await;
		let service = make_service(&pool).await;
		let result = service.restore_project(&bytes, None).await;
		assert!(matches!(result, Err(BackupError::UnsupportedVersion(99))));
	}

	#[tokio::test]
	async fn test_restore_rejects_unsupported_format_before_writing() {
		let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
		let options = SimpleFileOptions::default();
		writer.start_file(MANIFEST_NAME, options).unwrap();
		writer
			.write_all(
				serde_json::json!({
					"version": 1,
					"project": { "id": "p", "slug": "horizon", "name": "Horizon" },
					"labels": []
				})
				.to_string()
				.as_bytes(),
			)
			.unwrap();
		writer.start_file("components/website.json", options).unwrap();
		writer
			.write_all(
				serde_json::json!({
					"id": "c", "slug": "website", "name": "Website",
					"repo_url": "", "branch": "main", "push_url": null,
					"filemask": "strings/*.xlf", "format": "xliff",
					"merge_style": "merge", "locked": false, "remove_missing": false,
					"translations": []
				})
				.to_string()
				.as_bytes(),
			)
			.unwrap();
		let bytes = writer.finish().unwrap().into_inner();

		let pool = testing::create_core_test_pool().await;
		let service = make_service(&pool).await;
		let result = service.restore_project(&bytes, None).await;
		assert!(matches!(result, Err(BackupError::UnsupportedFormat(f)) if f == "xliff"));

		// Nothing was written
		let components = ComponentRepository::new(pool);
		assert!(components.get_project_by_slug("horizon").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_restore_rejects_schema_invalid_component() {
		let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
		let options = SimpleFileOptions::default();
		writer.start_file(MANIFEST_NAME, options).unwrap();
		writer
			.write_all(
				serde_json::json!({
					"version": 1,
					"project": { "id": "p", "slug": "horizon", "name": "Horizon" },
					"labels": []
				})
				.to_string()
				.as_bytes(),
			)
			.unwrap();
		// Missing required fields
		writer.start_file("components/website.json", options).unwrap();
		writer
			.write_all(serde_json::json!({ "slug": "website" }).to_string().as_bytes())
			.unwrap();
		let bytes = writer.finish().unwrap().into_inner();

		let pool = testing::create_core_test_pool().await;
		let service = make_service(&pool).await;
		let result = service.restore_project(&bytes, None).await;
		assert!(matches!(result, Err(BackupError::Schema(_))));
	}

	#[tokio::test]
	async fn test_vcs_files_roundtrip() {
		let source_pool = testing::create_core_test_pool().await;
		let (project_id, component_id, translation_id) =
			testing::seed_translation_for_language(&source_pool, "cs", 3).await;
		UnitRepository::new(source_pool.clone())
			.create(&make_unit(translation_id, 1, "greeting", "Ahoj"))
			.await
			.unwrap();

		// Fake working copy under the exporter's vcs root
		let source_root = tempfile::tempdir().unwrap();
		let workdir = source_root.path().join(component_id.to_string());
		std::fs::create_dir_all(workdir.join("po")).unwrap();
		std::fs::create_dir_all(workdir.join(".git")).unwrap();
		std::fs::write(workdir.join("po/cs.po"), "msgid \"\"\nmsgstr \"\"\n").unwrap();
		std::fs::write(workdir.join(".git/config"), "ignored").unwrap();

		let service = make_service(&source_pool).await;
		let bytes = service
			.export_project(project_id, Some(source_root.path()))
			.await
			.unwrap();

		let target_pool = testing::create_core_test_pool().await;
		let target_root = tempfile::tempdir().unwrap();
		let service = make_service(&target_pool).await;
		let summary = service
			.restore_project(&bytes, Some(target_root.path()))
			.await
			.unwrap();

		assert_eq!(summary.vcs_files, 1);
		let components = ComponentRepository::new(target_pool);
		let restored = components
			.list_components_by_project(summary.project_id)
			.await
			.unwrap();
		let restored_file = target_root
			.path()
			.join(restored[0].id.to_string())
			.join("po/cs.po");
		assert!(restored_file.exists());
	}
}

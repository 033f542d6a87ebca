// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::error::DbError;

#[derive(Clone)]
pub struct ComponentRepository {
	pool: SqlitePool,
}

impl ComponentRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	// =========================================================================
	// Projects
	// =========================================================================

	#[tracing::instrument(skip(self, project), fields(project_id = %project.id, slug = %project.slug))]
	pub async fn create_project(&self, project: &ProjectRecord) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO projects (id, slug, name, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(project.id.to_string())
		.bind(&project.slug)
		.bind(&project.name)
		.bind(project.created_at.to_rfc3339())
		.bind(project.updated_at.to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(|e| match e {
			sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
				DbError::Conflict("Project already exists".to_string())
			}
			_ => DbError::Sqlx(e),
		})?;

		Ok(())
	}

	#[tracing::instrument(skip(self), fields(project_id = %id))]
	pub async fn get_project_by_id(&self, id: Uuid) -> Result<Option<ProjectRecord>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, slug, name, created_at, updated_at
			FROM projects
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_project(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(slug = %slug))]
	pub async fn get_project_by_slug(&self, slug: &str) -> Result<Option<ProjectRecord>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, slug, name, created_at, updated_at
			FROM projects
			WHERE slug = ?
			"#,
		)
		.bind(slug)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_project(&r)).transpose()
	}

	// =========================================================================
	// Components
	// =========================================================================

	#[tracing::instrument(skip(self, component), fields(component_id = %component.id, slug = %component.slug))]
	pub async fn create_component(&self, component: &ComponentRecord) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO components (id, project_id, slug, name, repo_url, branch, push_url, filemask, format, merge_style, locked, remove_missing, background_task_id, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(component.id.to_string())
		.bind(component.project_id.to_string())
		.bind(&component.slug)
		.bind(&component.name)
		.bind(&component.repo_url)
		.bind(&component.branch)
		.bind(&component.push_url)
		.bind(&component.filemask)
		.bind(&component.format)
		.bind(&component.merge_style)
		.bind(component.locked as i32)
		.bind(component.remove_missing as i32)
		.bind(&component.background_task_id)
		.bind(component.created_at.to_rfc3339())
		.bind(component.updated_at.to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(|e| match e {
			sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
				DbError::Conflict("Component already exists".to_string())
			}
			_ => DbError::Sqlx(e),
		})?;

		Ok(())
	}

	#[tracing::instrument(skip(self), fields(component_id = %id))]
	pub async fn get_component_by_id(&self, id: Uuid) -> Result<Option<ComponentRecord>, DbError> {
		let row = sqlx::query(&format!(
			"SELECT {COMPONENT_COLUMNS} FROM components WHERE id = ?"
		))
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_component(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(project_id = %project_id, slug = %slug))]
	pub async fn get_component_by_slug(
		&self,
		project_id: Uuid,
		slug: &str,
	) -> Result<Option<ComponentRecord>, DbError> {
		let row = sqlx::query(&format!(
			"SELECT {COMPONENT_COLUMNS} FROM components WHERE project_id = ? AND slug = ?"
		))
		.bind(project_id.to_string())
		.bind(slug)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_component(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(project_id = %project_id))]
	pub async fn list_components_by_project(
		&self,
		project_id: Uuid,
	) -> Result<Vec<ComponentRecord>, DbError> {
		let rows = sqlx::query(&format!(
			"SELECT {COMPONENT_COLUMNS} FROM components WHERE project_id = ? ORDER BY slug ASC"
		))
		.bind(project_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_component).collect()
	}

	#[tracing::instrument(skip(self, component), fields(component_id = %component.id))]
	pub async fn update_component(&self, component: &ComponentRecord) -> Result<(), DbError> {
		let updated_at = Utc::now().to_rfc3339();

		let result = sqlx::query(
			r#"
			UPDATE components
			SET name = ?, repo_url = ?, branch = ?, push_url = ?, filemask = ?, format = ?, merge_style = ?, remove_missing = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(&component.name)
		.bind(&component.repo_url)
		.bind(&component.branch)
		.bind(&component.push_url)
		.bind(&component.filemask)
		.bind(&component.format)
		.bind(&component.merge_style)
		.bind(component.remove_missing as i32)
		.bind(&updated_at)
		.bind(component.id.to_string())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound("Component not found".to_string()));
		}

		Ok(())
	}

	#[tracing::instrument(skip(self), fields(component_id = %id, locked = locked))]
	pub async fn set_locked(&self, id: Uuid, locked: bool) -> Result<(), DbError> {
		let result = sqlx::query(
			r#"
			UPDATE components
			SET locked = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(locked as i32)
		.bind(Utc::now().to_rfc3339())
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound("Component not found".to_string()));
		}

		Ok(())
	}

	#[tracing::instrument(skip(self), fields(component_id = %id))]
	pub async fn set_background_task(
		&self,
		id: Uuid,
		task_id: Option<&str>,
	) -> Result<(), DbError> {
		let result = sqlx::query(
			r#"
			UPDATE components
			SET background_task_id = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(task_id)
		.bind(Utc::now().to_rfc3339())
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound("Component not found".to_string()));
		}

		Ok(())
	}

	/// Unlink a cancelled or finished background task from whichever
	/// components still reference it, so they do not appear perpetually busy.
	#[tracing::instrument(skip(self), fields(task_id = %task_id))]
	pub async fn clear_background_task(&self, task_id: &str) -> Result<u64, DbError> {
		let result = sqlx::query(
			r#"
			UPDATE components
			SET background_task_id = NULL, updated_at = ?
			WHERE background_task_id = ?
			"#,
		)
		.bind(Utc::now().to_rfc3339())
		.bind(task_id)
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected())
	}

	// =========================================================================
	// Translations
	// =========================================================================

	#[tracing::instrument(skip(self, translation), fields(translation_id = %translation.id, language = %translation.language))]
	pub async fn create_translation(&self, translation: &TranslationRecord) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO translations (id, component_id, language, plural_count, filename, revision, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(translation.id.to_string())
		.bind(translation.component_id.to_string())
		.bind(&translation.language)
		.bind(translation.plural_count)
		.bind(&translation.filename)
		.bind(&translation.revision)
		.bind(translation.created_at.to_rfc3339())
		.bind(translation.updated_at.to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(|e| match e {
			sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
				DbError::Conflict("Translation already exists".to_string())
			}
			_ => DbError::Sqlx(e),
		})?;

		Ok(())
	}

	#[tracing::instrument(skip(self), fields(translation_id = %id))]
	pub async fn get_translation_by_id(
		&self,
		id: Uuid,
	) -> Result<Option<TranslationRecord>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, component_id, language, plural_count, filename, revision, created_at, updated_at
			FROM translations
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_translation(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(component_id = %component_id, language = %language))]
	pub async fn get_translation_by_language(
		&self,
		component_id: Uuid,
		language: &str,
	) -> Result<Option<TranslationRecord>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, component_id, language, plural_count, filename, revision, created_at, updated_at
			FROM translations
			WHERE component_id = ? AND language = ?
			"#,
		)
		.bind(component_id.to_string())
		.bind(language)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_translation(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(component_id = %component_id))]
	pub async fn list_translations_by_component(
		&self,
		component_id: Uuid,
	) -> Result<Vec<TranslationRecord>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, component_id, language, plural_count, filename, revision, created_at, updated_at
			FROM translations
			WHERE component_id = ?
			ORDER BY language ASC
			"#,
		)
		.bind(component_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_translation).collect()
	}

	#[tracing::instrument(skip(self), fields(translation_id = %id))]
	pub async fn set_revision(&self, id: Uuid, revision: Option<&str>) -> Result<(), DbError> {
		self.set_revision_with_executor(&self.pool, id, revision).await
	}

	pub async fn set_revision_with_executor<'e, E>(
		&self,
		executor: E,
		id: Uuid,
		revision: Option<&str>,
	) -> Result<(), DbError>
	where
		E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
	{
		let result = sqlx::query(
			r#"
			UPDATE translations
			SET revision = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(revision)
		.bind(Utc::now().to_rfc3339())
		.bind(id.to_string())
		.execute(executor)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound("Translation not found".to_string()));
		}

		Ok(())
	}
}

const COMPONENT_COLUMNS: &str = "id, project_id, slug, name, repo_url, branch, push_url, filemask, format, merge_style, locked, remove_missing, background_task_id, created_at, updated_at";

// =========================================================================
// Record Types (plain data structs, no domain logic)
// =========================================================================

#[derive(Debug, Clone)]
pub struct ProjectRecord {
	pub id: Uuid,
	pub slug: String,
	pub name: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ComponentRecord {
	pub id: Uuid,
	pub project_id: Uuid,
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
	pub background_task_id: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TranslationRecord {
	pub id: Uuid,
	pub component_id: Uuid,
	pub language: String,
	pub plural_count: i64,
	pub filename: String,
	pub revision: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

// =========================================================================
// Row Conversion Helpers
// =========================================================================

fn parse_uuid(value: &str) -> Result<Uuid, DbError> {
	Uuid::parse_str(value).map_err(|e| DbError::Internal(e.to_string()))
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(value)
		.map(|d| d.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(e.to_string()))
}

fn row_to_project(row: &sqlx::sqlite::SqliteRow) -> Result<ProjectRecord, DbError> {
	let id_str: String = row.get("id");
	let created_at_str: String = row.get("created_at");
	let updated_at_str: String = row.get("updated_at");

	Ok(ProjectRecord {
		id: parse_uuid(&id_str)?,
		slug: row.get("slug"),
		name: row.get("name"),
		created_at: parse_timestamp(&created_at_str)?,
		updated_at: parse_timestamp(&updated_at_str)?,
	})
}

fn row_to_component(row: &sqlx::sqlite::SqliteRow) -> Result<ComponentRecord, DbError> {
	let id_str: String = row.get("id");
	let project_id_str: String = row.get("project_id");
	let created_at_str: String = row.get("created_at");
	let updated_at_str: String = row.get("updated_at");

	Ok(ComponentRecord {
		id: parse_uuid(&id_str)?,
		project_id: parse_uuid(&project_id_str)?,
		slug: row.get("slug"),
		name: row.get("name"),
		repo_url: row.get("repo_url"),
		branch: row.get("branch"),
		push_url: row.get("push_url"),
		filemask: row.get("filemask"),
		format: row.get("format"),
		merge_style: row.get("merge_style"),
		locked: row.get::<i32, _>("locked") != 0,
		remove_missing: row.get::<i32, _>("remove_missing") != 0,
		background_task_id: row.get("background_task_id"),
		created_at: parse_timestamp(&created_at_str)?,
		updated_at: parse_timestamp(&updated_at_str)?,
	})
}

fn row_to_translation(row: &sqlx::sqlite::SqliteRow) -> Result<TranslationRecord, DbError> {
	let id_str: String = row.get("id");
	let component_id_str: String = row.get("component_id");
	let created_at_str: String = row.get("created_at");
	let updated_at_str: String = row.get("updated_at");

	Ok(TranslationRecord {
		id: parse_uuid(&id_str)?,
		component_id: parse_uuid(&component_id_str)?,
		language: row.get("language"),
		plural_count: row.get("plural_count"),
		filename: row.get("filename"),
		revision: row.get("revision"),
		created_at: parse_timestamp(&created_at_str)?,
		updated_at: parse_timestamp(&updated_at_str)?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing;

	async fn make_repo() -> ComponentRepository {
		let pool = testing::create_core_test_pool().await;
		ComponentRepository::new(pool)
	}

	fn make_project(slug: &str) -> ProjectRecord {
		let now = Utc::now();
		ProjectRecord {
			id: Uuid::new_v4(),
			slug: slug.to_string(),
			name: slug.to_string(),
			created_at: now,
			updated_at: now,
		}
	}

	fn make_component(project_id: Uuid, slug: &str) -> ComponentRecord {
		let now = Utc::now();
		ComponentRecord {
			id: Uuid::new_v4(),
			project_id,
			slug: slug.to_string(),
			name: slug.to_string(),
			repo_url: "https://example.com/repo.git".to_string(),
			branch: "main".to_string(),
			push_url: None,
			filemask: "po/*.po".to_string(),
			format: "po".to_string(),
			merge_style: "rebase".to_string(),
			locked: false,
			remove_missing: false,
			background_task_id: None,
			created_at: now,
			updated_at: now,
		}
	}

	fn make_translation(component_id: Uuid, language: &str) -> TranslationRecord {
		let now = Utc::now();
		TranslationRecord {
			id: Uuid::new_v4(),
			component_id,
			language: language.to_string(),
			plural_count: 2,
			filename: format!("po/{language}.po"),
			revision: None,
			created_at: now,
			updated_at: now,
		}
	}

	#[tokio::test]
	async fn test_create_and_get_project() {
		let repo = make_repo().await;
		let project = make_project("hello-world");

		repo.create_project(&project).await.unwrap();

		let fetched = repo.get_project_by_id(project.id).await.unwrap().unwrap();
		assert_eq!(fetched.slug, "hello-world");

		let by_slug = repo.get_project_by_slug("hello-world").await.unwrap();
		assert_eq!(by_slug.unwrap().id, project.id);
	}

	#[tokio::test]
	async fn test_duplicate_project_slug_conflicts() {
		let repo = make_repo().await;
		repo.create_project(&make_project("dup")).await.unwrap();

		let result = repo.create_project(&make_project("dup")).await;
		assert!(matches!(result, Err(DbError::Conflict(_))));
	}

	#[tokio::test]
	async fn test_component_crud() {
		let repo = make_repo().await;
		let project = make_project("proj");
		repo.create_project(&project).await.unwrap();

		let mut component = make_component(project.id, "app");
		repo.create_component(&component).await.unwrap();

		let fetched = repo
			.get_component_by_slug(project.id, "app")
			.await
			.unwrap()
			.unwrap();
		assert_eq!(fetched.filemask, "po/*.po");
		assert!(!fetched.locked);

		component.branch = "develop".to_string();
		repo.update_component(&component).await.unwrap();

		let fetched = repo.get_component_by_id(component.id).await.unwrap().unwrap();
		assert_eq!(fetched.branch, "develop");
	}

	#[tokio::test]
	async fn test_set_locked() {
		let repo = make_repo().await;
		let project = make_project("proj");
		repo.create_project(&project).await.unwrap();
		let component = make_component(project.id, "app");
		repo.create_component(&component).await.unwrap();

		repo.set_locked(component.id, true).await.unwrap();
		let fetched = repo.get_component_by_id(component.id).await.unwrap().unwrap();
		assert!(fetched.locked);

		repo.set_locked(component.id, false).await.unwrap();
		let fetched = repo.get_component_by_id(component.id).await.unwrap().unwrap();
		assert!(!fetched.locked);
	}

	#[tokio::test]
	async fn test_clear_background_task_unlinks_component() {
		let repo = make_repo().await;
		let project = make_project("proj");
		repo.create_project(&project).await.unwrap();
		let component = make_component(project.id, "app");
		repo.create_component(&component).await.unwrap();

		repo
			.set_background_task(component.id, Some("task-42"))
			.await
			.unwrap();
		let fetched = repo.get_component_by_id(component.id).await.unwrap().unwrap();
		assert_eq!(fetched.background_task_id.as_deref(), Some("task-42"));

		let cleared = repo.clear_background_task("task-42").await.unwrap();
		assert_eq!(cleared, 1);

		let fetched = repo.get_component_by_id(component.id).await.unwrap().unwrap();
		assert!(fetched.background_task_id.is_none());
	}

	#[tokio::test]
	async fn test_translation_revision_roundtrip() {
		let repo = make_repo().await;
		let project = make_project("proj");
		repo.create_project(&project).await.unwrap();
		let component = make_component(project.id, "app");
		repo.create_component(&component).await.unwrap();

		let translation = make_translation(component.id, "cs");
		repo.create_translation(&translation).await.unwrap();

		let fetched = repo
			.get_translation_by_language(component.id, "cs")
			.await
			.unwrap()
			.unwrap();
		assert!(fetched.revision.is_none());

		repo.set_revision(translation.id, Some("abc123")).await.unwrap();
		let fetched = repo
			.get_translation_by_id(translation.id)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(fetched.revision.as_deref(), Some("abc123"));
	}

	#[tokio::test]
	async fn test_list_translations_ordered_by_language() {
		let repo = make_repo().await;
		let project = make_project("proj");
		repo.create_project(&project).await.unwrap();
		let component = make_component(project.id, "app");
		repo.create_component(&component).await.unwrap();

		for lang in ["fr", "cs", "de"] {
			repo
				.create_translation(&make_translation(component.id, lang))
				.await
				.unwrap();
		}

		let translations = repo
			.list_translations_by_component(component.id)
			.await
			.unwrap();
		let languages: Vec<_> = translations.iter().map(|t| t.language.as_str()).collect();
		assert_eq!(languages, vec!["cs", "de", "fr"]);
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::Utc;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

pub async fn create_test_pool() -> SqlitePool {
	SqlitePool::connect(":memory:").await.unwrap()
}

pub async fn create_projects_table(pool: &SqlitePool) {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS projects (
			id TEXT PRIMARY KEY NOT NULL,
			slug TEXT NOT NULL UNIQUE,
			name TEXT NOT NULL,
			created_at TEXT NOT NULL,
			updated_at TEXT NOT NULL
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();
}

pub async fn create_components_table(pool: &SqlitePool) {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS components (
			id TEXT PRIMARY KEY NOT NULL,
			project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
			slug TEXT NOT NULL,
			name TEXT NOT NULL,
			repo_url TEXT NOT NULL,
			branch TEXT NOT NULL DEFAULT 'main',
			push_url TEXT,
			filemask TEXT NOT NULL,
			format TEXT NOT NULL,
			merge_style TEXT NOT NULL DEFAULT 'rebase' CHECK (merge_style IN ('merge', 'rebase')),
			locked INTEGER NOT NULL DEFAULT 0,
			remove_missing INTEGER NOT NULL DEFAULT 0,
			background_task_id TEXT,
			created_at TEXT NOT NULL,
			updated_at TEXT NOT NULL,
			UNIQUE (project_id, slug)
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();
}

pub async fn create_translations_table(pool: &SqlitePool) {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS translations (
			id TEXT PRIMARY KEY NOT NULL,
			component_id TEXT NOT NULL REFERENCES components(id) ON DELETE CASCADE,
			language TEXT NOT NULL,
			plural_count INTEGER NOT NULL DEFAULT 2,
			filename TEXT NOT NULL,
			revision TEXT,
			created_at TEXT NOT NULL,
			updated_at TEXT NOT NULL,
			UNIQUE (component_id, language)
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();
}

pub async fn create_units_table(pool: &SqlitePool) {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS units (
			id TEXT PRIMARY KEY NOT NULL,
			translation_id TEXT NOT NULL REFERENCES translations(id) ON DELETE CASCADE,
			id_hash INTEGER NOT NULL,
			context TEXT NOT NULL DEFAULT '',
			source TEXT NOT NULL,
			target TEXT NOT NULL,
			state TEXT NOT NULL CHECK (state IN ('empty', 'needs_editing', 'translated', 'approved', 'read_only')),
			position INTEGER NOT NULL,
			content_hash INTEGER NOT NULL,
			target_hash INTEGER NOT NULL DEFAULT 0,
			explanation TEXT NOT NULL DEFAULT '',
			extra_flags TEXT NOT NULL DEFAULT '',
			labels TEXT NOT NULL DEFAULT '[]',
			last_edited_by TEXT,
			pending INTEGER NOT NULL DEFAULT 0,
			created_at TEXT NOT NULL,
			updated_at TEXT NOT NULL,
			UNIQUE (translation_id, id_hash)
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();
}

pub async fn create_changes_table(pool: &SqlitePool) {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS changes (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			action TEXT NOT NULL,
			project_id TEXT,
			component_id TEXT,
			translation_id TEXT,
			unit_id TEXT,
			user_id TEXT,
			details TEXT NOT NULL DEFAULT 'null',
			created_at TEXT NOT NULL
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();

	sqlx::query(
		"CREATE INDEX IF NOT EXISTS idx_changes_scope ON changes(project_id, component_id, translation_id, created_at)",
	)
	.execute(pool)
	.await
	.unwrap();

	sqlx::query("CREATE INDEX IF NOT EXISTS idx_changes_action ON changes(action, created_at)")
		.execute(pool)
		.await
		.unwrap();
}

pub async fn create_users_table(pool: &SqlitePool) {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS users (
			id TEXT PRIMARY KEY NOT NULL,
			email TEXT NOT NULL UNIQUE,
			full_name TEXT NOT NULL,
			language TEXT NOT NULL DEFAULT 'en',
			is_active INTEGER NOT NULL DEFAULT 1,
			is_bot INTEGER NOT NULL DEFAULT 0,
			created_at TEXT NOT NULL
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS watched_projects (
			user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
			project_id TEXT NOT NULL,
			PRIMARY KEY (user_id, project_id)
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();
}

pub async fn create_subscriptions_table(pool: &SqlitePool) {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS subscriptions (
			user_id TEXT NOT NULL,
			kind TEXT NOT NULL,
			scope INTEGER NOT NULL,
			project_id TEXT NOT NULL DEFAULT '',
			component_id TEXT NOT NULL DEFAULT '',
			frequency TEXT NOT NULL CHECK (frequency IN ('instant', 'daily', 'weekly', 'monthly')),
			PRIMARY KEY (user_id, kind, scope, project_id, component_id)
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();
}

pub async fn create_job_tables(pool: &SqlitePool) {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS job_definitions (
			id TEXT PRIMARY KEY,
			name TEXT NOT NULL,
			description TEXT NOT NULL,
			job_type TEXT NOT NULL,
			interval_secs INTEGER,
			enabled INTEGER NOT NULL DEFAULT 1,
			created_at TEXT NOT NULL,
			updated_at TEXT NOT NULL
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS job_runs (
			id TEXT PRIMARY KEY,
			job_id TEXT NOT NULL REFERENCES job_definitions(id),
			status TEXT NOT NULL,
			started_at TEXT NOT NULL,
			completed_at TEXT,
			duration_ms INTEGER,
			error_message TEXT,
			retry_count INTEGER NOT NULL DEFAULT 0,
			triggered_by TEXT NOT NULL
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();
}

/// Full schema for the translation core. Every crate's tests build on this.
pub async fn create_core_test_pool() -> SqlitePool {
	let pool = create_test_pool().await;
	create_projects_table(&pool).await;
	create_components_table(&pool).await;
	create_translations_table(&pool).await;
	create_units_table(&pool).await;
	create_changes_table(&pool).await;
	create_users_table(&pool).await;
	create_subscriptions_table(&pool).await;
	create_job_tables(&pool).await;
	pool
}

/// Insert a project, component, and one translation; returns the
/// translation id. Convenience for unit-store tests.
pub async fn seed_translation(pool: &SqlitePool) -> Uuid {
	seed_translation_for_language(pool, "cs", 3).await.2
}

/// Insert a project, component, and one translation for the given language.
/// Returns (project_id, component_id, translation_id).
pub async fn seed_translation_for_language(
	pool: &SqlitePool,
	language: &str,
	plural_count: i64,
) -> (Uuid, Uuid, Uuid) {
	let now = Utc::now().to_rfc3339();
	let project_id = Uuid::new_v4();
	let component_id = Uuid::new_v4();
	let translation_id = Uuid::new_v4();

	sqlx::query("INSERT INTO projects (id, slug, name, created_at, updated_at) VALUES (?, ?, ?, ?, ?)")
		.bind(project_id.to_string())
		.bind(format!("project-{project_id}"))
		.bind("Test Project")
		.bind(&now)
		.bind(&now)
		.execute(pool)
		.await
		.unwrap();

	sqlx::query(
		r#"
		INSERT INTO components (id, project_id, slug, name, repo_url, branch, filemask, format, merge_style, created_at, updated_at)
		VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
		"#,
	)
	.bind(component_id.to_string())
	.bind(project_id.to_string())
	.bind("app")
	.bind("App")
	.bind("https://example.com/repo.git")
	.bind("main")
	.bind("po/*.po")
	.bind("po")
	.bind("rebase")
	.bind(&now)
	.bind(&now)
	.execute(pool)
	.await
	.unwrap();

	sqlx::query(
		r#"
		INSERT INTO translations (id, component_id, language, plural_count, filename, created_at, updated_at)
		VALUES (?, ?, ?, ?, ?, ?, ?)
		"#,
	)
	.bind(translation_id.to_string())
	.bind(component_id.to_string())
	.bind(language)
	.bind(plural_count)
	.bind(format!("po/{language}.po"))
	.bind(&now)
	.bind(&now)
	.execute(pool)
	.await
	.unwrap();

	(project_id, component_id, translation_id)
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::component::parse_timestamp;
use crate::error::DbError;

/// The minimum user surface the sync and notification engines need.
/// Authentication and profile management live outside this core.
#[derive(Debug, Clone)]
pub struct UserRecord {
	pub id: Uuid,
	pub email: String,
	pub full_name: String,
	pub language: String,
	pub is_active: bool,
	pub is_bot: bool,
	pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct UserRepository {
	pool: SqlitePool,
}

impl UserRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, user), fields(user_id = %user.id, email = %user.email))]
	pub async fn create(&self, user: &UserRecord) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO users (id, email, full_name, language, is_active, is_bot, created_at)
			VALUES (?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(user.id.to_string())
		.bind(&user.email)
		.bind(&user.full_name)
		.bind(&user.language)
		.bind(user.is_active as i32)
		.bind(user.is_bot as i32)
		.bind(user.created_at.to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(|e| match e {
			sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
				DbError::Conflict("User already exists".to_string())
			}
			_ => DbError::Sqlx(e),
		})?;

		Ok(())
	}

	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn get_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, email, full_name, language, is_active, is_bot, created_at
			FROM users
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_user(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id, project_id = %project_id))]
	pub async fn watch_project(&self, user_id: Uuid, project_id: Uuid) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO watched_projects (user_id, project_id)
			VALUES (?, ?)
			ON CONFLICT (user_id, project_id) DO NOTHING
			"#,
		)
		.bind(user_id.to_string())
		.bind(project_id.to_string())
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id, project_id = %project_id))]
	pub async fn unwatch_project(&self, user_id: Uuid, project_id: Uuid) -> Result<(), DbError> {
		sqlx::query(
			r#"
			DELETE FROM watched_projects
			WHERE user_id = ? AND project_id = ?
			"#,
		)
		.bind(user_id.to_string())
		.bind(project_id.to_string())
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id, project_id = %project_id))]
	pub async fn watches_project(&self, user_id: Uuid, project_id: Uuid) -> Result<bool, DbError> {
		let row = sqlx::query(
			r#"
			SELECT 1 AS present
			FROM watched_projects
			WHERE user_id = ? AND project_id = ?
			"#,
		)
		.bind(user_id.to_string())
		.bind(project_id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		Ok(row.is_some())
	}
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<UserRecord, DbError> {
	let id_str: String = row.get("id");
	let created_at_str: String = row.get("created_at");

	Ok(UserRecord {
		id: Uuid::parse_str(&id_str).map_err(|e| DbError::Internal(e.to_string()))?,
		email: row.get("email"),
		full_name: row.get("full_name"),
		language: row.get("language"),
		is_active: row.get::<i32, _>("is_active") != 0,
		is_bot: row.get::<i32, _>("is_bot") != 0,
		created_at: parse_timestamp(&created_at_str)?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing;

	fn make_user(email: &str) -> UserRecord {
		UserRecord {
			id: Uuid::new_v4(),
			email: email.to_string(),
			full_name: "Test User".to_string(),
			language: "en".to_string(),
			is_active: true,
			is_bot: false,
			created_at: Utc::now(),
		}
	}

	#[tokio::test]
	async fn test_create_and_get_user() {
		let pool = testing::create_core_test_pool().await;
		let repo = UserRepository::new(pool);

		let user = make_user("translator@example.com");
		repo.create(&user).await.unwrap();

		let fetched = repo.get_by_id(user.id).await.unwrap().unwrap();
		assert_eq!(fetched.email, "translator@example.com");
		assert!(fetched.is_active);
		assert!(!fetched.is_bot);
	}

	#[tokio::test]
	async fn test_watch_unwatch_project() {
		let pool = testing::create_core_test_pool().await;
		let repo = UserRepository::new(pool);

		let user = make_user("watcher@example.com");
		repo.create(&user).await.unwrap();
		let project_id = Uuid::new_v4();

		assert!(!repo.watches_project(user.id, project_id).await.unwrap());

		repo.watch_project(user.id, project_id).await.unwrap();
		assert!(repo.watches_project(user.id, project_id).await.unwrap());

		// Watching twice is a no-op, not an error
		repo.watch_project(user.id, project_id).await.unwrap();

		repo.unwatch_project(user.id, project_id).await.unwrap();
		assert!(!repo.watches_project(user.id, project_id).await.unwrap());
	}
}

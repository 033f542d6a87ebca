// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::component::parse_timestamp;
use crate::error::DbError;

/// One translatable string in one language of one component.
///
/// `id_hash` identifies *which* string this is (stable across edits);
/// `content_hash` tracks the current source+context and changes whenever
/// the source string is edited upstream. `target_hash` tracks the current
/// translation and backs the optimistic-concurrency check on save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitRecord {
	pub id: Uuid,
	pub translation_id: Uuid,
	pub id_hash: i64,
	pub context: String,
	pub source: Vec<String>,
	pub target: Vec<String>,
	pub state: String,
	pub position: i64,
	pub content_hash: i64,
	pub target_hash: i64,
	pub explanation: String,
	pub extra_flags: String,
	pub labels: Vec<String>,
	pub last_edited_by: Option<Uuid>,
	pub pending: bool,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct UnitRepository {
	pool: SqlitePool,
}

impl UnitRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	#[tracing::instrument(skip(self, unit), fields(unit_id = %unit.id, id_hash = unit.id_hash))]
	pub async fn create(&self, unit: &UnitRecord) -> Result<(), DbError> {
		self
			.create_with_executor(&self.pool, unit)
			.await
	}

	/// Insert a unit through an explicit executor so callers can scope the
	/// write to a transaction (all-or-nothing reconciliation).
	pub async fn create_with_executor<'e, E>(&self, executor: E, unit: &UnitRecord) -> Result<(), DbError>
	where
		E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
	{
		let source_json = serde_json::to_string(&unit.source)?;
		let target_json = serde_json::to_string(&unit.target)?;
		let labels_json = serde_json::to_string(&unit.labels)?;

		sqlx::query(
			r#"
			INSERT INTO units (id, translation_id, id_hash, context, source, target, state, position, content_hash, target_hash, explanation, extra_flags, labels, last_edited_by, pending, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(unit.id.to_string())
		.bind(unit.translation_id.to_string())
		.bind(unit.id_hash)
		.bind(&unit.context)
		.bind(&source_json)
		.bind(&target_json)
		.bind(&unit.state)
		.bind(unit.position)
		.bind(unit.content_hash)
		.bind(unit.target_hash)
		.bind(&unit.explanation)
		.bind(&unit.extra_flags)
		.bind(&labels_json)
		.bind(unit.last_edited_by.map(|u| u.to_string()))
		.bind(unit.pending as i32)
		.bind(unit.created_at.to_rfc3339())
		.bind(unit.updated_at.to_rfc3339())
		.execute(executor)
		.await
		.map_err(|e| match e {
			sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
				DbError::Conflict("Unit already exists".to_string())
			}
			_ => DbError::Sqlx(e),
		})?;

		Ok(())
	}

	#[tracing::instrument(skip(self), fields(unit_id = %id))]
	pub async fn get_by_id(&self, id: Uuid) -> Result<Option<UnitRecord>, DbError> {
		let row = sqlx::query(&format!("SELECT {UNIT_COLUMNS} FROM units WHERE id = ?"))
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		row.map(|r| row_to_unit(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(translation_id = %translation_id, id_hash = id_hash))]
	pub async fn get_by_id_hash(
		&self,
		translation_id: Uuid,
		id_hash: i64,
	) -> Result<Option<UnitRecord>, DbError> {
		let row = sqlx::query(&format!(
			"SELECT {UNIT_COLUMNS} FROM units WHERE translation_id = ? AND id_hash = ?"
		))
		.bind(translation_id.to_string())
		.bind(id_hash)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_unit(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(translation_id = %translation_id))]
	pub async fn list_by_translation(
		&self,
		translation_id: Uuid,
	) -> Result<Vec<UnitRecord>, DbError> {
		let rows = sqlx::query(&format!(
			"SELECT {UNIT_COLUMNS} FROM units WHERE translation_id = ? ORDER BY position ASC"
		))
		.bind(translation_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_unit).collect()
	}

	#[tracing::instrument(skip(self), fields(translation_id = %translation_id))]
	pub async fn list_pending(&self, translation_id: Uuid) -> Result<Vec<UnitRecord>, DbError> {
		let rows = sqlx::query(&format!(
			"SELECT {UNIT_COLUMNS} FROM units WHERE translation_id = ? AND pending = 1 ORDER BY position ASC"
		))
		.bind(translation_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_unit).collect()
	}

	#[tracing::instrument(skip(self, unit), fields(unit_id = %unit.id))]
	pub async fn update(&self, unit: &UnitRecord) -> Result<(), DbError> {
		self.update_with_executor(&self.pool, unit).await
	}

	pub async fn update_with_executor<'e, E>(&self, executor: E, unit: &UnitRecord) -> Result<(), DbError>
	where
		E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
	{
		let source_json = serde_json::to_string(&unit.source)?;
		let target_json = serde_json::to_string(&unit.target)?;
		let labels_json = serde_json::to_string(&unit.labels)?;
		let updated_at = Utc::now().to_rfc3339();

		let result = sqlx::query(
			r#"
			UPDATE units
			SET context = ?, source = ?, target = ?, state = ?, position = ?, content_hash = ?, target_hash = ?, explanation = ?, extra_flags = ?, labels = ?, last_edited_by = ?, pending = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(&unit.context)
		.bind(&source_json)
		.bind(&target_json)
		.bind(&unit.state)
		.bind(unit.position)
		.bind(unit.content_hash)
		.bind(unit.target_hash)
		.bind(&unit.explanation)
		.bind(&unit.extra_flags)
		.bind(&labels_json)
		.bind(unit.last_edited_by.map(|u| u.to_string()))
		.bind(unit.pending as i32)
		.bind(&updated_at)
		.bind(unit.id.to_string())
		.execute(executor)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound("Unit not found".to_string()));
		}

		Ok(())
	}

	/// Hard delete; only the dedicated unit-removal path may call this, and
	/// it must also update the backing file.
	#[tracing::instrument(skip(self), fields(unit_id = %id))]
	pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
		self.delete_with_executor(&self.pool, id).await
	}

	pub async fn delete_with_executor<'e, E>(&self, executor: E, id: Uuid) -> Result<(), DbError>
	where
		E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
	{
		let result = sqlx::query(r#"DELETE FROM units WHERE id = ?"#)
			.bind(id.to_string())
			.execute(executor)
			.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound("Unit not found".to_string()));
		}

		Ok(())
	}

	#[tracing::instrument(skip(self), fields(translation_id = %translation_id))]
	pub async fn clear_pending(&self, translation_id: Uuid) -> Result<u64, DbError> {
		let result = sqlx::query(
			r#"
			UPDATE units
			SET pending = 0, updated_at = ?
			WHERE translation_id = ? AND pending = 1
			"#,
		)
		.bind(Utc::now().to_rfc3339())
		.bind(translation_id.to_string())
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected())
	}
}

const UNIT_COLUMNS: &str = "id, translation_id, id_hash, context, source, target, state, position, content_hash, target_hash, explanation, extra_flags, labels, last_edited_by, pending, created_at, updated_at";

fn row_to_unit(row: &sqlx::sqlite::SqliteRow) -> Result<UnitRecord, DbError> {
	let id_str: String = row.get("id");
	let translation_id_str: String = row.get("translation_id");
	let source_json: String = row.get("source");
	let target_json: String = row.get("target");
	let labels_json: String = row.get("labels");
	let last_edited_by_str: Option<String> = row.get("last_edited_by");
	let created_at_str: String = row.get("created_at");
	let updated_at_str: String = row.get("updated_at");

	Ok(UnitRecord {
		id: Uuid::parse_str(&id_str).map_err(|e| DbError::Internal(e.to_string()))?,
		translation_id: Uuid::parse_str(&translation_id_str)
			.map_err(|e| DbError::Internal(e.to_string()))?,
		id_hash: row.get("id_hash"),
		context: row.get("context"),
		source: serde_json::from_str(&source_json)?,
		target: serde_json::from_str(&target_json)?,
		state: row.get("state"),
		position: row.get("position"),
		content_hash: row.get("content_hash"),
		target_hash: row.get("target_hash"),
		explanation: row.get("explanation"),
		extra_flags: row.get("extra_flags"),
		labels: serde_json::from_str(&labels_json)?,
		last_edited_by: last_edited_by_str
			.map(|s| Uuid::parse_str(&s))
			.transpose()
			.map_err(|e| DbError::Internal(e.to_string()))?,
		pending: row.get::<i32, _>("pending") != 0,
		created_at: parse_timestamp(&created_at_str)?,
		updated_at: parse_timestamp(&updated_at_str)?,
	})
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::component::parse_timestamp;
use crate::error::DbError;

/// What happened. Append-only; never mutated after insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
	NewUnit,
	SourceChange,
	Translated,
	Approved,
	MarkedForEdit,
	Suggestion,
	SuggestionAccepted,
	Comment,
	BulkEdit,
	Upload,
	RemovedUnit,
	NewTranslationFile,
	Commit,
	Push,
	Reset,
	Merge,
	Rebase,
	FailedMerge,
	FailedRebase,
	FailedPush,
	ParseError,
	Locked,
	Unlocked,
}

impl ChangeAction {
	pub fn as_str(&self) -> &'static str {
		match self {
			ChangeAction::NewUnit => "new_unit",
			ChangeAction::SourceChange => "source_change",
			ChangeAction::Translated => "translated",
			ChangeAction::Approved => "approved",
			ChangeAction::MarkedForEdit => "marked_for_edit",
			ChangeAction::Suggestion => "suggestion",
			ChangeAction::SuggestionAccepted => "suggestion_accepted",
			ChangeAction::Comment => "comment",
			ChangeAction::BulkEdit => "bulk_edit",
			ChangeAction::Upload => "upload",
			ChangeAction::RemovedUnit => "removed_unit",
			ChangeAction::NewTranslationFile => "new_translation_file",
			ChangeAction::Commit => "commit",
			ChangeAction::Push => "push",
			ChangeAction::Reset => "reset",
			ChangeAction::Merge => "merge",
			ChangeAction::Rebase => "rebase",
			ChangeAction::FailedMerge => "failed_merge",
			ChangeAction::FailedRebase => "failed_rebase",
			ChangeAction::FailedPush => "failed_push",
			ChangeAction::ParseError => "parse_error",
			ChangeAction::Locked => "locked",
			ChangeAction::Unlocked => "unlocked",
		}
	}
}

impl std::str::FromStr for ChangeAction {
	type Err = ();
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"new_unit" => Ok(ChangeAction::NewUnit),
			"source_change" => Ok(ChangeAction::SourceChange),
			"translated" => Ok(ChangeAction::Translated),
			"approved" => Ok(ChangeAction::Approved),
			"marked_for_edit" => Ok(ChangeAction::MarkedForEdit),
			"suggestion" => Ok(ChangeAction::Suggestion),
			"suggestion_accepted" => Ok(ChangeAction::SuggestionAccepted),
			"comment" => Ok(ChangeAction::Comment),
			"bulk_edit" => Ok(ChangeAction::BulkEdit),
			"upload" => Ok(ChangeAction::Upload),
			"removed_unit" => Ok(ChangeAction::RemovedUnit),
			"new_translation_file" => Ok(ChangeAction::NewTranslationFile),
			"commit" => Ok(ChangeAction::Commit),
			"push" => Ok(ChangeAction::Push),
			"reset" => Ok(ChangeAction::Reset),
			"merge" => Ok(ChangeAction::Merge),
			"rebase" => Ok(ChangeAction::Rebase),
			"failed_merge" => Ok(ChangeAction::FailedMerge),
			"failed_rebase" => Ok(ChangeAction::FailedRebase),
			"failed_push" => Ok(ChangeAction::FailedPush),
			"parse_error" => Ok(ChangeAction::ParseError),
			"locked" => Ok(ChangeAction::Locked),
			"unlocked" => Ok(ChangeAction::Unlocked),
			_ => Err(()),
		}
	}
}

/// Append-only log record. `id` is the monotonic insertion order and the
/// only ordering notification digests may rely on.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
	pub id: i64,
	pub action: ChangeAction,
	pub project_id: Option<Uuid>,
	pub component_id: Option<Uuid>,
	pub translation_id: Option<Uuid>,
	pub unit_id: Option<Uuid>,
	pub user_id: Option<Uuid>,
	pub details: serde_json::Value,
	pub created_at: DateTime<Utc>,
}

/// A new change to append; the store assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewChange {
	pub action: ChangeAction,
	pub project_id: Option<Uuid>,
	pub component_id: Option<Uuid>,
	pub translation_id: Option<Uuid>,
	pub unit_id: Option<Uuid>,
	pub user_id: Option<Uuid>,
	pub details: serde_json::Value,
}

impl NewChange {
	pub fn new(action: ChangeAction) -> Self {
		Self {
			action,
			project_id: None,
			component_id: None,
			translation_id: None,
			unit_id: None,
			user_id: None,
			details: serde_json::Value::Null,
		}
	}

	pub fn project(mut self, id: Uuid) -> Self {
		self.project_id = Some(id);
		self
	}

	pub fn component(mut self, id: Uuid) -> Self {
		self.component_id = Some(id);
		self
	}

	pub fn translation(mut self, id: Uuid) -> Self {
		self.translation_id = Some(id);
		self
	}

	pub fn unit(mut self, id: Uuid) -> Self {
		self.unit_id = Some(id);
		self
	}

	pub fn user(mut self, id: Uuid) -> Self {
		self.user_id = Some(id);
		self
	}

	pub fn details(mut self, details: serde_json::Value) -> Self {
		self.details = details;
		self
	}
}

/// Filter for change range queries. All fields are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct ChangeFilter {
	pub project_id: Option<Uuid>,
	pub component_id: Option<Uuid>,
	pub translation_id: Option<Uuid>,
	pub actions: Option<Vec<ChangeAction>>,
	pub since: Option<DateTime<Utc>>,
	pub until: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct ChangeRepository {
	pool: SqlitePool,
}

impl ChangeRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, change), fields(action = change.action.as_str()))]
	pub async fn append(&self, change: &NewChange) -> Result<ChangeRecord, DbError> {
		self.append_with_executor(&self.pool, change).await
	}

	pub async fn append_with_executor<'e, E>(
		&self,
		executor: E,
		change: &NewChange,
	) -> Result<ChangeRecord, DbError>
	where
		E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
	{
		let created_at = Utc::now();
		let details_json = serde_json::to_string(&change.details)?;

		let result = sqlx::query(
			r#"
			INSERT INTO changes (action, project_id, component_id, translation_id, unit_id, user_id, details, created_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(change.action.as_str())
		.bind(change.project_id.map(|u| u.to_string()))
		.bind(change.component_id.map(|u| u.to_string()))
		.bind(change.translation_id.map(|u| u.to_string()))
		.bind(change.unit_id.map(|u| u.to_string()))
		.bind(change.user_id.map(|u| u.to_string()))
		.bind(&details_json)
		.bind(created_at.to_rfc3339())
		.execute(executor)
		.await?;

		Ok(ChangeRecord {
			id: result.last_insert_rowid(),
			action: change.action,
			project_id: change.project_id,
			component_id: change.component_id,
			translation_id: change.translation_id,
			unit_id: change.unit_id,
			user_id: change.user_id,
			details: change.details.clone(),
			created_at,
		})
	}

	#[tracing::instrument(skip(self), fields(change_id = id))]
	pub async fn get_by_id(&self, id: i64) -> Result<Option<ChangeRecord>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, action, project_id, component_id, translation_id, unit_id, user_id, details, created_at
			FROM changes
			WHERE id = ?
			"#,
		)
		.bind(id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_change(&r)).transpose()
	}

	/// Range query over the change log, in insertion order.
	///
	/// Supports the only hard indexing requirement the core surfaces to
	/// storage: filtering by (project, component, translation, time range)
	/// and by action-set membership.
	#[tracing::instrument(skip(self, filter))]
	pub async fn list(&self, filter: &ChangeFilter) -> Result<Vec<ChangeRecord>, DbError> {
		let mut sql = String::from(
			"SELECT id, action, project_id, component_id, translation_id, unit_id, user_id, details, created_at FROM changes WHERE 1=1",
		);
		let mut binds: Vec<String> = Vec::new();

		if let Some(project_id) = filter.project_id {
			sql.push_str(" AND project_id = ?");
			binds.push(project_id.to_string());
		}
		if let Some(component_id) = filter.component_id {
			sql.push_str(" AND component_id = ?");
			binds.push(component_id.to_string());
		}
		if let Some(translation_id) = filter.translation_id {
			sql.push_str(" AND translation_id = ?");
			binds.push(translation_id.to_string());
		}
		if let Some(actions) = &filter.actions {
			if actions.is_empty() {
				return Ok(Vec::new());
			}
			let placeholders = vec!["?"; actions.len()].join(", ");
			sql.push_str(&format!(" AND action IN ({placeholders})"));
			for action in actions {
				binds.push(action.as_str().to_string());
			}
		}
		if let Some(since) = filter.since {
			sql.push_str(" AND created_at >= ?");
			binds.push(since.to_rfc3339());
		}
		if let Some(until) = filter.until {
			sql.push_str(" AND created_at < ?");
			binds.push(until.to_rfc3339());
		}

		sql.push_str(" ORDER BY id ASC");

		let mut query = sqlx::query(&sql);
		for bind in &binds {
			query = query.bind(bind);
		}

		let rows = query.fetch_all(&self.pool).await?;
		rows.iter().map(row_to_change).collect()
	}
}

fn row_to_change(row: &sqlx::sqlite::SqliteRow) -> Result<ChangeRecord, DbError> {
	let action_str: String = row.get("action");
	let project_id_str: Option<String> = row.get("project_id");
	let component_id_str: Option<String> = row.get("component_id");
	let translation_id_str: Option<String> = row.get("translation_id");
	let unit_id_str: Option<String> = row.get("unit_id");
	let user_id_str: Option<String> = row.get("user_id");
	let details_json: String = row.get("details");
	let created_at_str: String = row.get("created_at");

	let parse_opt_uuid = |value: Option<String>| -> Result<Option<Uuid>, DbError> {
		value
			.map(|s| Uuid::parse_str(&s))
			.transpose()
			.map_err(|e| DbError::Internal(e.to_string()))
	};

	Ok(ChangeRecord {
		id: row.get("id"),
		action: action_str
			.parse::<ChangeAction>()
			.map_err(|_| DbError::Internal(format!("invalid change action: {action_str}")))?,
		project_id: parse_opt_uuid(project_id_str)?,
		component_id: parse_opt_uuid(component_id_str)?,
		translation_id: parse_opt_uuid(translation_id_str)?,
		unit_id: parse_opt_uuid(unit_id_str)?,
		user_id: parse_opt_uuid(user_id_str)?,
		details: serde_json::from_str(&details_json)?,
		created_at: parse_timestamp(&created_at_str)?,
	})
}

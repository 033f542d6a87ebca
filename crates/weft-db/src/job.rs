// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePool, Row};

use crate::component::parse_timestamp;
use crate::error::DbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
	Running,
	Succeeded,
	Failed,
	Cancelled,
}

impl JobStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			JobStatus::Running => "running",
			JobStatus::Succeeded => "succeeded",
			JobStatus::Failed => "failed",
			JobStatus::Cancelled => "cancelled",
		}
	}
}

impl std::str::FromStr for JobStatus {
	type Err = ();
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"running" => Ok(JobStatus::Running),
			"succeeded" => Ok(JobStatus::Succeeded),
			"failed" => Ok(JobStatus::Failed),
			"cancelled" => Ok(JobStatus::Cancelled),
			_ => Err(()),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
	Schedule,
	Manual,
	Retry,
}

impl TriggerSource {
	pub fn as_str(&self) -> &'static str {
		match self {
			TriggerSource::Schedule => "schedule",
			TriggerSource::Manual => "manual",
			TriggerSource::Retry => "retry",
		}
	}
}

impl std::str::FromStr for TriggerSource {
	type Err = ();
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"schedule" => Ok(TriggerSource::Schedule),
			"manual" => Ok(TriggerSource::Manual),
			"retry" => Ok(TriggerSource::Retry),
			_ => Err(()),
		}
	}
}

#[derive(Debug, Clone)]
pub struct JobDefinitionRecord {
	pub id: String,
	pub name: String,
	pub description: String,
	pub job_type: String,
	pub interval_secs: Option<i64>,
	pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct JobRunRecord {
	pub id: String,
	pub job_id: String,
	pub status: JobStatus,
	pub started_at: DateTime<Utc>,
	pub completed_at: Option<DateTime<Utc>>,
	pub duration_ms: Option<i64>,
	pub error_message: Option<String>,
	pub retry_count: i64,
	pub triggered_by: TriggerSource,
}

#[derive(Clone)]
pub struct JobRepository {
	pool: SqlitePool,
}

impl JobRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, definition), fields(job_id = %definition.id))]
	pub async fn upsert_definition(&self, definition: &JobDefinitionRecord) -> Result<(), DbError> {
		let now = Utc::now().to_rfc3339();

		sqlx::query(
			r#"
			INSERT INTO job_definitions (id, name, description, job_type, interval_secs, enabled, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?)
			ON CONFLICT (id) DO UPDATE SET
				name = excluded.name,
				description = excluded.description,
				job_type = excluded.job_type,
				interval_secs = excluded.interval_secs,
				enabled = excluded.enabled,
				updated_at = excluded.updated_at
			"#,
		)
		.bind(&definition.id)
		.bind(&definition.name)
		.bind(&definition.description)
		.bind(&definition.job_type)
		.bind(definition.interval_secs)
		.bind(definition.enabled as i32)
		.bind(&now)
		.bind(&now)
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[tracing::instrument(skip(self, run), fields(run_id = %run.id, job_id = %run.job_id))]
	pub async fn record_run_start(&self, run: &JobRunRecord) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO job_runs (id, job_id, status, started_at, completed_at, duration_ms, error_message, retry_count, triggered_by)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(&run.id)
		.bind(&run.job_id)
		.bind(run.status.as_str())
		.bind(run.started_at.to_rfc3339())
		.bind(run.completed_at.map(|t| t.to_rfc3339()))
		.bind(run.duration_ms)
		.bind(&run.error_message)
		.bind(run.retry_count)
		.bind(run.triggered_by.as_str())
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[tracing::instrument(skip(self), fields(run_id = %run_id, status = status.as_str()))]
	pub async fn record_run_complete(
		&self,
		run_id: &str,
		status: JobStatus,
		error_message: Option<String>,
	) -> Result<(), DbError> {
		let completed_at = Utc::now();

		let started_at: Option<String> =
			sqlx::query_scalar(r#"SELECT started_at FROM job_runs WHERE id = ?"#)
				.bind(run_id)
				.fetch_optional(&self.pool)
				.await?;

		let started_at =
			started_at.ok_or_else(|| DbError::NotFound("Job run not found".to_string()))?;
		let duration_ms = (completed_at - parse_timestamp(&started_at)?).num_milliseconds();

		sqlx::query(
			r#"
			UPDATE job_runs
			SET status = ?, completed_at = ?, duration_ms = ?, error_message = ?
			WHERE id = ?
			"#,
		)
		.bind(status.as_str())
		.bind(completed_at.to_rfc3339())
		.bind(duration_ms)
		.bind(&error_message)
		.bind(run_id)
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[tracing::instrument(skip(self), fields(job_id = %job_id))]
	pub async fn get_last_run(&self, job_id: &str) -> Result<Option<JobRunRecord>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, job_id, status, started_at, completed_at, duration_ms, error_message, retry_count, triggered_by
			FROM job_runs
			WHERE job_id = ?
			ORDER BY started_at DESC
			LIMIT 1
			"#,
		)
		.bind(job_id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_run(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(job_id = %job_id))]
	pub async fn count_consecutive_failures(&self, job_id: &str) -> Result<u32, DbError> {
		let rows = sqlx::query_scalar::<_, String>(
			r#"
			SELECT status
			FROM job_runs
			WHERE job_id = ? AND status != 'running'
			ORDER BY started_at DESC
			"#,
		)
		.bind(job_id)
		.fetch_all(&self.pool)
		.await?;

		let mut count = 0;
		for status in rows {
			if status == "failed" {
				count += 1;
			} else {
				break;
			}
		}

		Ok(count)
	}
}

fn row_to_run(row: &sqlx::sqlite::SqliteRow) -> Result<JobRunRecord, DbError> {
	let status_str: String = row.get("status");
	let triggered_by_str: String = row.get("triggered_by");
	let started_at_str: String = row.get("started_at");
	let completed_at_str: Option<String> = row.get("completed_at");

	Ok(JobRunRecord {
		id: row.get("id"),
		job_id: row.get("job_id"),
		status: status_str
			.parse::<JobStatus>()
			.map_err(|_| DbError::Internal(format!("invalid job status: {status_str}")))?,
		started_at: parse_timestamp(&started_at_str)?,
		completed_at: completed_at_str
			.map(|s| parse_timestamp(&s))
			.transpose()?,
		duration_ms: row.get("duration_ms"),
		error_message: row.get("error_message"),
		retry_count: row.get("retry_count"),
		triggered_by: triggered_by_str
			.parse::<TriggerSource>()
			.map_err(|_| DbError::Internal(format!("invalid trigger source: {triggered_by_str}")))?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing;

	async fn make_repo() -> JobRepository {
		let pool = testing::create_core_test_pool().await;
		JobRepository::new(pool)
	}

	fn make_run(id: &str, job_id: &str) -> JobRunRecord {
		JobRunRecord {
			id: id.to_string(),
			job_id: job_id.to_string(),
			status: JobStatus::Running,
			started_at: Utc::now(),
			completed_at: None,
			duration_ms: None,
			error_message: None,
			retry_count: 0,
			triggered_by: TriggerSource::Schedule,
		}
	}

	async fn seed_definition(repo: &JobRepository, id: &str) {
		repo
			.upsert_definition(&JobDefinitionRecord {
				id: id.to_string(),
				name: id.to_string(),
				description: "test job".to_string(),
				job_type: "periodic".to_string(),
				interval_secs: Some(60),
				enabled: true,
			})
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn test_run_lifecycle() {
		let repo = make_repo().await;
		seed_definition(&repo, "component-update").await;

		repo
			.record_run_start(&make_run("run-1", "component-update"))
			.await
			.unwrap();
		repo
			.record_run_complete("run-1", JobStatus::Succeeded, None)
			.await
			.unwrap();

		let last = repo.get_last_run("component-update").await.unwrap().unwrap();
		assert_eq!(last.status, JobStatus::Succeeded);
		assert!(last.completed_at.is_some());
		assert!(last.duration_ms.is_some());
	}

	#[tokio::test]
	async fn test_consecutive_failures_reset_on_success() {
		let repo = make_repo().await;
		seed_definition(&repo, "digest").await;

		for (i, status) in [
			JobStatus::Failed,
			JobStatus::Succeeded,
			JobStatus::Failed,
			JobStatus::Failed,
		]
		.iter()
		.enumerate()
		{
			let mut run = make_run(&format!("run-{i}"), "digest");
			run.started_at = Utc::now() + chrono::Duration::seconds(i as i64);
			repo.record_run_start(&run).await.unwrap();
			repo
				.record_run_complete(&format!("run-{i}"), *status, None)
				.await
				.unwrap();
		}

		let failures = repo.count_consecutive_failures("digest").await.unwrap();
		assert_eq!(failures, 2);
	}

	#[tokio::test]
	async fn test_complete_unknown_run_not_found() {
		let repo = make_repo().await;
		let result = repo
			.record_run_complete("missing", JobStatus::Failed, Some("boom".to_string()))
			.await;
		assert!(matches!(result, Err(DbError::NotFound(_))));
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use weft_db::{JobRepository, JobRunRecord, JobStatus, TriggerSource};

use crate::context::{CancelFlag, JobContext};
use crate::error::{JobError, Result};
use crate::job::Job;

/// Executes one job run under its retry policy and persists the outcome.
/// A run gets one `job_runs` row regardless of how many retry attempts it
/// takes; only the final status is recorded.
#[derive(Clone)]
pub(crate) struct Runner {
	repository: Arc<JobRepository>,
}

impl Runner {
	pub(crate) fn new(repository: Arc<JobRepository>) -> Self {
		Self { repository }
	}

	pub(crate) async fn execute(
		&self,
		job: &Arc<dyn Job>,
		trigger: TriggerSource,
		cancel: &CancelFlag,
	) -> Result<String> {
		let run_id = uuid::Uuid::new_v4().to_string();
		let policy = job.retry_policy();
		self.open_run(&run_id, job.id(), trigger).await?;

		let mut attempt = 0u32;
		loop {
			let ctx = JobContext::new(
				run_id.clone(),
				if attempt == 0 { trigger } else { TriggerSource::Retry },
				cancel.clone(),
			);

			match job.run(&ctx).await {
				Ok(output) => {
					self.close_run(&run_id, JobStatus::Succeeded, None).await?;
					info!(
						job_id = %job.id(),
						run_id = %run_id,
						message = %output.message,
						"job run succeeded"
					);
					return Ok(run_id);
				}
				Err(JobError::Cancelled) => {
					self.close_run(&run_id, JobStatus::Cancelled, None).await?;
					info!(job_id = %job.id(), run_id = %run_id, "job run cancelled");
					return Err(JobError::Cancelled);
				}
				Err(err) => {
					if err.is_retryable() && attempt < policy.max_attempts {
						attempt += 1;
						let delay = policy.delay_for(attempt);
						warn!(
							job_id = %job.id(),
							run_id = %run_id,
							attempt,
							delay_ms = delay.as_millis() as u64,
							error = %err,
							"job run failed, will retry"
						);
						tokio::time::sleep(delay).await;
						continue;
					}

					self.close_run(&run_id, JobStatus::Failed, Some(err.detail()))
						.await?;
					warn!(job_id = %job.id(), run_id = %run_id, error = %err, "job run failed");
					return Err(err);
				}
			}
		}
	}

	async fn open_run(&self, run_id: &str, job_id: &str, trigger: TriggerSource) -> Result<()> {
		self.repository
			.record_run_start(&JobRunRecord {
				id: run_id.to_string(),
				job_id: job_id.to_string(),
				status: JobStatus::Running,
				started_at: Utc::now(),
				completed_at: None,
				duration_ms: None,
				error_message: None,
				retry_count: 0,
				triggered_by: trigger,
			})
			.await?;
		Ok(())
	}

	async fn close_run(
		&self,
		run_id: &str,
		status: JobStatus,
		error_message: Option<String>,
	) -> Result<()> {
		self.repository
			.record_run_complete(run_id, status, error_message)
			.await?;
		Ok(())
	}
}

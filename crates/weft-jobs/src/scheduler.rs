// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, instrument, warn};

use weft_db::{ComponentRepository, JobDefinitionRecord, JobRepository, JobRunRecord, TriggerSource};

use crate::context::CancelFlag;
use crate::error::{JobError, Result};
use crate::job::Job;
use crate::runner::Runner;

/// When a registered job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
	/// Runs on a ticker; the first run happens one period after start.
	Every(Duration),
	/// Runs only when triggered.
	OnDemand,
}

struct JobEntry {
	job: Arc<dyn Job>,
	schedule: Schedule,
	cancel: CancelFlag,
}

/// Run history summary for one job, backed by `job_runs`.
#[derive(Debug)]
pub struct JobHealth {
	pub job_id: String,
	pub last_run: Option<JobRunRecord>,
	pub consecutive_failures: u32,
}

impl JobHealth {
	/// Three failed runs in a row with no success in between.
	pub fn is_failing(&self) -> bool {
		self.consecutive_failures >= 3
	}
}

/// Owns the registered jobs, their tickers, and their cancel flags.
/// Definitions and runs are persisted through `weft-db` so run history
/// survives restarts.
pub struct JobScheduler {
	entries: HashMap<String, JobEntry>,
	runner: Runner,
	repository: Arc<JobRepository>,
	components: ComponentRepository,
	shutdown_tx: broadcast::Sender<()>,
	tickers: Mutex<Vec<JoinHandle<()>>>,
}

impl JobScheduler {
	pub fn new(repository: Arc<JobRepository>, components: ComponentRepository) -> Self {
		let (shutdown_tx, _) = broadcast::channel(1);
		Self {
			entries: HashMap::new(),
			runner: Runner::new(Arc::clone(&repository)),
			repository,
			components,
			shutdown_tx,
			tickers: Mutex::new(Vec::new()),
		}
	}

	pub fn register(&mut self, job: Arc<dyn Job>, schedule: Schedule) {
		let id = job.id().to_string();
		self.entries.insert(
			id,
			JobEntry {
				job,
				schedule,
				cancel: CancelFlag::new(),
			},
		);
	}

	/// Upserts definitions and spawns a ticker per `Schedule::Every` job.
	#[instrument(skip(self))]
	pub async fn start(&self) -> Result<()> {
		for entry in self.entries.values() {
			self.repository.upsert_definition(&definition_for(entry)).await?;
		}

		let mut tickers = self.tickers.lock().await;
		for entry in self.entries.values() {
			if let Schedule::Every(period) = entry.schedule {
				tickers.push(self.spawn_ticker(Arc::clone(&entry.job), period, entry.cancel.clone()));
			}
		}

		info!(ticker_count = tickers.len(), "job scheduler started");
		Ok(())
	}

	fn spawn_ticker(&self, job: Arc<dyn Job>, period: Duration, cancel: CancelFlag) -> JoinHandle<()> {
		let runner = self.runner.clone();
		let mut shutdown = self.shutdown_tx.subscribe();

		tokio::spawn(async move {
			let mut ticks = interval_at(Instant::now() + period, period);
			ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				tokio::select! {
					_ = ticks.tick() => {
						if cancel.is_raised() {
							continue;
						}
						if let Err(err) = runner.execute(&job, TriggerSource::Schedule, &cancel).await {
							warn!(job_id = %job.id(), error = %err, "scheduled run failed");
						}
					}
					_ = shutdown.recv() => {
						info!(job_id = %job.id(), "stopping job ticker");
						break;
					}
				}
			}
		})
	}

	#[instrument(skip(self))]
	pub async fn trigger_job(&self, job_id: &str, triggered_by: TriggerSource) -> Result<String> {
		let entry = self
			.entries
			.get(job_id)
			.ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

		self.runner.execute(&entry.job, triggered_by, &entry.cancel).await
	}

	/// Raises the job's cancel flag and unlinks it from any component
	/// still carrying it as `background_task_id`, so the component does
	/// not appear perpetually busy.
	#[instrument(skip(self))]
	pub async fn cancel_job(&self, job_id: &str) -> Result<()> {
		let entry = self
			.entries
			.get(job_id)
			.ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

		entry.cancel.raise();

		let unlinked = self.components.clear_background_task(job_id).await?;
		if unlinked > 0 {
			info!(job_id, unlinked, "unlinked cancelled job from components");
		}

		Ok(())
	}

	#[instrument(skip(self))]
	pub async fn job_health(&self, job_id: &str) -> Result<JobHealth> {
		if !self.entries.contains_key(job_id) {
			return Err(JobError::NotFound(job_id.to_string()));
		}

		Ok(JobHealth {
			job_id: job_id.to_string(),
			last_run: self.repository.get_last_run(job_id).await?,
			consecutive_failures: self.repository.count_consecutive_failures(job_id).await?,
		})
	}

	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		let _ = self.shutdown_tx.send(());

		let mut tickers = self.tickers.lock().await;
		for ticker in tickers.drain(..) {
			let _ = ticker.await;
		}

		info!("job scheduler shut down");
	}

	pub fn job_ids(&self) -> Vec<String> {
		self.entries.keys().cloned().collect()
	}
}

fn definition_for(entry: &JobEntry) -> JobDefinitionRecord {
	JobDefinitionRecord {
		id: entry.job.id().to_string(),
		name: entry.job.name().to_string(),
		description: entry.job.description().to_string(),
		job_type: match entry.schedule {
			Schedule::Every(_) => "periodic",
			Schedule::OnDemand => "one_shot",
		}
		.to_string(),
		interval_secs: match entry.schedule {
			Schedule::Every(period) => Some(period.as_secs() as i64),
			Schedule::OnDemand => None,
		},
		enabled: true,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};

	use async_trait::async_trait;
	use chrono::Utc;

	use weft_db::{testing, JobStatus};

	use crate::context::JobContext;
	use crate::job::JobOutput;
	use crate::retry::RetryPolicy;

	struct MockJob {
		id: String,
		fail: bool,
	}

	impl MockJob {
		fn new(id: &str) -> Self {
			Self {
				id: id.to_string(),
				fail: false,
			}
		}

		fn failing(id: &str) -> Self {
			Self {
				id: id.to_string(),
				fail: true,
			}
		}
	}

	#[async_trait]
	impl Job for MockJob {
		fn id(&self) -> &str {
			&self.id
		}

		fn name(&self) -> &str {
			"Mock job"
		}

		fn description(&self) -> &str {
			"A mock job for testing"
		}

		async fn run(&self, ctx: &JobContext) -> Result<JobOutput> {
			ctx.checkpoint()?;
			if self.fail {
				return Err(JobError::failed("boom"));
			}
			Ok(JobOutput {
				message: "done".to_string(),
			})
		}
	}

	/// Fails with a retryable error until `failures_left` is exhausted.
	struct FlakyJob {
		id: String,
		failures_left: AtomicU32,
		attempts: AtomicU32,
	}

	impl FlakyJob {
		fn new(id: &str, failures: u32) -> Self {
			Self {
				id: id.to_string(),
				failures_left: AtomicU32::new(failures),
				attempts: AtomicU32::new(0),
			}
		}
	}

	#[async_trait]
	impl Job for FlakyJob {
		fn id(&self) -> &str {
			&self.id
		}

		fn name(&self) -> &str {
			"Flaky job"
		}

		fn description(&self) -> &str {
			"Fails a configured number of times, then succeeds"
		}

		fn retry_policy(&self) -> RetryPolicy {
			RetryPolicy {
				max_attempts: 2,
				base_delay: Duration::ZERO,
				max_delay: Duration::ZERO,
			}
		}

		async fn run(&self, _ctx: &JobContext) -> Result<JobOutput> {
			self.attempts.fetch_add(1, Ordering::SeqCst);
			if self.failures_left.load(Ordering::SeqCst) > 0 {
				self.failures_left.fetch_sub(1, Ordering::SeqCst);
				return Err(JobError::retryable("transient"));
			}
			Ok(JobOutput {
				message: "recovered".to_string(),
			})
		}
	}

	async fn make_scheduler() -> (JobScheduler, sqlx::SqlitePool) {
		let pool = testing::create_core_test_pool().await;
		let scheduler = JobScheduler::new(
			Arc::new(JobRepository::new(pool.clone())),
			ComponentRepository::new(pool.clone()),
		);
		(scheduler, pool)
	}

	#[tokio::test]
	async fn test_register_and_list_jobs() {
		let (mut scheduler, _pool) = make_scheduler().await;
		scheduler.register(
			Arc::new(MockJob::new("component-update")),
			Schedule::Every(Duration::from_secs(60)),
		);
		scheduler.register(Arc::new(MockJob::new("daily-digest")), Schedule::OnDemand);

		let mut ids = scheduler.job_ids();
		ids.sort();
		assert_eq!(ids, vec!["component-update", "daily-digest"]);
	}

	#[tokio::test]
	async fn test_trigger_records_successful_run() {
		let (mut scheduler, pool) = make_scheduler().await;
		scheduler.register(Arc::new(MockJob::new("commit-pending")), Schedule::OnDemand);
		scheduler.start().await.unwrap();

		let run_id = scheduler
			.trigger_job("commit-pending", TriggerSource::Manual)
			.await
			.unwrap();

		let repository = JobRepository::new(pool);
		let last = repository.get_last_run("commit-pending").await.unwrap().unwrap();
		assert_eq!(last.id, run_id);
		assert_eq!(last.status, JobStatus::Succeeded);
		assert_eq!(last.triggered_by, TriggerSource::Manual);
	}

	#[tokio::test]
	async fn test_trigger_records_failed_run() {
		let (mut scheduler, pool) = make_scheduler().await;
		scheduler.register(Arc::new(MockJob::failing("flaky")), Schedule::OnDemand);
		scheduler.start().await.unwrap();

		let result = scheduler.trigger_job("flaky", TriggerSource::Manual).await;
		assert!(matches!(result, Err(JobError::Failed { .. })));

		let repository = JobRepository::new(pool);
		let last = repository.get_last_run("flaky").await.unwrap().unwrap();
		assert_eq!(last.status, JobStatus::Failed);
		assert_eq!(last.error_message.as_deref(), Some("boom"));
	}

	#[tokio::test]
	async fn test_retryable_failure_recovers_within_policy() {
		let (mut scheduler, pool) = make_scheduler().await;
		let job = Arc::new(FlakyJob::new("update-remote", 1));
		scheduler.register(Arc::clone(&job) as Arc<dyn Job>, Schedule::OnDemand);
		scheduler.start().await.unwrap();

		scheduler
			.trigger_job("update-remote", TriggerSource::Manual)
			.await
			.unwrap();

		assert_eq!(job.attempts.load(Ordering::SeqCst), 2);
		let repository = JobRepository::new(pool);
		let last = repository.get_last_run("update-remote").await.unwrap().unwrap();
		assert_eq!(last.status, JobStatus::Succeeded);
	}

	#[tokio::test]
	async fn test_retries_exhausted_records_failure() {
		let (mut scheduler, pool) = make_scheduler().await;
		// More failures than the policy's two retries allow.
		let job = Arc::new(FlakyJob::new("update-remote", 5));
		scheduler.register(Arc::clone(&job) as Arc<dyn Job>, Schedule::OnDemand);
		scheduler.start().await.unwrap();

		let result = scheduler
			.trigger_job("update-remote", TriggerSource::Manual)
			.await;
		assert!(matches!(result, Err(JobError::Failed { .. })));
		assert_eq!(job.attempts.load(Ordering::SeqCst), 3);

		let repository = JobRepository::new(pool);
		let last = repository.get_last_run("update-remote").await.unwrap().unwrap();
		assert_eq!(last.status, JobStatus::Failed);
		assert_eq!(last.error_message.as_deref(), Some("transient"));
	}

	#[tokio::test]
	async fn test_trigger_unknown_job_is_not_found() {
		let (scheduler, _pool) = make_scheduler().await;
		let result = scheduler.trigger_job("missing", TriggerSource::Manual).await;
		assert!(matches!(result, Err(JobError::NotFound(_))));
	}

	#[tokio::test]
	async fn test_cancel_clears_component_background_task() {
		let (mut scheduler, pool) = make_scheduler().await;
		scheduler.register(Arc::new(MockJob::new("component-update")), Schedule::OnDemand);
		scheduler.start().await.unwrap();

		let (_, component_id, _) = testing::seed_translation_for_language(&pool, "cs", 3).await;
		let components = ComponentRepository::new(pool);
		components
			.set_background_task(component_id, Some("component-update"))
			.await
			.unwrap();

		scheduler.cancel_job("component-update").await.unwrap();

		let component = components
			.get_component_by_id(component_id)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(component.background_task_id, None);

		// A cancelled job refuses to run and records the cancellation.
		let result = scheduler
			.trigger_job("component-update", TriggerSource::Manual)
			.await;
		assert!(matches!(result, Err(JobError::Cancelled)));
	}

	#[tokio::test]
	async fn test_job_health_reports_failure_streak() {
		let (mut scheduler, pool) = make_scheduler().await;
		scheduler.register(Arc::new(MockJob::failing("flaky")), Schedule::OnDemand);
		scheduler.start().await.unwrap();

		let repository = JobRepository::new(pool);
		for i in 0..3 {
			let run_id = format!("run-{i}");
			repository
				.record_run_start(&JobRunRecord {
					id: run_id.clone(),
					job_id: "flaky".to_string(),
					status: JobStatus::Running,
					started_at: Utc::now() + chrono::Duration::seconds(i as i64),
					completed_at: None,
					duration_ms: None,
					error_message: None,
					retry_count: 0,
					triggered_by: TriggerSource::Schedule,
				})
				.await
				.unwrap();
			repository
				.record_run_complete(&run_id, JobStatus::Failed, Some("boom".to_string()))
				.await
				.unwrap();
		}

		let health = scheduler.job_health("flaky").await.unwrap();
		assert_eq!(health.consecutive_failures, 3);
		assert!(health.is_failing());
		assert_eq!(health.last_run.unwrap().status, JobStatus::Failed);
	}

	#[tokio::test]
	async fn test_job_health_unknown_job_is_not_found() {
		let (scheduler, _pool) = make_scheduler().await;
		let result = scheduler.job_health("missing").await;
		assert!(matches!(result, Err(JobError::NotFound(_))));
	}
}

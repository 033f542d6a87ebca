// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::context::JobContext;
use crate::error::Result;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct JobOutput {
	pub message: String,
}

/// A schedulable unit of background work. Implementations wrap the sync
/// engine (component update, commit pending) or the notification engine
/// (digests).
#[async_trait]
pub trait Job: Send + Sync {
	/// Stable identifier, also used as the persisted definition id.
	fn id(&self) -> &str;

	fn name(&self) -> &str;

	fn description(&self) -> &str;

	/// How retryable failures are handled for this job. Digest dispatch
	/// overrides this to [`RetryPolicy::none`] so a partial send is not
	/// repeated.
	fn retry_policy(&self) -> RetryPolicy {
		RetryPolicy::standard()
	}

	async fn run(&self, ctx: &JobContext) -> Result<JobOutput>;
}

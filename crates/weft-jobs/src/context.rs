// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use weft_db::TriggerSource;

use crate::error::{JobError, Result};

/// Shared cancel flag for one registered job. Raising it stops future
/// scheduled runs and makes in-flight runs fail at their next
/// [`JobContext::checkpoint`]; a VCS command already in flight runs to
/// completion regardless.
#[derive(Clone, Default)]
pub struct CancelFlag {
	raised: Arc<AtomicBool>,
}

impl CancelFlag {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn raise(&self) {
		self.raised.store(true, Ordering::SeqCst);
	}

	pub fn is_raised(&self) -> bool {
		self.raised.load(Ordering::SeqCst)
	}
}

/// Passed to every job run. Long-running jobs are expected to call
/// [`checkpoint`](Self::checkpoint) between units of work (per component,
/// per digest batch) so cancellation takes effect promptly.
pub struct JobContext {
	pub run_id: String,
	pub triggered_by: TriggerSource,
	cancel: CancelFlag,
}

impl JobContext {
	pub fn new(run_id: String, triggered_by: TriggerSource, cancel: CancelFlag) -> Self {
		Self {
			run_id,
			triggered_by,
			cancel,
		}
	}

	/// Fails with [`JobError::Cancelled`] once the job's flag is raised.
	pub fn checkpoint(&self) -> Result<()> {
		if self.cancel.is_raised() {
			return Err(JobError::Cancelled);
		}
		Ok(())
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_raised()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_raise_is_visible_through_clones() {
		let flag = CancelFlag::new();
		let clone = flag.clone();
		assert!(!clone.is_raised());

		flag.raise();
		assert!(clone.is_raised());
	}

	#[test]
	fn test_checkpoint_fails_after_raise() {
		let flag = CancelFlag::new();
		let ctx = JobContext::new("run-1".to_string(), TriggerSource::Manual, flag.clone());

		assert!(ctx.checkpoint().is_ok());
		flag.raise();
		assert!(matches!(ctx.checkpoint(), Err(JobError::Cancelled)));
		assert!(ctx.is_cancelled());
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use weft_db::DbError;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
	#[error("job not found: {0}")]
	NotFound(String),

	#[error("job cancelled")]
	Cancelled,

	/// Job body failure. `retryable` drives the backoff loop; conflicts
	/// and data errors should not be retried blindly.
	#[error("job failed: {message}")]
	Failed { message: String, retryable: bool },

	#[error("database error: {0}")]
	Db(#[from] DbError),
}

impl JobError {
	pub fn failed(message: impl Into<String>) -> Self {
		JobError::Failed {
			message: message.into(),
			retryable: false,
		}
	}

	pub fn retryable(message: impl Into<String>) -> Self {
		JobError::Failed {
			message: message.into(),
			retryable: true,
		}
	}

	pub fn is_retryable(&self) -> bool {
		matches!(self, JobError::Failed { retryable: true, .. })
	}

	/// Message persisted with a failed run.
	pub fn detail(&self) -> String {
		match self {
			JobError::Failed { message, .. } => message.clone(),
			other => other.to_string(),
		}
	}
}

pub type Result<T> = std::result::Result<T, JobError>;

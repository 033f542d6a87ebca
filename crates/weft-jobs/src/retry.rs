// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

/// Per-job retry behavior for retryable failures. Delays double per
/// attempt, capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
}

impl RetryPolicy {
	/// Three retries, 1s base, 60s cap. Suits transient VCS network
	/// failures and SMTP hiccups.
	pub const fn standard() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::from_secs(1),
			max_delay: Duration::from_secs(60),
		}
	}

	/// No retries; the first failure is final.
	pub const fn none() -> Self {
		Self {
			max_attempts: 0,
			base_delay: Duration::ZERO,
			max_delay: Duration::ZERO,
		}
	}

	/// Delay before retry `attempt` (1-based).
	pub fn delay_for(&self, attempt: u32) -> Duration {
		let mut delay = self.base_delay;
		for _ in 1..attempt {
			delay = std::cmp::min(delay * 2, self.max_delay);
		}
		std::cmp::min(delay, self.max_delay)
	}
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self::standard()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_delay_doubles_per_attempt() {
		let policy = RetryPolicy::standard();
		assert_eq!(policy.delay_for(1), Duration::from_secs(1));
		assert_eq!(policy.delay_for(2), Duration::from_secs(2));
		assert_eq!(policy.delay_for(3), Duration::from_secs(4));
	}

	#[test]
	fn test_delay_caps_at_max() {
		let policy = RetryPolicy::standard();
		assert_eq!(policy.delay_for(10), Duration::from_secs(60));
		assert_eq!(policy.delay_for(100), Duration::from_secs(60));
	}

	#[test]
	fn test_none_never_retries() {
		let policy = RetryPolicy::none();
		assert_eq!(policy.max_attempts, 0);
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::timeout;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::{LockError, Result};

/// Identifies one logical operation for re-entrancy. A sync pass that
/// needs both the repo lock and the component-update lock runs under a
/// single operation id and may re-acquire locks it already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId(Uuid);

impl OperationId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for OperationId {
	fn default() -> Self {
		Self::new()
	}
}

/// What a lock protects. The origin string passed to
/// [`LockManager::acquire`] names the specific object (component slug,
/// translation filename) within the scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockScope {
	/// One working copy, one writer at a time. VCS mutations are never
	/// safe to interleave.
	Repo,
	/// Spans parse + reconcile + commit for one component, so a background
	/// update and a user-triggered push cannot interleave.
	ComponentUpdate,
	/// One translation's unit rows.
	Translation,
}

impl std::fmt::Display for LockScope {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			LockScope::Repo => f.write_str("repo"),
			LockScope::ComponentUpdate => f.write_str("component-update"),
			LockScope::Translation => f.write_str("translation"),
		}
	}
}

#[derive(Debug)]
struct Holder {
	operation: OperationId,
	depth: usize,
}

#[derive(Debug)]
struct LockEntry {
	state: Mutex<Option<Holder>>,
	released: Notify,
}

/// Named, scoped, re-entrant async locks with a bounded acquisition wait.
pub struct LockManager {
	entries: Mutex<HashMap<(LockScope, String), Arc<LockEntry>>>,
	acquire_timeout: Duration,
}

impl LockManager {
	pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

	pub fn new(acquire_timeout: Duration) -> Self {
		Self { entries: Mutex::new(HashMap::new()), acquire_timeout }
	}

	fn entry(&self, scope: LockScope, origin: &str) -> Arc<LockEntry> {
		let mut entries = self.entries.lock().unwrap();
		entries
			.entry((scope, origin.to_string()))
			.or_insert_with(|| {
				Arc::new(LockEntry { state: Mutex::new(None), released: Notify::new() })
			})
			.clone()
	}

	/// Acquires the `(scope, origin)` lock for `operation`, waiting up to
	/// the configured timeout. Re-entrant for the same operation id,
	/// exclusive across unrelated callers.
	pub async fn acquire(
		&self,
		scope: LockScope,
		origin: &str,
		operation: OperationId,
	) -> Result<LockGuard> {
		let entry = self.entry(scope, origin);
		let deadline = tokio::time::Instant::now() + self.acquire_timeout;

		loop {
			let notified = entry.released.notified();
			tokio::pin!(notified);

			{
				let mut state = entry.state.lock().unwrap();
				match &mut *state {
					None => {
						*state = Some(Holder { operation, depth: 1 });
						trace!(scope = %scope, origin = %origin, "lock acquired");
						return Ok(LockGuard {
							entry: entry.clone(),
							scope,
							origin: origin.to_string(),
						});
					}
					Some(holder) if holder.operation == operation => {
						holder.depth += 1;
						trace!(scope = %scope, origin = %origin, depth = holder.depth, "lock re-entered");
						return Ok(LockGuard {
							entry: entry.clone(),
							scope,
							origin: origin.to_string(),
						});
					}
					// Register for the release notification while still
					// holding the state mutex, so a release between this
					// check and the await cannot be missed.
					Some(_) => {
						notified.as_mut().enable();
					}
				}
			}

			let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
			if remaining.is_zero() || timeout(remaining, notified).await.is_err() {
				warn!(scope = %scope, origin = %origin, "lock wait timed out");
				return Err(LockError::Timeout {
					scope: scope.to_string(),
					origin: origin.to_string(),
				});
			}
		}
	}

	/// True when the `(scope, origin)` lock is currently held.
	pub fn is_locked(&self, scope: LockScope, origin: &str) -> bool {
		let entries = self.entries.lock().unwrap();
		entries
			.get(&(scope, origin.to_string()))
			.map(|entry| entry.state.lock().unwrap().is_some())
			.unwrap_or(false)
	}
}

impl Default for LockManager {
	fn default() -> Self {
		Self::new(Self::DEFAULT_TIMEOUT)
	}
}

/// Releases one level of the lock on drop.
#[derive(Debug)]
pub struct LockGuard {
	entry: Arc<LockEntry>,
	scope: LockScope,
	origin: String,
}

impl Drop for LockGuard {
	fn drop(&mut self) {
		let mut state = self.entry.state.lock().unwrap();
		if let Some(holder) = &mut *state {
			holder.depth -= 1;
			if holder.depth == 0 {
				*state = None;
				debug!(scope = %self.scope, origin = %self.origin, "lock released");
				self.entry.released.notify_waiters();
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_acquire_and_release() {
		let manager = LockManager::default();

		let guard = manager
			.acquire(LockScope::Repo, "horizon/website", OperationId::new())
			.await
			.unwrap();
		assert!(manager.is_locked(LockScope::Repo, "horizon/website"));

		drop(guard);
		assert!(!manager.is_locked(LockScope::Repo, "horizon/website"));
	}

	#[tokio::test]
	async fn test_different_origins_do_not_contend() {
		let manager = LockManager::new(Duration::from_millis(50));

		let _a = manager
			.acquire(LockScope::Repo, "proj/a", OperationId::new())
			.await
			.unwrap();
		let _b = manager
			.acquire(LockScope::Repo, "proj/b", OperationId::new())
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn test_scopes_are_independent() {
		let manager = LockManager::new(Duration::from_millis(50));

		let _repo = manager
			.acquire(LockScope::Repo, "proj/a", OperationId::new())
			.await
			.unwrap();
		let _update = manager
			.acquire(LockScope::ComponentUpdate, "proj/a", OperationId::new())
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn test_reentrant_within_operation() {
		let manager = LockManager::new(Duration::from_millis(50));
		let op = OperationId::new();

		let outer = manager.acquire(LockScope::Repo, "proj/a", op).await.unwrap();
		let inner = manager.acquire(LockScope::Repo, "proj/a", op).await.unwrap();

		drop(inner);
		// Still held until the outer guard goes
		assert!(manager.is_locked(LockScope::Repo, "proj/a"));
		drop(outer);
		assert!(!manager.is_locked(LockScope::Repo, "proj/a"));
	}

	#[tokio::test]
	async fn test_timeout_names_scope_and_origin() {
		let manager = LockManager::new(Duration::from_millis(20));

		let _held = manager
			.acquire(LockScope::Repo, "horizon/website", OperationId::new())
			.await
			.unwrap();

		let err = manager
			.acquire(LockScope::Repo, "horizon/website", OperationId::new())
			.await
			.unwrap_err();

		assert_eq!(
			err,
			LockError::Timeout {
				scope: "repo".to_string(),
				origin: "horizon/website".to_string(),
			}
		);
		assert_eq!(
			err.to_string(),
			"timed out waiting for repo lock on horizon/website"
		);
	}

	#[tokio::test]
	async fn test_waiter_gets_lock_after_release() {
		let manager = Arc::new(LockManager::new(Duration::from_secs(5)));

		let guard = manager
			.acquire(LockScope::Repo, "proj/a", OperationId::new())
			.await
			.unwrap();

		let waiter = {
			let manager = manager.clone();
			tokio::spawn(async move {
				manager.acquire(LockScope::Repo, "proj/a", OperationId::new()).await
			})
		};

		tokio::time::sleep(Duration::from_millis(20)).await;
		drop(guard);

		let acquired = waiter.await.unwrap();
		assert!(acquired.is_ok());
		assert!(manager.is_locked(LockScope::Repo, "proj/a"));
	}
}

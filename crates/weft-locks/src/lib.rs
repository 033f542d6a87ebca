// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-process locks guarding repository and translation state.
//!
//! Every write path that touches a component's working tree or its unit
//! rows acquires the component's lock first. Locks are scoped, named by
//! origin so contention errors say who is holding what, and re-entrant
//! within a single logical operation.

pub mod error;
pub mod manager;

pub use error::{LockError, Result};
pub use manager::{LockGuard, LockManager, LockScope, OperationId};

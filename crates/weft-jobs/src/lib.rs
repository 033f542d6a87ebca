// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background job scheduler for Weft.
//!
//! Runs the periodic work the translation core needs (component updates,
//! digest notifications, pending-edit commits) plus on-demand tasks. Each
//! job carries a cancel flag it is expected to poll at checkpoints, a
//! per-job retry policy for transient failures, and run history persisted
//! through `weft-db`. Cancelling a job also unlinks it from any component
//! still pointing at it as a background task.

pub mod context;
pub mod error;
pub mod job;
pub mod retry;
pub mod scheduler;

mod runner;

pub use context::{CancelFlag, JobContext};
pub use error::{JobError, Result};
pub use job::{Job, JobOutput};
pub use retry::RetryPolicy;
pub use scheduler::{JobHealth, JobScheduler, Schedule};

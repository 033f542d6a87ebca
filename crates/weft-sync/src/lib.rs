// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Repository synchronization engine.
//!
//! Keeps the unit tables consistent with each component's VCS working
//! copy, in both directions: `pull_and_parse` brings remote file changes
//! into the database, `commit_pending` writes translator edits back into
//! files and commits them. All working-copy access runs under the repo
//! lock; reconciliation of one translation is a single transaction, so a
//! crash never leaves a half-synced unit set behind a new revision.

pub mod engine;
pub mod error;
pub mod filemask;
pub mod lang;
pub mod types;

pub use engine::SyncEngine;
pub use error::{Result, SyncError};
pub use filemask::Filemask;
pub use types::{CommitOutcome, ConflictPolicy, SyncReport, UploadOutcome};

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Version control wrapper for Weft component repositories.
//!
//! Every repository mutation goes through [`GitRepository`], which shells
//! out to the git CLI. Callers are expected to hold the component's
//! repository lock for the whole operation; this crate does no locking of
//! its own.

pub mod error;
pub mod git;
pub mod types;

pub use error::{Result, VcsError};
pub use git::GitRepository;
pub use types::{CommitSignature, MergeStyle, RepositoryStatus, UpdateOutcome};

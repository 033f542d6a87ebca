// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Unit domain layer.
//!
//! Sits on top of `weft-db` and owns the translation-state rules: the unit
//! state machine, stable content hashing, optimistic concurrency on edits,
//! cross-component merging, bulk edits, and the small search query
//! language. Raw row access stays in `weft-db`; everything that can reject
//! an edit lives here.

pub mod error;
pub mod hash;
pub mod perm;
pub mod query;
pub mod service;
pub mod state;

pub use error::{Result, UnitError};
pub use hash::{calculate_content_hash, calculate_id_hash, calculate_target_hash};
pub use perm::{AllowAll, DenyAll, PermissionCheck};
pub use query::{parse_query, Predicate};
pub use service::{BulkEditOutcome, EditPrecondition, FindOrCreateOutcome, UnitService};
pub use state::UnitState;

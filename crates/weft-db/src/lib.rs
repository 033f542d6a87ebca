// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Database layer for Weft.
//!
//! This crate owns the SQLite schema and the record-level stores for the
//! translation core: projects, components, translations, units, the
//! append-only change log, users, notification subscriptions, and
//! background job runs. Records are plain data structs; domain rules live
//! in the crates layered on top.

pub mod change;
pub mod component;
pub mod error;
pub mod job;
pub mod pool;
pub mod subscription;
pub mod testing;
pub mod unit;
pub mod user;

pub use change::{ChangeAction, ChangeFilter, ChangeRecord, ChangeRepository, NewChange};
pub use component::{
	ComponentRecord, ComponentRepository, ProjectRecord, TranslationRecord,
};
pub use error::{DbError, Result};
pub use job::{JobDefinitionRecord, JobRepository, JobRunRecord, JobStatus, TriggerSource};
pub use pool::create_pool;
pub use subscription::{SubscriptionRecord, SubscriptionRepository};
pub use unit::{UnitRecord, UnitRepository};
pub use user::{UserRecord, UserRepository};

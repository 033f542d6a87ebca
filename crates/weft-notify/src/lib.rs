// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Notification engine for Weft.
//!
//! Consumes the append-only change log and decides who hears about what:
//! subscriptions are scoped (all, watched, admin, project, component) and
//! the most specific scope per user and kind wins; more specific
//! notification kinds can suppress generic ones via skip rules; instant
//! sends are rate limited per address; daily/weekly/monthly subscribers
//! get digests built by re-querying the change log in insertion order.
//!
//! The kind table is a closed registry built once at startup, and the
//! skip-rule graph is checked for cycles at construction.

pub mod engine;
pub mod error;
pub mod rate;
pub mod registry;
pub mod types;

pub use engine::{Digest, DispatchSummary, NotificationEngine, Recipient, DIGEST_MAX_ENTRIES};
pub use error::{NotifyError, Result};
pub use rate::{RateLimiter, DEFAULT_DAILY_CAP};
pub use registry::{KindSpec, NotificationKind, NotificationRegistry};
pub use types::{Frequency, Scope};

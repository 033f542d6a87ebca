// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary
#![recursion_limit = "256"]

//! Project backup and restore for Weft.
//!
//! A backup is a zip archive: `weft-backup.json` holds the project
//! manifest and label set, `components/<slug>.json` holds one component
//! with its translations and units, and `vcs/<slug>/` carries the raw
//! working-copy files. On restore every JSON document is validated
//! against its schema before a single row is written, an unsupported
//! file-format identifier aborts the whole restore up front, and
//! original ids are remapped to fresh ones through an in-memory table.

pub mod doc;
pub mod error;
pub mod schema;
pub mod service;

pub use doc::{ComponentDoc, ManifestDoc, TranslationDoc, UnitDoc, BACKUP_VERSION, MANIFEST_NAME};
pub use error::{BackupError, Result};
pub use service::{BackupService, RestoreSummary};

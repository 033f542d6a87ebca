// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
	#[error("component not found: {0}")]
	ComponentNotFound(Uuid),

	#[error("translation not found: {0}")]
	TranslationNotFound(Uuid),

	#[error("component {0} is locked for maintenance")]
	ComponentLocked(String),

	#[error("invalid filemask: {0}")]
	InvalidFilemask(String),

	#[error("component misconfigured: {0}")]
	Config(String),

	#[error("db error: {0}")]
	Db(#[from] weft_db::DbError),

	#[error("vcs error: {0}")]
	Vcs(#[from] weft_vcs::VcsError),

	#[error("format error: {0}")]
	Format(#[from] weft_formats::FormatError),

	#[error("lock error: {0}")]
	Lock(#[from] weft_locks::LockError),

	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use weft_db::DbError;

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
	/// A document failed schema validation. Nothing has been written.
	#[error("schema validation failed: {0}")]
	Schema(String),

	/// The archive references a file format this build cannot parse.
	/// Fatal before any write.
	#[error("unsupported file format: {0}")]
	UnsupportedFormat(String),

	#[error("unsupported backup version: {0}")]
	UnsupportedVersion(i64),

	#[error("archive error: {0}")]
	Archive(String),

	#[error("missing archive entry: {0}")]
	MissingEntry(String),

	#[error("project already exists: {0}")]
	AlreadyExists(String),

	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("database error: {0}")]
	Db(#[from] DbError),
}

impl From<zip::result::ZipError> for BackupError {
	fn from(e: zip::result::ZipError) -> Self {
		BackupError::Archive(e.to_string())
	}
}

pub type Result<T> = std::result::Result<T, BackupError>;

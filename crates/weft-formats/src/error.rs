// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FormatError>;

#[derive(Error, Debug)]
pub enum FormatError {
	#[error("parse error at line {line}: {message}")]
	Parse { line: usize, message: String },

	#[error("serialize error: {0}")]
	Serialize(String),

	#[error("unsupported file format: {0}")]
	UnsupportedFormat(String),

	#[error("invalid utf-8: {0}")]
	Utf8(#[from] std::str::Utf8Error),
}

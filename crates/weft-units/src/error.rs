// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, UnitError>;

#[derive(Error, Debug)]
pub enum UnitError {
	#[error("unit not found: {0}")]
	NotFound(Uuid),

	#[error("translation not found: {0}")]
	TranslationNotFound(Uuid),

	#[error("unit {unit_id} was edited by someone else since you loaded it")]
	ConcurrentEdit { unit_id: Uuid },

	#[error("expected {expected} plural forms for this language, got {got}")]
	PluralMismatch { expected: usize, got: usize },

	#[error("unit is read-only and cannot be translated")]
	ReadOnly,

	#[error("invalid state transition: {0}")]
	InvalidState(String),

	#[error("approving a translation requires review permission")]
	ReviewPermissionRequired,

	#[error("source text differs, refusing to merge")]
	SourceMismatch,

	#[error("invalid search query: {0}")]
	Query(String),

	#[error("db error: {0}")]
	Db(#[from] weft_db::DbError),
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use weft_db::DbError;
use weft_mail::MailError;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
	/// The registry's skip-rule graph contains a cycle; mutual
	/// suppression would never terminate.
	#[error("skip rule cycle: {0}")]
	SkipCycle(String),

	#[error("unknown notification kind: {0}")]
	UnknownKind(String),

	#[error("mail error: {0}")]
	Mail(#[from] MailError),

	#[error("database error: {0}")]
	Db(#[from] DbError),
}

pub type Result<T> = std::result::Result<T, NotifyError>;

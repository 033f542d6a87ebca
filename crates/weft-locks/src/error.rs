// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LockError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
	/// The lock stayed held past the acquisition timeout. Names the scope
	/// and the origin so an operator can find the blocking operation.
	#[error("timed out waiting for {scope} lock on {origin}")]
	Timeout { scope: String, origin: String },
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Translation file format adapters for Weft.
//!
//! A format turns file bytes into an ordered sequence of [`StringRecord`]s
//! and back. The sync engine treats formats as black boxes behind the
//! [`FileFormat`] trait; the registry is built explicitly at startup rather
//! than through import-time side effects.

pub mod error;
pub mod json;
pub mod po;
pub mod registry;
pub mod types;

pub use error::{FormatError, Result};
pub use json::JsonFormat;
pub use po::PoFormat;
pub use registry::FormatRegistry;
pub use types::StringRecord;

/// A translation file format adapter.
///
/// `serialize` receives the existing file bytes so untouched records keep
/// their ordering; formatting may be normalized, but re-parsing the output
/// must yield the identical record sequence.
pub trait FileFormat: std::fmt::Debug + Send + Sync {
	fn identifier(&self) -> &'static str;
	fn mime_type(&self) -> &'static str;
	fn extension(&self) -> &'static str;
	fn parse(&self, bytes: &[u8]) -> Result<Vec<StringRecord>>;
	fn serialize(&self, existing: &[u8], records: &[StringRecord]) -> Result<Vec<u8>>;
}

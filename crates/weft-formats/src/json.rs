// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flat JSON format: a single object mapping string keys to string values.
//!
//! The key doubles as the source text (`context` stays empty). Output is
//! pretty-printed with keys in lexicographic order, so serialization is
//! canonical regardless of the input file's key order.

use std::collections::BTreeMap;

use crate::error::{FormatError, Result};
use crate::types::StringRecord;
use crate::FileFormat;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl JsonFormat {
	pub fn new() -> Self {
		Self
	}
}

impl FileFormat for JsonFormat {
	fn identifier(&self) -> &'static str {
		"json"
	}

	fn mime_type(&self) -> &'static str {
		"application/json"
	}

	fn extension(&self) -> &'static str {
		"json"
	}

	fn parse(&self, bytes: &[u8]) -> Result<Vec<StringRecord>> {
		if bytes.iter().all(|b| b.is_ascii_whitespace()) {
			return Ok(Vec::new());
		}

		let map: BTreeMap<String, serde_json::Value> =
			serde_json::from_slice(bytes).map_err(|e| FormatError::Parse {
				line: e.line(),
				message: e.to_string(),
			})?;

		let mut records = Vec::with_capacity(map.len());
		for (key, value) in map {
			let target = match value {
				serde_json::Value::String(s) => s,
				other => {
					return Err(FormatError::Parse {
						line: 0,
						message: format!("value for key {key:?} is not a string: {other}"),
					})
				}
			};
			let mut record = StringRecord::new("", key);
			record.target = vec![target];
			records.push(record);
		}

		Ok(records)
	}

	fn serialize(&self, existing: &[u8], records: &[StringRecord]) -> Result<Vec<u8>> {
		let mut map: BTreeMap<String, String> = self
			.parse(existing)?
			.into_iter()
			.map(|r| {
				let target = r.target.into_iter().next().unwrap_or_default();
				(r.source.into_iter().next().unwrap_or_default(), target)
			})
			.collect();

		for record in records {
			if record.is_plural {
				return Err(FormatError::Serialize(
					"flat JSON does not support plural forms".to_string(),
				));
			}
			let key = record.source.first().cloned().unwrap_or_default();
			let target = record.target.first().cloned().unwrap_or_default();
			map.insert(key, target);
		}

		let mut out = serde_json::to_vec_pretty(&map)
			.map_err(|e| FormatError::Serialize(e.to_string()))?;
		out.push(b'\n');
		Ok(out)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_sorts_keys() {
		let input = br#"{"zebra": "z", "apple": "a"}"#;
		let records = JsonFormat.parse(input).unwrap();
		assert_eq!(records.len(), 2);
		assert_eq!(records[0].source, vec!["apple"]);
		assert_eq!(records[1].source, vec!["zebra"]);
	}

	#[test]
	fn test_parse_rejects_non_string_value() {
		let err = JsonFormat.parse(br#"{"count": 3}"#).unwrap_err();
		assert!(matches!(err, FormatError::Parse { .. }));
	}

	#[test]
	fn test_parse_empty_file() {
		assert!(JsonFormat.parse(b"").unwrap().is_empty());
		assert!(JsonFormat.parse(b"  \n").unwrap().is_empty());
	}

	#[test]
	fn test_serialize_merges_edits() {
		let existing = br#"{"hello": "ahoj", "bye": "sbohem"}"#;
		let mut edited = StringRecord::new("", "hello");
		edited.target = vec!["nazdar".to_string()];

		let out = JsonFormat.serialize(existing, &[edited]).unwrap();
		let reparsed = JsonFormat.parse(&out).unwrap();
		assert_eq!(reparsed.len(), 2);
		assert_eq!(reparsed[1].target, vec!["nazdar"]);
		assert_eq!(reparsed[0].target, vec!["sbohem"]);
	}

	#[test]
	fn test_serialize_rejects_plurals() {
		let mut record = StringRecord::new("", "file");
		record.is_plural = true;
		record.source.push("files".to_string());
		let err = JsonFormat.serialize(b"{}", &[record]).unwrap_err();
		assert!(matches!(err, FormatError::Serialize(_)));
	}

	#[test]
	fn test_roundtrip_is_stable() {
		let input = br#"{"b": "2", "a": "1", "c": "3"}"#;
		let records = JsonFormat.parse(input).unwrap();
		let serialized = JsonFormat.serialize(input, &[]).unwrap();
		let reparsed = JsonFormat.parse(&serialized).unwrap();
		assert_eq!(records, reparsed);

		// Second pass is byte-identical: output order is canonical
		let again = JsonFormat.serialize(&serialized, &[]).unwrap();
		assert_eq!(serialized, again);
	}
}

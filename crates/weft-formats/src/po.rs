// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Gettext PO format.
//!
//! Supports msgctxt, plural forms, flag comments, and multiline strings.
//! Serialization normalizes formatting (one logical line per string) but
//! keeps record ordering from the existing file, so an unedited file
//! re-parses to the identical record sequence.

use std::collections::HashMap;

use crate::error::{FormatError, Result};
use crate::types::StringRecord;
use crate::FileFormat;

const DEFAULT_HEADER: &str = "Content-Type: text/plain; charset=UTF-8\n";

#[derive(Debug, Clone, Copy, Default)]
pub struct PoFormat;

impl PoFormat {
	pub fn new() -> Self {
		Self
	}
}

impl FileFormat for PoFormat {
	fn identifier(&self) -> &'static str {
		"po"
	}

	fn mime_type(&self) -> &'static str {
		"text/x-gettext-translation"
	}

	fn extension(&self) -> &'static str {
		"po"
	}

	fn parse(&self, bytes: &[u8]) -> Result<Vec<StringRecord>> {
		let text = std::str::from_utf8(bytes)?;
		let (_, records) = parse_po(text)?;
		Ok(records)
	}

	fn serialize(&self, existing: &[u8], records: &[StringRecord]) -> Result<Vec<u8>> {
		let text = std::str::from_utf8(existing)?;
		let (header, existing_records) = if text.trim().is_empty() {
			(None, Vec::new())
		} else {
			parse_po(text)?
		};

		let edited: HashMap<(String, Vec<String>), &StringRecord> =
			records.iter().map(|r| (r.key(), r)).collect();

		let mut out = String::new();
		emit_header(&mut out, header.as_deref().unwrap_or(DEFAULT_HEADER));

		let mut seen: Vec<(String, Vec<String>)> = Vec::new();
		for record in &existing_records {
			let key = record.key();
			let current = edited.get(&key).copied().unwrap_or(record);
			emit_record(&mut out, current);
			seen.push(key);
		}

		// New records not present in the existing file go at the end, in
		// caller order.
		for record in records {
			if !seen.contains(&record.key()) {
				emit_record(&mut out, record);
			}
		}

		Ok(out.into_bytes())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
	None,
	Msgctxt,
	Msgid,
	MsgidPlural,
	Msgstr(usize),
}

#[derive(Default)]
struct EntryBuilder {
	context: String,
	msgid: Option<String>,
	msgid_plural: Option<String>,
	msgstrs: Vec<String>,
	flags: Vec<String>,
}

impl EntryBuilder {
	fn is_empty(&self) -> bool {
		self.msgid.is_none() && self.msgid_plural.is_none() && self.msgstrs.is_empty()
	}

	fn append(&mut self, section: Section, value: &str, line: usize) -> Result<()> {
		match section {
			Section::Msgctxt => self.context.push_str(value),
			Section::Msgid => match &mut self.msgid {
				Some(s) => s.push_str(value),
				None => self.msgid = Some(value.to_string()),
			},
			Section::MsgidPlural => match &mut self.msgid_plural {
				Some(s) => s.push_str(value),
				None => self.msgid_plural = Some(value.to_string()),
			},
			Section::Msgstr(index) => {
				if self.msgstrs.len() <= index {
					self.msgstrs.resize(index + 1, String::new());
				}
				self.msgstrs[index].push_str(value);
			}
			Section::None => {
				return Err(FormatError::Parse {
					line,
					message: "string continuation without a keyword".to_string(),
				})
			}
		}
		Ok(())
	}

	fn finish(self, line: usize) -> Result<Option<(bool, StringRecord)>> {
		if self.is_empty() {
			return Ok(None);
		}

		let msgid = self.msgid.ok_or(FormatError::Parse {
			line,
			message: "entry has msgstr but no msgid".to_string(),
		})?;

		// The header entry has an empty msgid; it carries file metadata,
		// not a translatable string.
		let is_header = msgid.is_empty() && self.context.is_empty() && self.msgid_plural.is_none();

		let is_plural = self.msgid_plural.is_some();
		let mut source = vec![msgid];
		if let Some(plural) = self.msgid_plural {
			source.push(plural);
		}

		let target = if self.msgstrs.is_empty() {
			vec![String::new()]
		} else {
			self.msgstrs
		};

		Ok(Some((
			is_header,
			StringRecord {
				context: self.context,
				source,
				target,
				flags: self.flags.join(", "),
				is_plural,
			},
		)))
	}
}

/// Parse PO text into (header, records). The header is the msgstr content
/// of the empty-msgid entry, preserved verbatim for re-serialization.
fn parse_po(text: &str) -> Result<(Option<String>, Vec<StringRecord>)> {
	let mut header: Option<String> = None;
	let mut records = Vec::new();
	let mut builder = EntryBuilder::default();
	let mut section = Section::None;

	let mut flush = |builder: &mut EntryBuilder, line: usize| -> Result<()> {
		let finished = std::mem::take(builder).finish(line)?;
		if let Some((is_header, record)) = finished {
			if is_header {
				if header.is_none() {
					header = Some(record.target.first().cloned().unwrap_or_default());
				}
			} else {
				records.push(record);
			}
		}
		Ok(())
	};

	for (index, raw_line) in text.lines().enumerate() {
		let line_no = index + 1;
		let line = raw_line.trim();

		if line.is_empty() {
			flush(&mut builder, line_no)?;
			section = Section::None;
			continue;
		}

		if let Some(rest) = line.strip_prefix("#,") {
			builder
				.flags
				.extend(rest.split(',').map(|f| f.trim().to_string()).filter(|f| !f.is_empty()));
			continue;
		}

		if line.starts_with('#') {
			// Translator/extracted comments and references are not modeled.
			continue;
		}

		if let Some(rest) = line.strip_prefix("msgctxt") {
			if matches!(section, Section::Msgstr(_)) {
				flush(&mut builder, line_no)?;
			}
			section = Section::Msgctxt;
			builder.append(section, &parse_po_string(rest, line_no)?, line_no)?;
		} else if let Some(rest) = line.strip_prefix("msgid_plural") {
			section = Section::MsgidPlural;
			builder.append(section, &parse_po_string(rest, line_no)?, line_no)?;
		} else if let Some(rest) = line.strip_prefix("msgid") {
			if matches!(section, Section::Msgstr(_)) {
				flush(&mut builder, line_no)?;
			}
			section = Section::Msgid;
			builder.append(section, &parse_po_string(rest, line_no)?, line_no)?;
		} else if let Some(rest) = line.strip_prefix("msgstr") {
			let (index, rest) = parse_msgstr_index(rest, line_no)?;
			section = Section::Msgstr(index);
			builder.append(section, &parse_po_string(rest, line_no)?, line_no)?;
		} else if line.starts_with('"') {
			builder.append(section, &parse_po_string(line, line_no)?, line_no)?;
		} else {
			return Err(FormatError::Parse {
				line: line_no,
				message: format!("unrecognized line: {line}"),
			});
		}
	}

	let last_line = text.lines().count();
	flush(&mut builder, last_line)?;

	Ok((header, records))
}

/// Parse an optional `[N]` plural index after `msgstr`.
fn parse_msgstr_index(rest: &str, line: usize) -> Result<(usize, &str)> {
	let rest = rest.trim_start();
	if let Some(after) = rest.strip_prefix('[') {
		let close = after.find(']').ok_or(FormatError::Parse {
			line,
			message: "unterminated msgstr index".to_string(),
		})?;
		let index = after[..close].parse::<usize>().map_err(|_| FormatError::Parse {
			line,
			message: format!("invalid msgstr index: {}", &after[..close]),
		})?;
		Ok((index, &after[close + 1..]))
	} else {
		Ok((0, rest))
	}
}

/// Parse one quoted PO string, handling the common escapes.
fn parse_po_string(raw: &str, line: usize) -> Result<String> {
	let raw = raw.trim();
	let inner = raw
		.strip_prefix('"')
		.and_then(|s| s.strip_suffix('"'))
		.ok_or_else(|| FormatError::Parse {
			line,
			message: format!("expected quoted string, found: {raw}"),
		})?;

	let mut out = String::with_capacity(inner.len());
	let mut chars = inner.chars();
	while let Some(c) = chars.next() {
		if c == '\\' {
			match chars.next() {
				Some('n') => out.push('\n'),
				Some('t') => out.push('\t'),
				Some('r') => out.push('\r'),
				Some('"') => out.push('"'),
				Some('\\') => out.push('\\'),
				Some(other) => {
					return Err(FormatError::Parse {
						line,
						message: format!("invalid escape: \\{other}"),
					})
				}
				None => {
					return Err(FormatError::Parse {
						line,
						message: "unterminated escape".to_string(),
					})
				}
			}
		} else if c == '"' {
			return Err(FormatError::Parse {
				line,
				message: "unescaped quote inside string".to_string(),
			});
		} else {
			out.push(c);
		}
	}

	Ok(out)
}

fn escape_po_string(value: &str) -> String {
	let mut out = String::with_capacity(value.len());
	for c in value.chars() {
		match c {
			'\n' => out.push_str("\\n"),
			'\t' => out.push_str("\\t"),
			'\r' => out.push_str("\\r"),
			'"' => out.push_str("\\\""),
			'\\' => out.push_str("\\\\"),
			other => out.push(other),
		}
	}
	out
}

fn emit_header(out: &mut String, header: &str) {
	out.push_str("msgid \"\"\n");
	out.push_str(&format!("msgstr \"{}\"\n\n", escape_po_string(header)));
}

fn emit_record(out: &mut String, record: &StringRecord) {
	if !record.flags.is_empty() {
		out.push_str(&format!("#, {}\n", record.flags));
	}
	if !record.context.is_empty() {
		out.push_str(&format!("msgctxt \"{}\"\n", escape_po_string(&record.context)));
	}
	out.push_str(&format!(
		"msgid \"{}\"\n",
		escape_po_string(record.source.first().map(String::as_str).unwrap_or(""))
	));
	if record.is_plural {
		out.push_str(&format!(
			"msgid_plural \"{}\"\n",
			escape_po_string(record.source.get(1).map(String::as_str).unwrap_or(""))
		));
		for (index, target) in record.target.iter().enumerate() {
			out.push_str(&format!("msgstr[{index}] \"{}\"\n", escape_po_string(target)));
		}
	} else {
		out.push_str(&format!(
			"msgstr \"{}\"\n",
			escape_po_string(record.target.first().map(String::as_str).unwrap_or(""))
		));
	}
	out.push('\n');
}

#[cfg(test)]
mod tests {
	use super::*;

	const SIMPLE: &str = r#"msgid ""
msgstr "Content-Type: text/plain; charset=UTF-8\n"

msgid "Hello"
msgstr "Ahoj"

#, fuzzy
msgid "World"
msgstr "Svět"
"#;

	#[test]
	fn test_parse_simple() {
		let records = PoFormat.parse(SIMPLE.as_bytes()).unwrap();
		assert_eq!(records.len(), 2);
		assert_eq!(records[0].source, vec!["Hello"]);
		assert_eq!(records[0].target, vec!["Ahoj"]);
		assert_eq!(records[1].flags, "fuzzy");
	}

	#[test]
	fn test_parse_context() {
		let text = "msgctxt \"menu\"\nmsgid \"Open\"\nmsgstr \"Otevřít\"\n";
		let records = PoFormat.parse(text.as_bytes()).unwrap();
		assert_eq!(records.len(), 1);
		assert_eq!(records[0].context, "menu");
	}

	#[test]
	fn test_parse_plural() {
		let text = concat!(
			"msgid \"%d file\"\n",
			"msgid_plural \"%d files\"\n",
			"msgstr[0] \"%d soubor\"\n",
			"msgstr[1] \"%d soubory\"\n",
			"msgstr[2] \"%d souborů\"\n",
		);
		let records = PoFormat.parse(text.as_bytes()).unwrap();
		assert_eq!(records.len(), 1);
		assert!(records[0].is_plural);
		assert_eq!(records[0].source, vec!["%d file", "%d files"]);
		assert_eq!(records[0].target.len(), 3);
		assert_eq!(records[0].target[2], "%d souborů");
	}

	#[test]
	fn test_parse_multiline_string() {
		let text = "msgid \"Hello \"\n\"World\"\nmsgstr \"\"\n";
		let records = PoFormat.parse(text.as_bytes()).unwrap();
		assert_eq!(records[0].source, vec!["Hello World"]);
	}

	#[test]
	fn test_parse_escapes() {
		let text = "msgid \"a\\nb\\t\\\"c\\\"\"\nmsgstr \"\"\n";
		let records = PoFormat.parse(text.as_bytes()).unwrap();
		assert_eq!(records[0].source, vec!["a\nb\t\"c\""]);
	}

	#[test]
	fn test_parse_error_reports_line() {
		let text = "msgid \"ok\"\nmsgstr \"fine\"\n\ngarbage here\n";
		let err = PoFormat.parse(text.as_bytes()).unwrap_err();
		match err {
			FormatError::Parse { line, .. } => assert_eq!(line, 4),
			other => panic!("expected parse error, got {other:?}"),
		}
	}

	#[test]
	fn test_parse_error_unterminated_string() {
		let text = "msgid \"unterminated\nmsgstr \"\"\n";
		let err = PoFormat.parse(text.as_bytes()).unwrap_err();
		assert!(matches!(err, FormatError::Parse { line: 1, .. }));
	}

	#[test]
	fn test_msgstr_without_msgid_is_error() {
		let text = "msgstr \"orphan\"\n";
		let err = PoFormat.parse(text.as_bytes()).unwrap_err();
		assert!(matches!(err, FormatError::Parse { .. }));
	}

	#[test]
	fn test_roundtrip_preserves_record_sequence() {
		let records = PoFormat.parse(SIMPLE.as_bytes()).unwrap();
		let serialized = PoFormat.serialize(SIMPLE.as_bytes(), &[]).unwrap();
		let reparsed = PoFormat.parse(&serialized).unwrap();
		assert_eq!(records, reparsed);
	}

	#[test]
	fn test_serialize_updates_edited_record_only() {
		let mut edited = StringRecord::new("", "Hello");
		edited.target = vec!["Nazdar".to_string()];

		let serialized = PoFormat.serialize(SIMPLE.as_bytes(), &[edited]).unwrap();
		let reparsed = PoFormat.parse(&serialized).unwrap();

		assert_eq!(reparsed[0].target, vec!["Nazdar"]);
		// Untouched record keeps its translation and its position
		assert_eq!(reparsed[1].source, vec!["World"]);
		assert_eq!(reparsed[1].target, vec!["Svět"]);
	}

	#[test]
	fn test_serialize_appends_new_records() {
		let record = StringRecord::new("", "Goodbye");
		let serialized = PoFormat.serialize(SIMPLE.as_bytes(), &[record]).unwrap();
		let reparsed = PoFormat.parse(&serialized).unwrap();

		assert_eq!(reparsed.len(), 3);
		assert_eq!(reparsed[2].source, vec!["Goodbye"]);
	}

	#[test]
	fn test_serialize_empty_file_gets_default_header() {
		let record = StringRecord::new("", "Hello");
		let serialized = PoFormat.serialize(b"", &[record]).unwrap();
		let text = String::from_utf8(serialized).unwrap();
		assert!(text.starts_with("msgid \"\""));
		assert!(text.contains("charset=UTF-8"));
	}

	#[test]
	fn test_header_preserved_across_serialize() {
		let serialized = PoFormat.serialize(SIMPLE.as_bytes(), &[]).unwrap();
		let text = String::from_utf8(serialized).unwrap();
		assert!(text.contains("Content-Type: text/plain"));
	}

	mod property_tests {
		use super::*;
		use proptest::prelude::*;

		fn text_strategy() -> impl Strategy<Value = String> {
			// Printable text including the characters the escaper must handle
			"[a-zA-Z0-9 \\n\\t\"\\\\čř%-]{0,40}"
		}

		proptest! {
			#[test]
			fn roundtrip_single_record(
				context in "[a-z]{0,10}",
				source in "[a-zA-Z0-9 ]{1,40}",
				target in text_strategy(),
			) {
				let mut record = StringRecord::new(context, source);
				record.target = vec![target];

				let serialized = PoFormat.serialize(b"", &[record.clone()]).unwrap();
				let reparsed = PoFormat.parse(&serialized).unwrap();
				prop_assert_eq!(reparsed, vec![record]);
			}

			#[test]
			fn escape_roundtrips(value in text_strategy()) {
				let escaped = escape_po_string(&value);
				let quoted = format!("\"{escaped}\"");
				let parsed = parse_po_string(&quoted, 1).unwrap();
				prop_assert_eq!(parsed, value);
			}
		}
	}
}

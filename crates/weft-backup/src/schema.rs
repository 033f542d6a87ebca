// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use jsonschema::{Draft, JSONSchema};
use serde_json::{json, Value};

use crate::error::{BackupError, Result};

/// Validates `weft-backup.json` before it is trusted.
pub fn validate_manifest(doc: &Value) -> Result<()> {
	validate(&manifest_schema(), doc, "weft-backup.json")
}

/// Validates a `components/<slug>.json` document before it is trusted.
pub fn validate_component(doc: &Value, entry: &str) -> Result<()> {
	validate(&component_schema(), doc, entry)
}

fn validate(schema: &Value, doc: &Value, entry: &str) -> Result<()> {
	let compiled = JSONSchema::options()
		.with_draft(Draft::Draft7)
		.compile(schema)
		.map_err(|e| BackupError::Schema(format!("schema compile: {e}")))?;

	if let Err(errors) = compiled.validate(doc) {
		let detail: Vec<String> = errors.map(|e| format!("{e} at {}", e.instance_path)).collect();
		return Err(BackupError::Schema(format!("{entry}: {}", detail.join("; "))));
	}
	Ok(())
}

fn manifest_schema() -> Value {
	json!({
		"type": "object",
		"required": ["version", "project", "labels"],
		"properties": {
			"version": { "type": "integer" },
			"project": {
				"type": "object",
				"required": ["id", "slug", "name"],
				"properties": {
					"id": { "type": "string" },
					"slug": { "type": "string", "minLength": 1 },
					"name": { "type": "string" }
				}
			},
			"labels": {
				"type": "array",
				"items": { "type": "string" }
			}
		}
	})
}

fn component_schema() -> Value {
	json!({
		"type": "object",
		"required": [
			"id", "slug", "name", "repo_url", "branch", "filemask",
			"format", "merge_style", "locked", "remove_missing", "translations"
		],
		"properties": {
			"id": { "type": "string" },
			"slug": { "type": "string", "minLength": 1 },
			"name": { "type": "string" },
			"repo_url": { "type": "string" },
			"branch": { "type": "string" },
			"push_url": { "type": ["string", "null"] },
			"filemask": { "type": "string", "minLength": 1 },
			"format": { "type": "string", "minLength": 1 },
			"merge_style": { "type": "string", "enum": ["merge", "rebase"] },
			"locked": { "type": "boolean" },
			"remove_missing": { "type": "boolean" },
			"translations": {
				"type": "array",
				"items": {
					"type": "object",
					"required": ["id", "language", "plural_count", "filename", "units"],
					"properties": {
						"id": { "type": "string" },
						"language": { "type": "string", "minLength": 1 },
						"plural_count": { "type": "integer", "minimum": 1 },
						"filename": { "type": "string" },
						"revision": { "type": ["string", "null"] },
						"units": {
							"type": "array",
							"items": {
								"type": "object",
								"required": [
									"id", "id_hash", "context", "source", "target",
									"state", "position", "content_hash", "target_hash"
								],
								"properties": {
									"id": { "type": "string" },
									"id_hash": { "type": "integer" },
									"context": { "type": "string" },
									"source": { "type": "array", "items": { "type": "string" } },
									"target": { "type": "array", "items": { "type": "string" } },
									"state": {
										"type": "string",
										"enum": ["empty", "needs_editing", "translated", "approved", "read_only"]
									},
									"position": { "type": "integer" },
									"content_hash": { "type": "integer" },
									"target_hash": { "type": "integer" },
									"explanation": { "type": "string" },
									"extra_flags": { "type": "string" },
									"labels": { "type": "array", "items": { "type": "string" } },
									"pending": { "type": "boolean" }
								}
							}
						}
					}
				}
			}
		}
	})
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! 64-bit content hashes for units.
//!
//! `id_hash` identifies *which* string (context + source) and stays stable
//! across edits; `content_hash` detects upstream source changes;
//! `target_hash` detects concurrent target edits. All three are the first
//! 8 bytes of a SHA-256 digest interpreted as a big-endian signed integer,
//! so they fit SQLite's INTEGER column.

use sha2::{Digest, Sha256};

fn truncate_to_i64(digest: &[u8]) -> i64 {
	let mut bytes = [0u8; 8];
	bytes.copy_from_slice(&digest[..8]);
	i64::from_be_bytes(bytes)
}

fn hash_parts(parts: &[&str]) -> i64 {
	let mut hasher = Sha256::new();
	for part in parts {
		// Length-prefix each part so ("ab","c") and ("a","bc") differ
		hasher.update((part.len() as u64).to_be_bytes());
		hasher.update(part.as_bytes());
	}
	truncate_to_i64(&hasher.finalize())
}

/// Stable identity of a string: context plus all source plural forms.
pub fn calculate_id_hash(context: &str, source: &[String]) -> i64 {
	let mut parts = vec![context];
	parts.extend(source.iter().map(String::as_str));
	hash_parts(&parts)
}

/// Hash of the current source text and the flags that structurally affect
/// it. Changes whenever the upstream string is edited.
pub fn calculate_content_hash(context: &str, source: &[String], extra_flags: &str) -> i64 {
	let mut parts = vec![context];
	parts.extend(source.iter().map(String::as_str));
	parts.push(extra_flags);
	hash_parts(&parts)
}

/// Hash of the target plural forms, for optimistic concurrency on edits.
pub fn calculate_target_hash(target: &[String]) -> i64 {
	let parts: Vec<&str> = target.iter().map(String::as_str).collect();
	hash_parts(&parts)
}

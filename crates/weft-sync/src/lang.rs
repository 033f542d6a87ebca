// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

/// Number of plural forms for a language code.
///
/// Covers the languages that differ from the Germanic/Romance default of
/// two; region subtags (`pt_BR`, `zh_Hans`) fall back to the primary tag.
pub fn plural_count_for(language: &str) -> i64 {
	let primary = language
		.split(['_', '-'])
		.next()
		.unwrap_or(language)
		.to_lowercase();

	match primary.as_str() {
		"ja" | "zh" | "ko" | "vi" | "th" | "id" | "ms" | "tr" => 1,
		"cs" | "sk" | "ru" | "uk" | "pl" | "be" | "hr" | "sr" | "bs" | "lt" => 3,
		"sl" => 4,
		"ga" => 5,
		"ar" => 6,
		_ => 2,
	}
}

/// Human-readable language name for notification subjects.
pub fn language_name(language: &str) -> &str {
	let primary = language.split(['_', '-']).next().unwrap_or(language);
	match primary {
		"cs" => "Czech",
		"de" => "German",
		"fr" => "French",
		"es" => "Spanish",
		"it" => "Italian",
		"ja" => "Japanese",
		"zh" => "Chinese",
		"ru" => "Russian",
		"uk" => "Ukrainian",
		"pl" => "Polish",
		"pt" => "Portuguese",
		"nl" => "Dutch",
		"sk" => "Slovak",
		"ar" => "Arabic",
		"ko" => "Korean",
		"tr" => "Turkish",
		"en" => "English",
		// Fall back to the raw code rather than guessing
		_ => language,
	}
}

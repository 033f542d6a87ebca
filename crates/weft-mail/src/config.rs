// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::env;

use crate::error::{MailError, Result};

/// Configuration for the SMTP client.
///
/// Loaded from environment variables via [`MailConfig::from_env`] or
/// constructed directly. `Debug` redacts the password.
#[derive(Clone)]
pub struct MailConfig {
	/// SMTP server hostname.
	pub host: String,

	/// SMTP server port. Common values: 25 (unencrypted), 465 (TLS), 587 (STARTTLS).
	pub port: u16,

	/// Optional username for SMTP authentication.
	pub username: Option<String>,

	/// Optional password for SMTP authentication. Never logged.
	pub password: Option<String>,

	/// Email address to send from.
	pub from_address: String,

	/// Display name for the sender.
	pub from_name: String,

	/// Whether to use STARTTLS for the connection.
	pub use_tls: bool,

	/// Domain used for `Message-ID` and threading headers.
	pub domain: String,
}

impl std::fmt::Debug for MailConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MailConfig")
			.field("host", &self.host)
			.field("port", &self.port)
			.field("username", &self.username)
			.field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
			.field("from_address", &self.from_address)
			.field("from_name", &self.from_name)
			.field("use_tls", &self.use_tls)
			.field("domain", &self.domain)
			.finish()
	}
}

impl MailConfig {
	/// Load SMTP configuration from environment variables.
	///
	/// - `WEFT_SMTP_HOST` (required)
	/// - `WEFT_SMTP_PORT` (optional, default 587)
	/// - `WEFT_SMTP_USERNAME` / `WEFT_SMTP_PASSWORD` (optional)
	/// - `WEFT_SMTP_FROM_ADDRESS` (required)
	/// - `WEFT_SMTP_FROM_NAME` (optional, default "Weft")
	/// - `WEFT_SMTP_USE_TLS` (optional, default true)
	/// - `WEFT_SMTP_DOMAIN` (optional, defaults to the from-address domain)
	pub fn from_env() -> Result<Self> {
		let host = env::var("WEFT_SMTP_HOST")
			.map_err(|_| MailError::Config("WEFT_SMTP_HOST is required".into()))?;

		let port = env::var("WEFT_SMTP_PORT")
			.unwrap_or_else(|_| "587".into())
			.parse()
			.map_err(|_| MailError::Config("WEFT_SMTP_PORT must be a valid port number".into()))?;

		let username = env::var("WEFT_SMTP_USERNAME").ok();
		let password = env::var("WEFT_SMTP_PASSWORD").ok();

		let from_address = env::var("WEFT_SMTP_FROM_ADDRESS")
			.map_err(|_| MailError::Config("WEFT_SMTP_FROM_ADDRESS is required".into()))?;

		let from_name = env::var("WEFT_SMTP_FROM_NAME").unwrap_or_else(|_| "Weft".into());

		let use_tls = env::var("WEFT_SMTP_USE_TLS")
			.map(|v| v.to_lowercase() != "false" && v != "0")
			.unwrap_or(true);

		let domain = match env::var("WEFT_SMTP_DOMAIN") {
			Ok(domain) => domain,
			Err(_) => domain_of(&from_address)?,
		};

		Ok(Self {
			host,
			port,
			username,
			password,
			from_address,
			from_name,
			use_tls,
			domain,
		})
	}
}

fn domain_of(address: &str) -> Result<String> {
	address
		.rsplit_once('@')
		.map(|(_, domain)| domain.to_string())
		.filter(|domain| !domain.is_empty())
		.ok_or_else(|| MailError::Address(format!("no domain in {address}")))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn make_config() -> MailConfig {
		MailConfig {
			host: "smtp.example.com".to_string(),
			port: 587,
			username: Some("user".to_string()),
			password: Some("super-secret-password".to_string()),
			from_address: "noreply@example.com".to_string(),
			from_name: "Weft".to_string(),
			use_tls: true,
			domain: "example.com".to_string(),
		}
	}

	#[test]
	fn test_debug_does_not_leak_password() {
		let config = make_config();
		let debug = format!("{config:?}");
		assert!(!debug.contains("super-secret-password"));
		assert!(debug.contains("[REDACTED]"));
	}

	#[test]
	fn test_domain_of() {
		assert_eq!(domain_of("noreply@example.com").unwrap(), "example.com");
		assert!(domain_of("not-an-address").is_err());
		assert!(domain_of("user@").is_err());
	}

	mod property_tests {
		use super::*;
		use proptest::prelude::*;

		proptest! {
			#[test]
			fn password_never_in_config_debug(password in "[a-zA-Z0-9!#$%^&*]{8,32}") {
				prop_assume!(!password.contains("REDACTED"));

				let mut config = make_config();
				config.password = Some(password.clone());

				let debug = format!("{config:?}");
				prop_assert!(!debug.contains(&password));
			}
		}
	}
}

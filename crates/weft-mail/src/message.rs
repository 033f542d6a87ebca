// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use lettre::message::Mailbox;
use uuid::Uuid;

/// One notification email as handed to the outbox.
///
/// Plain text subject and body only; rendering richer templates is the
/// embedding application's concern.
#[derive(Debug, Clone)]
pub struct MailMessage {
	pub address: String,
	pub subject: String,
	pub body: String,
	/// Extra headers as `(name, value)` pairs, applied in order.
	pub headers: Vec<(String, String)>,
}

impl MailMessage {
	pub fn new(address: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
		Self {
			address: address.into(),
			subject: subject.into(),
			body: body.into(),
			headers: Vec::new(),
		}
	}

	/// Stamps the headers every notification mail carries: a fresh
	/// `Message-ID` under `domain` and the notification kind name in
	/// `X-Weft-Notification`.
	pub fn notification(mut self, kind: &str, domain: &str) -> Self {
		self
			.headers
			.push(("Message-ID".to_string(), format!("<{}@{}>", Uuid::new_v4(), domain)));
		self
			.headers
			.push(("X-Weft-Notification".to_string(), kind.to_string()));
		self
	}

	/// Threads unit-related mail under a stable per-unit conversation id,
	/// so replies and follow-up notifications group in mail clients.
	pub fn threaded(
		mut self,
		project: &str,
		component: &str,
		language: &str,
		unit_id: Uuid,
		domain: &str,
	) -> Self {
		let thread = format!("<{project}/{component}/{language}/{unit_id}@{domain}>");
		self.headers.push(("In-Reply-To".to_string(), thread.clone()));
		self.headers.push(("References".to_string(), thread));
		self
	}

	pub fn header(&self, name: &str) -> Option<&str> {
		self
			.headers
			.iter()
			.find(|(n, _)| n == name)
			.map(|(_, v)| v.as_str())
	}
}

/// Validate an email address format.
///
/// Uses [`lettre`]'s [`Mailbox`] parser; this checks syntax, not whether
/// the address exists.
pub fn is_valid_email(email: &str) -> bool {
	email.parse::<Mailbox>().is_ok()
}

#[cfg(test)]
mod tests {
	use super::*;

	mod email_validation {
		use super::*;

		#[test]
		fn valid_simple_email() {
			assert!(is_valid_email("user@example.com"));
		}

		#[test]
		fn valid_email_with_name() {
			assert!(is_valid_email("User Name <user@example.com>"));
		}

		#[test]
		fn invalid_empty_string() {
			assert!(!is_valid_email(""));
		}

		#[test]
		fn invalid_no_at_symbol() {
			assert!(!is_valid_email("userexample.com"));
		}

		#[test]
		fn invalid_no_domain() {
			assert!(!is_valid_email("user@"));
		}
	}

	mod headers {
		use super::*;

		#[test]
		fn notification_headers_are_stamped() {
			let message = MailMessage::new("u@example.com", "New string", "body")
				.notification("new_string", "weft.example.com");

			assert_eq!(message.header("X-Weft-Notification"), Some("new_string"));
			let message_id = message.header("Message-ID").unwrap();
			assert!(message_id.starts_with('<'));
			assert!(message_id.ends_with("@weft.example.com>"));
		}

		#[test]
		fn threading_uses_unit_conversation_id() {
			let unit_id = Uuid::new_v4();
			let message = MailMessage::new("u@example.com", "subject", "body").threaded(
				"horizon",
				"website",
				"cs",
				unit_id,
				"weft.example.com",
			);

			let expected = format!("<horizon/website/cs/{unit_id}@weft.example.com>");
			assert_eq!(message.header("In-Reply-To"), Some(expected.as_str()));
			assert_eq!(message.header("References"), Some(expected.as_str()));
		}
	}

	mod property_tests {
		use super::*;
		use proptest::prelude::*;

		proptest! {
			#[test]
			fn valid_emails_are_accepted(
				local in "[a-zA-Z][a-zA-Z0-9]{0,30}",
				domain in "[a-zA-Z][a-zA-Z0-9]{0,20}",
				tld in "(com|org|net|io|dev)"
			) {
				let email = format!("{local}@{domain}.{tld}");
				prop_assert!(is_valid_email(&email), "Expected valid: {}", email);
			}

			#[test]
			fn no_at_symbol_is_invalid(s in "[a-zA-Z0-9._%+-]{1,50}") {
				prop_assume!(!s.contains('@'));
				prop_assert!(!is_valid_email(&s));
			}
		}
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use lettre::{
	message::{
		header::{ContentType, Header, HeaderName, HeaderValue},
		Mailbox, SinglePart,
	},
	transport::smtp::authentication::Credentials,
	AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::MailConfig;
use crate::error::{MailError, Result};
use crate::message::MailMessage;

/// Where the outbox delivers to. `SmtpClient` is the production
/// implementation; tests substitute a recording sink.
#[async_trait]
pub trait MailSink: Send + Sync {
	async fn send(&self, message: &MailMessage) -> Result<()>;
}

/// Async SMTP client. The connection is made lazily on first send and
/// pooled by [`lettre`] afterwards.
pub struct SmtpClient {
	transport: AsyncSmtpTransport<Tokio1Executor>,
	from_mailbox: Mailbox,
}

impl SmtpClient {
	/// Validates the configuration and builds the transport. No
	/// connection is attempted here.
	#[tracing::instrument(
		name = "smtp_client_new",
		skip(config),
		fields(host = %config.host, port = %config.port, use_tls = %config.use_tls)
	)]
	pub fn new(config: MailConfig) -> Result<Self> {
		let from_mailbox: Mailbox = format!("{} <{}>", config.from_name, config.from_address)
			.parse()
			.map_err(|e| MailError::Address(format!("{e}")))?;

		let builder = if config.use_tls {
			AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
				.map_err(|e| MailError::Connection(format!("{e}")))?
		} else {
			AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
		};

		let mut builder = builder.port(config.port);

		if let (Some(username), Some(password)) = (config.username, config.password) {
			builder = builder.credentials(Credentials::new(username, password));
		}

		let transport = builder.build();

		tracing::debug!("SMTP client initialized");

		Ok(Self {
			transport,
			from_mailbox,
		})
	}

	/// Connection test against the configured server, for startup checks.
	#[tracing::instrument(name = "smtp_check_health", skip(self))]
	pub async fn check_health(&self) -> Result<()> {
		self
			.transport
			.test_connection()
			.await
			.map_err(|e| MailError::Connection(format!("{e}")))?;
		Ok(())
	}

	fn build_message(&self, mail: &MailMessage) -> Result<Message> {
		let to_mailbox: Mailbox = mail
			.address
			.parse()
			.map_err(|e| MailError::Address(format!("{e}")))?;

		let mut builder = Message::builder()
			.from(self.from_mailbox.clone())
			.to(to_mailbox)
			.subject(&mail.subject);

		// lettre re-wraps message ids in angle brackets on encode.
		for (name, value) in &mail.headers {
			builder = match name.as_str() {
				"Message-ID" => builder.message_id(Some(strip_angle(value).to_string())),
				"In-Reply-To" => builder.in_reply_to(strip_angle(value).to_string()),
				"References" => builder.references(strip_angle(value).to_string()),
				"X-Weft-Notification" => builder.header(NotificationKind(value.clone())),
				other => {
					return Err(MailError::Send(format!("unsupported header: {other}")));
				}
			};
		}

		builder
			.singlepart(
				SinglePart::builder()
					.header(ContentType::TEXT_PLAIN)
					.body(mail.body.clone()),
			)
			.map_err(|e| MailError::Send(format!("failed to build message: {e}")))
	}
}

#[async_trait]
impl MailSink for SmtpClient {
	#[tracing::instrument(
		name = "smtp_send",
		skip(self, message),
		fields(to = %message.address, subject = %message.subject)
	)]
	async fn send(&self, message: &MailMessage) -> Result<()> {
		let built = self.build_message(message)?;

		self
			.transport
			.send(built)
			.await
			.map_err(|e| MailError::Send(format!("{e}")))?;

		tracing::debug!("email sent");
		Ok(())
	}
}

fn strip_angle(value: &str) -> &str {
	value
		.strip_prefix('<')
		.and_then(|v| v.strip_suffix('>'))
		.unwrap_or(value)
}

/// `X-Weft-Notification` carries the notification kind name so mail
/// filters can route by kind.
#[derive(Debug, Clone)]
struct NotificationKind(String);

impl Header for NotificationKind {
	fn name() -> HeaderName {
		HeaderName::new_from_ascii_str("X-Weft-Notification")
	}

	fn parse(s: &str) -> std::result::Result<Self, Box<dyn std::error::Error + Send + Sync>> {
		Ok(Self(s.to_string()))
	}

	fn display(&self) -> HeaderValue {
		HeaderValue::new(Self::name(), self.0.clone())
	}
}

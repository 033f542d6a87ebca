// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SMTP delivery for Weft notifications.
//!
//! This crate owns the boundary between the notification engine and the
//! mail server: a lazy async SMTP client built on [`lettre`], the
//! [`MailMessage`] record the engine hands over (address, subject, body,
//! threading headers), and the batched [`Outbox`].
//!
//! Delivery is best effort. A failed outbox flush is logged and the batch
//! is dropped; there is no retry queue and no at-least-once guarantee.

pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod outbox;

pub use client::{MailSink, SmtpClient};
pub use config::MailConfig;
pub use error::{MailError, Result};
pub use message::{is_valid_email, MailMessage};
pub use outbox::{Outbox, OUTBOX_BATCH_SIZE};

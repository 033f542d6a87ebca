// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use crate::client::MailSink;
use crate::error::Result;
use crate::message::MailMessage;

/// Messages per flush batch.
pub const OUTBOX_BATCH_SIZE: usize = 200;

/// Buffers outgoing mail and flushes it in batches, amortizing
/// connection setup across many messages.
///
/// This is a buffering policy, not a durability guarantee: a batch that
/// fails mid-flight is logged and dropped, and messages buffered at
/// crash time are lost. Delivery is at most once.
pub struct Outbox {
	sink: Arc<dyn MailSink>,
	buffer: Vec<MailMessage>,
}

impl Outbox {
	pub fn new(sink: Arc<dyn MailSink>) -> Self {
		Self {
			sink,
			buffer: Vec::new(),
		}
	}

	pub fn len(&self) -> usize {
		self.buffer.len()
	}

	pub fn is_empty(&self) -> bool {
		self.buffer.is_empty()
	}

	/// Buffers a message, flushing automatically once a full batch has
	/// accumulated.
	pub async fn push(&mut self, message: MailMessage) -> Result<u64> {
		self.buffer.push(message);
		if self.buffer.len() >= OUTBOX_BATCH_SIZE {
			self.flush().await
		} else {
			Ok(0)
		}
	}

	/// Drains the buffer in batches, returning how many messages were
	/// handed to the sink. A send failure drops the remainder of its
	/// batch; later batches are still attempted.
	#[tracing::instrument(skip(self), fields(buffered = self.buffer.len()))]
	pub async fn flush(&mut self) -> Result<u64> {
		let mut sent = 0u64;

		while !self.buffer.is_empty() {
			let batch: Vec<MailMessage> = self
				.buffer
				.drain(..self.buffer.len().min(OUTBOX_BATCH_SIZE))
				.collect();
			let batch_size = batch.len();

			for (index, message) in batch.iter().enumerate() {
				match self.sink.send(message).await {
					Ok(()) => sent += 1,
					Err(e) => {
						tracing::warn!(
							error = %e,
							dropped = batch_size - index,
							"outbox flush failed, dropping batch"
						);
						break;
					}
				}
			}
		}

		Ok(sent)
	}
}

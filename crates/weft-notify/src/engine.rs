// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use weft_db::{
	ChangeFilter, ChangeRecord, ChangeRepository, ComponentRepository, SubscriptionRepository,
	UnitRepository, UserRecord, UserRepository,
};
use weft_mail::{MailMessage, MailSink, Outbox};
use weft_sync::lang::language_name;
use weft_units::PermissionCheck;

use crate::error::Result;
use crate::rate::RateLimiter;
use crate::registry::{NotificationKind, NotificationRegistry};
use crate::types::{Frequency, Scope};

/// Entries enumerated per digest; further changes only set the
/// overlimit flag.
pub const DIGEST_MAX_ENTRIES: usize = 100;

/// One resolved notification target.
#[derive(Debug, Clone)]
pub struct Recipient {
	pub user: UserRecord,
	pub scope: Scope,
	pub frequency: Frequency,
}

/// Counters from dispatching one change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchSummary {
	/// Instant notifications queued to the outbox.
	pub generated: u64,
	/// Instant notifications dropped by the rate limiter.
	pub rate_limited: u64,
}

/// One per-user digest for one kind, in change-log insertion order.
#[derive(Debug, Clone)]
pub struct Digest {
	pub user_id: Uuid,
	pub address: String,
	pub kind: NotificationKind,
	/// Change ids, capped at [`DIGEST_MAX_ENTRIES`].
	pub entries: Vec<i64>,
	pub overlimit: bool,
}

struct ChangeContext {
	project_slug: String,
	component_slug: String,
	language: Option<String>,
}

/// Resolves change records to recipients and queues mail.
///
/// A resolution pass works over the subscription list for one kind,
/// ordered `(user, scope desc)`: the first subscription whose scope
/// matches wins for that user, so a component-scope setting shadows a
/// project- or watched-scope one. The admin permission predicate and
/// user rows are cached for the duration of one pass only.
pub struct NotificationEngine {
	registry: NotificationRegistry,
	subscriptions: SubscriptionRepository,
	users: UserRepository,
	changes: ChangeRepository,
	components: ComponentRepository,
	units: UnitRepository,
	perms: Arc<dyn PermissionCheck>,
	outbox: tokio::sync::Mutex<Outbox>,
	limiter: RateLimiter,
	domain: String,
}

impl NotificationEngine {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		registry: NotificationRegistry,
		subscriptions: SubscriptionRepository,
		users: UserRepository,
		changes: ChangeRepository,
		components: ComponentRepository,
		units: UnitRepository,
		perms: Arc<dyn PermissionCheck>,
		sink: Arc<dyn MailSink>,
		domain: impl Into<String>,
	) -> Self {
		Self {
			registry,
			subscriptions,
			users,
			changes,
			components,
			units,
			perms,
			outbox: tokio::sync::Mutex::new(Outbox::new(sink)),
			limiter: RateLimiter::default(),
			domain: domain.into(),
		}
	}

	pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
		self.limiter = limiter;
		self
	}

	/// Queues instant notifications for one change. Digest-only kinds and
	/// non-instant subscriptions are left to [`send_digests`].
	///
	/// [`send_digests`]: NotificationEngine::send_digests
	#[instrument(skip(self, change), fields(change_id = change.id, action = change.action.as_str()))]
	pub async fn dispatch(&self, change: &ChangeRecord) -> Result<DispatchSummary> {
		let mut summary = DispatchSummary::default();

		let Some(ctx) = self.load_context(change).await? else {
			debug!("change has no component context, nothing to notify");
			return Ok(summary);
		};

		for kind in self.registry.kinds_for_action(change.action) {
			if self.registry.spec(kind)?.digest_only {
				continue;
			}

			for recipient in self.recipients(kind, change).await? {
				if recipient.frequency != Frequency::Instant {
					continue;
				}

				if !self.limiter.allow(&recipient.user.email) {
					warn!(
						address = %recipient.user.email,
						kind = kind.as_str(),
						"daily notification cap reached, dropping instant send"
					);
					summary.rate_limited += 1;
					continue;
				}

				let message = self.build_message(kind, change, &ctx, &recipient.user);
				self.outbox.lock().await.push(message).await?;
				summary.generated += 1;
			}
		}

		Ok(summary)
	}

	/// Builds per-user digests for every kind over the trailing period and
	/// queues one mail per digest. Changes are grouped in insertion order;
	/// instant subscriptions to digest-only kinds ride with the daily run.
	#[instrument(skip(self), fields(frequency = frequency.as_str()))]
	pub async fn send_digests(
		&self,
		frequency: Frequency,
		since: DateTime<Utc>,
	) -> Result<Vec<Digest>> {
		if frequency == Frequency::Instant {
			warn!("instant is not a digest frequency");
			return Ok(Vec::new());
		}

		let mut digests: Vec<Digest> = Vec::new();

		let mut kinds: Vec<NotificationKind> = self.registry.kinds().collect();
		kinds.sort_by_key(|k| k.as_str());

		for kind in kinds {
			let spec = self.registry.spec(kind)?;
			let changes = self
				.changes
				.list(&ChangeFilter {
					actions: Some(spec.actions.clone()),
					since: Some(since),
					..Default::default()
				})
				.await?;

			let mut grouped: HashMap<Uuid, Digest> = HashMap::new();
			let mut order: Vec<Uuid> = Vec::new();

			for change in &changes {
				for recipient in self.recipients(kind, change).await? {
					let effective = if spec.digest_only && recipient.frequency == Frequency::Instant {
						Frequency::Daily
					} else {
						recipient.frequency
					};
					if effective != frequency {
						continue;
					}

					let digest = grouped.entry(recipient.user.id).or_insert_with(|| {
						order.push(recipient.user.id);
						Digest {
							user_id: recipient.user.id,
							address: recipient.user.email.clone(),
							kind,
							entries: Vec::new(),
							overlimit: false,
						}
					});

					if digest.entries.len() < DIGEST_MAX_ENTRIES {
						digest.entries.push(change.id);
					} else {
						digest.overlimit = true;
					}
				}
			}

			for user_id in order {
				if let Some(digest) = grouped.remove(&user_id) {
					let message = self.build_digest_message(&digest, frequency);
					self.outbox.lock().await.push(message).await?;
					digests.push(digest);
				}
			}
		}

		Ok(digests)
	}

	/// Drains the outbox; returns how many messages went out.
	pub async fn flush_outbox(&self) -> Result<u64> {
		Ok(self.outbox.lock().await.flush().await?)
	}

	/// Resolves who gets notified for `kind` on this change, after scope
	/// shadowing, exclusions, and skip rules.
	pub async fn recipients(
		&self,
		kind: NotificationKind,
		change: &ChangeRecord,
	) -> Result<Vec<Recipient>> {
		self.resolve(kind, change, None).await
	}

	// Skip rules re-enter resolution for the listed kinds with the user
	// filter applied; the registry's acyclicity check bounds the depth.
	fn resolve<'a>(
		&'a self,
		kind: NotificationKind,
		change: &'a ChangeRecord,
		restrict_to: Option<Uuid>,
	) -> Pin<Box<dyn Future<Output = Result<Vec<Recipient>>> + Send + 'a>> {
		Box::pin(async move {
			let spec = self.registry.spec(kind)?;
			let subscriptions = self.subscriptions.list_for_kind(kind.as_str()).await?;

			let mut matched: Vec<Recipient> = Vec::new();
			let mut seen: std::collections::HashSet<Uuid> = std::collections::HashSet::new();
			let mut admin_cache: HashMap<Uuid, bool> = HashMap::new();
			let mut user_cache: HashMap<Uuid, Option<UserRecord>> = HashMap::new();

			for sub in subscriptions {
				if let Some(only) = restrict_to {
					if sub.user_id != only {
						continue;
					}
				}
				// Already matched at a more specific scope for this kind.
				if seen.contains(&sub.user_id) {
					continue;
				}
				let Some(scope) = Scope::from_i64(sub.scope) else {
					warn!(scope = sub.scope, "ignoring subscription with unknown scope");
					continue;
				};

				let scope_matches = match scope {
					Scope::Component => {
						sub.component_id.is_some() && sub.component_id == change.component_id
					}
					Scope::Project => sub.project_id.is_some() && sub.project_id == change.project_id,
					Scope::Admin => match change.project_id {
						Some(project_id) => {
							if let Some(cached) = admin_cache.get(&sub.user_id) {
								*cached
							} else {
								let allowed = self
									.perms
									.has_perm(sub.user_id, "project.admin", project_id)
									.await;
								admin_cache.insert(sub.user_id, allowed);
								allowed
							}
						}
						None => false,
					},
					Scope::Watched => match change.project_id {
						Some(project_id) => {
							!spec.ignore_watched
								&& self.users.watches_project(sub.user_id, project_id).await?
						}
						None => false,
					},
					Scope::All => true,
				};
				if !scope_matches {
					continue;
				}
				seen.insert(sub.user_id);

				// Never the acting user, never inactive or bot accounts.
				if Some(sub.user_id) == change.user_id {
					continue;
				}
				let user = match user_cache.entry(sub.user_id) {
					std::collections::hash_map::Entry::Occupied(entry) => entry.get().clone(),
					std::collections::hash_map::Entry::Vacant(entry) => entry
						.insert(self.users.get_by_id(sub.user_id).await?)
						.clone(),
				};
				let Some(user) = user else {
					continue;
				};
				if !user.is_active || user.is_bot {
					continue;
				}

				if !self.kind_applies(kind, change, user.id).await? {
					continue;
				}

				let Ok(frequency) = sub.frequency.parse::<Frequency>() else {
					warn!(frequency = %sub.frequency, "ignoring subscription with unknown frequency");
					continue;
				};

				matched.push(Recipient {
					user,
					scope,
					frequency,
				});
			}

			if spec.skip_when_notify.is_empty() {
				return Ok(matched);
			}

			// A more specific kind notifying the same user suppresses this one.
			let mut kept = Vec::new();
			for recipient in matched {
				let mut suppressed = false;
				for other in &spec.skip_when_notify {
					let others = self.resolve(*other, change, Some(recipient.user.id)).await?;
					if !others.is_empty() {
						suppressed = true;
						break;
					}
				}
				if !suppressed {
					kept.push(recipient);
				}
			}
			Ok(kept)
		})
	}

	/// Kind-level applicability beyond subscription matching: mention
	/// notifications only go to the mentioned users, last-author comment
	/// notifications only to the unit's last editor.
	async fn kind_applies(
		&self,
		kind: NotificationKind,
		change: &ChangeRecord,
		user_id: Uuid,
	) -> Result<bool> {
		match kind {
			NotificationKind::MentionComment => {
				let mentioned = change.details["mentions"]
					.as_array()
					.map(|mentions| {
						mentions
							.iter()
							.filter_map(|m| m.as_str())
							.any(|m| m == user_id.to_string())
					})
					.unwrap_or(false);
				Ok(mentioned)
			}
			NotificationKind::LastAuthorComment => {
				let Some(unit_id) = change.unit_id else {
					return Ok(false);
				};
				let Some(unit) = self.units.get_by_id(unit_id).await? else {
					return Ok(false);
				};
				Ok(unit.last_edited_by == Some(user_id))
			}
			_ => Ok(true),
		}
	}

	async fn load_context(&self, change: &ChangeRecord) -> Result<Option<ChangeContext>> {
		let Some(component_id) = change.component_id else {
			return Ok(None);
		};
		let Some(component) = self.components.get_component_by_id(component_id).await? else {
			return Ok(None);
		};
		let project_slug = self
			.components
			.get_project_by_id(component.project_id)
			.await?
			.map(|p| p.slug)
			.unwrap_or_else(|| component.project_id.to_string());

		let language = match change.translation_id {
			Some(translation_id) => self
				.components
				.get_translation_by_id(translation_id)
				.await?
				.map(|t| t.language),
			None => None,
		};

		Ok(Some(ChangeContext {
			project_slug,
			component_slug: component.slug,
			language,
		}))
	}

	fn build_message(
		&self,
		kind: NotificationKind,
		change: &ChangeRecord,
		ctx: &ChangeContext,
		user: &UserRecord,
	) -> MailMessage {
		let subject = subject_for(kind, ctx);
		let body = format!(
			"{subject}\n\nChange #{} ({}) in {}/{}.\n",
			change.id,
			change.action.as_str(),
			ctx.project_slug,
			ctx.component_slug,
		);

		let mut message =
			MailMessage::new(&user.email, subject, body).notification(kind.as_str(), &self.domain);

		if let (Some(unit_id), Some(language)) = (change.unit_id, &ctx.language) {
			message = message.threaded(
				&ctx.project_slug,
				&ctx.component_slug,
				language,
				unit_id,
				&self.domain,
			);
		}

		message
	}

	fn build_digest_message(&self, digest: &Digest, frequency: Frequency) -> MailMessage {
		let subject = format!(
			"Weft {} digest: {} ({} changes)",
			frequency.as_str(),
			digest.kind.as_str(),
			digest.entries.len(),
		);

		let mut body = String::new();
		for change_id in &digest.entries {
			body.push_str(&format!("change #{change_id}\n"));
		}
		if digest.overlimit {
			body.push_str("Further changes omitted (digest limit reached).\n");
		}

		MailMessage::new(&digest.address, subject, body)
			.notification(digest.kind.as_str(), &self.domain)
	}
}

fn subject_for(kind: NotificationKind, ctx: &ChangeContext) -> String {
	let place = format!("{}/{}", ctx.project_slug, ctx.component_slug);
	let language = ctx.language.as_deref().map(language_name);

	match kind {
		NotificationKind::NewString => match language {
			Some(language) => format!("New string to translate in {place} ({language})"),
			None => format!("New string to translate in {place}"),
		},
		NotificationKind::TranslatedString => match language {
			Some(language) => format!("String translated in {place} ({language})"),
			None => format!("String translated in {place}"),
		},
		NotificationKind::ApprovedString => match language {
			Some(language) => format!("String approved in {place} ({language})"),
			None => format!("String approved in {place}"),
		},
		NotificationKind::NewSuggestion => format!("New suggestion in {place}"),
		NotificationKind::NewComment => format!("New comment in {place}"),
		NotificationKind::MentionComment => format!("You were mentioned in a comment in {place}"),
		NotificationKind::LastAuthorComment => {
			format!("New comment on your translation in {place}")
		}
		NotificationKind::MergeFailure => format!("Repository operation failed in {place}"),
		NotificationKind::ParseError => format!("Could not parse translation file in {place}"),
		NotificationKind::ComponentLocked => format!("Component lock changed in {place}"),
		NotificationKind::PendingSuggestions => format!("Pending suggestions in {place}"),
	}
}

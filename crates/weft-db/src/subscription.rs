// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::error::DbError;

/// A user's opt-in to a notification kind at a scope and frequency.
///
/// `scope` is stored as the numeric specificity used for ordering:
/// All=10, Watched=20, Admin=30, Project=40, Component=50. The notification
/// engine owns the enum; this store only guarantees ordering semantics.
#[derive(Debug, Clone)]
pub struct SubscriptionRecord {
	pub user_id: Uuid,
	pub kind: String,
	pub scope: i64,
	pub project_id: Option<Uuid>,
	pub component_id: Option<Uuid>,
	pub frequency: String,
}

#[derive(Clone)]
pub struct SubscriptionRepository {
	pool: SqlitePool,
}

impl SubscriptionRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, subscription), fields(user_id = %subscription.user_id, kind = %subscription.kind, scope = subscription.scope))]
	pub async fn upsert(&self, subscription: &SubscriptionRecord) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO subscriptions (user_id, kind, scope, project_id, component_id, frequency)
			VALUES (?, ?, ?, ?, ?, ?)
			ON CONFLICT (user_id, kind, scope, project_id, component_id)
			DO UPDATE SET frequency = excluded.frequency
			"#,
		)
		.bind(subscription.user_id.to_string())
		.bind(&subscription.kind)
		.bind(subscription.scope)
		.bind(subscription.project_id.map(|u| u.to_string()).unwrap_or_default())
		.bind(subscription.component_id.map(|u| u.to_string()).unwrap_or_default())
		.bind(&subscription.frequency)
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id, kind = %kind, scope = scope))]
	pub async fn delete(
		&self,
		user_id: Uuid,
		kind: &str,
		scope: i64,
		project_id: Option<Uuid>,
		component_id: Option<Uuid>,
	) -> Result<(), DbError> {
		let result = sqlx::query(
			r#"
			DELETE FROM subscriptions
			WHERE user_id = ? AND kind = ? AND scope = ? AND project_id = ? AND component_id = ?
			"#,
		)
		.bind(user_id.to_string())
		.bind(kind)
		.bind(scope)
		.bind(project_id.map(|u| u.to_string()).unwrap_or_default())
		.bind(component_id.map(|u| u.to_string()).unwrap_or_default())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound("Subscription not found".to_string()));
		}

		Ok(())
	}

	/// All subscriptions for a notification kind, ordered by
	/// `(user, scope DESC)` so the most specific scope for each user is
	/// seen first during notification resolution.
	#[tracing::instrument(skip(self), fields(kind = %kind))]
	pub async fn list_for_kind(&self, kind: &str) -> Result<Vec<SubscriptionRecord>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT user_id, kind, scope, project_id, component_id, frequency
			FROM subscriptions
			WHERE kind = ?
			ORDER BY user_id ASC, scope DESC
			"#,
		)
		.bind(kind)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_subscription).collect()
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<SubscriptionRecord>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT user_id, kind, scope, project_id, component_id, frequency
			FROM subscriptions
			WHERE user_id = ?
			ORDER BY kind ASC, scope DESC
			"#,
		)
		.bind(user_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_subscription).collect()
	}
}

fn row_to_subscription(row: &sqlx::sqlite::SqliteRow) -> Result<SubscriptionRecord, DbError> {
	let user_id_str: String = row.get("user_id");
	let project_id_str: String = row.get("project_id");
	let component_id_str: String = row.get("component_id");

	let parse_opt_uuid = |value: String| -> Result<Option<Uuid>, DbError> {
		if value.is_empty() {
			Ok(None)
		} else {
			Uuid::parse_str(&value)
				.map(Some)
				.map_err(|e| DbError::Internal(e.to_string()))
		}
	};

	Ok(SubscriptionRecord {
		user_id: Uuid::parse_str(&user_id_str).map_err(|e| DbError::Internal(e.to_string()))?,
		kind: row.get("kind"),
		scope: row.get("scope"),
		project_id: parse_opt_uuid(project_id_str)?,
		component_id: parse_opt_uuid(component_id_str)?,
		frequency: row.get("frequency"),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing;

	async fn make_repo() -> SubscriptionRepository {
		let pool = testing::create_core_test_pool().await;
		SubscriptionRepository::new(pool)
	}

	fn make_subscription(user_id: Uuid, kind: &str, scope: i64) -> SubscriptionRecord {
		SubscriptionRecord {
			user_id,
			kind: kind.to_string(),
			scope,
			project_id: None,
			component_id: None,
			frequency: "instant".to_string(),
		}
	}

	#[tokio::test]
	async fn test_upsert_updates_frequency() {
		let repo = make_repo().await;
		let user_id = Uuid::new_v4();

		repo
			.upsert(&make_subscription(user_id, "new_string", 20))
			.await
			.unwrap();

		let mut changed = make_subscription(user_id, "new_string", 20);
		changed.frequency = "daily".to_string();
		repo.upsert(&changed).await.unwrap();

		let subs = repo.list_for_user(user_id).await.unwrap();
		assert_eq!(subs.len(), 1);
		assert_eq!(subs[0].frequency, "daily");
	}

	#[tokio::test]
	async fn test_list_for_kind_orders_by_user_then_scope_desc() {
		let repo = make_repo().await;
		let user_a = Uuid::new_v4();
		let user_b = Uuid::new_v4();

		let mut component_sub = make_subscription(user_a, "new_string", 50);
		component_sub.component_id = Some(Uuid::new_v4());
		repo.upsert(&component_sub).await.unwrap();
		repo
			.upsert(&make_subscription(user_a, "new_string", 20))
			.await
			.unwrap();
		repo
			.upsert(&make_subscription(user_b, "new_string", 10))
			.await
			.unwrap();

		let subs = repo.list_for_kind("new_string").await.unwrap();
		assert_eq!(subs.len(), 3);

		// Within each user, most specific scope first
		let user_a_scopes: Vec<_> = subs
			.iter()
			.filter(|s| s.user_id == user_a)
			.map(|s| s.scope)
			.collect();
		assert_eq!(user_a_scopes, vec![50, 20]);
	}

	#[tokio::test]
	async fn test_same_kind_different_scopes_coexist() {
		let repo = make_repo().await;
		let user_id = Uuid::new_v4();

		repo
			.upsert(&make_subscription(user_id, "new_comment", 10))
			.await
			.unwrap();
		repo
			.upsert(&make_subscription(user_id, "new_comment", 40))
			.await
			.unwrap();

		let subs = repo.list_for_user(user_id).await.unwrap();
		assert_eq!(subs.len(), 2);
	}

	#[tokio::test]
	async fn test_delete() {
		let repo = make_repo().await;
		let user_id = Uuid::new_v4();

		repo
			.upsert(&make_subscription(user_id, "new_string", 20))
			.await
			.unwrap();
		repo
			.delete(user_id, "new_string", 20, None, None)
			.await
			.unwrap();

		assert!(repo.list_for_user(user_id).await.unwrap().is_empty());

		let result = repo.delete(user_id, "new_string", 20, None, None).await;
		assert!(matches!(result, Err(DbError::NotFound(_))));
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use uuid::Uuid;

/// Authorization boundary. Supplied by the embedding application; the core
/// treats permission names as opaque strings.
#[async_trait]
pub trait PermissionCheck: Send + Sync {
	async fn has_perm(&self, user_id: Uuid, permission: &str, project_id: Uuid) -> bool;
}

/// Grants everything. Test helper and single-user default.
pub struct AllowAll;

#[async_trait]
impl PermissionCheck for AllowAll {
	async fn has_perm(&self, _user_id: Uuid, _permission: &str, _project_id: Uuid) -> bool {
		true
	}
}

/// Denies everything.
pub struct DenyAll;

#[async_trait]
impl PermissionCheck for DenyAll {
	async fn has_perm(&self, _user_id: Uuid, _permission: &str, _project_id: Uuid) -> bool {
		false
	}
}

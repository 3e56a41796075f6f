// SPDX-License-Identifier: MIT
// Copyright 2026 CourseLoop Developers

//! Profile provisioning and updates.
//!
//! `ensure_profile` is the onboarding entry point and is idempotent: a
//! profile row is created on first login and only patched afterwards. The
//! backend enforces username uniqueness; a violation is reported as a
//! recoverable conflict and the caller prompts for a new name.

use crate::error::{Error, Result};
use crate::gateway::{self, tables, BackendGateway, Filter};
use crate::models::{Profile, ProfilePatch};
use crate::time_utils;
use std::sync::Arc;
use uuid::Uuid;

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 20;

pub struct ProfileService {
    gateway: Arc<dyn BackendGateway>,
}

impl ProfileService {
    pub fn new(gateway: Arc<dyn BackendGateway>) -> Self {
        Self { gateway }
    }

    /// Create the user's profile, or update its username if one exists.
    ///
    /// Idempotent per user. A username owned by a different user returns
    /// `Conflict("username_taken")`; there is no auto-suffixing or retry.
    pub async fn ensure_profile(&self, user_id: Uuid, username: &str) -> Result<Profile> {
        validate_username(username)?;

        match fetch_profile(self.gateway.as_ref(), user_id).await {
            Ok(existing) => {
                if existing.username == username {
                    return Ok(existing);
                }
                return self.apply_username(user_id, username).await;
            }
            Err(Error::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let row = serde_json::json!({
            "id": user_id,
            "username": username,
            "created_at": time_utils::now_rfc3339(),
        });

        match self.gateway.insert(tables::PROFILES, row).await {
            Ok(created) => {
                tracing::info!(%user_id, "profile provisioned");
                gateway::decode_row(tables::PROFILES, created)
            }
            Err(e) if e.is_duplicate_key() => {
                // One bounded re-query tells a concurrent self-provision
                // apart from a username owned by someone else.
                match fetch_profile(self.gateway.as_ref(), user_id).await {
                    Ok(existing) if existing.username == username => Ok(existing),
                    Ok(_) => self.apply_username(user_id, username).await,
                    Err(Error::NotFound(_)) => Err(Error::conflict(Error::USERNAME_TAKEN)),
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Partial update; unset fields are never sent, so the backend leaves
    /// them untouched. An empty patch is a local no-op.
    pub async fn update_profile(&self, user_id: Uuid, patch: &ProfilePatch) -> Result<()> {
        if let Some(username) = &patch.username {
            validate_username(username)?;
        }
        if patch.is_empty() {
            return Ok(());
        }

        let body = serde_json::to_value(patch).map_err(|e| {
            Error::Internal(anyhow::anyhow!("failed to encode profile patch: {}", e))
        })?;

        match self
            .gateway
            .update(tables::PROFILES, body, &[Filter::eq("id", user_id)])
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_duplicate_key() => Err(Error::conflict(Error::USERNAME_TAKEN)),
            Err(e) => Err(e),
        }
    }

    /// Single-row lookup; `NotFound` when the user has no profile yet.
    pub async fn fetch_profile(&self, user_id: Uuid) -> Result<Profile> {
        fetch_profile(self.gateway.as_ref(), user_id).await
    }

    async fn apply_username(&self, user_id: Uuid, username: &str) -> Result<Profile> {
        let patch = serde_json::json!({ "username": username });
        match self
            .gateway
            .update(tables::PROFILES, patch, &[Filter::eq("id", user_id)])
            .await
        {
            Ok(()) => fetch_profile(self.gateway.as_ref(), user_id).await,
            Err(e) if e.is_duplicate_key() => Err(Error::conflict(Error::USERNAME_TAKEN)),
            Err(e) => Err(e),
        }
    }
}

/// Fetch a profile row by user id. Shared with the session manager, which
/// loads profiles during login and restoration.
pub(crate) async fn fetch_profile(
    gateway: &dyn BackendGateway,
    user_id: Uuid,
) -> Result<Profile> {
    let rows = gateway
        .select(tables::PROFILES, &[Filter::eq("id", user_id)], None)
        .await?;

    let Some(row) = rows.into_iter().next() else {
        return Err(Error::NotFound(format!("profile for user {}", user_id)));
    };
    gateway::decode_row(tables::PROFILES, row)
}

/// 3-20 chars, alphanumeric + underscore; checked before any network call.
fn validate_username(username: &str) -> Result<()> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(Error::Validation(format!(
            "username must be {}-{} characters",
            USERNAME_MIN_LEN, USERNAME_MAX_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(Error::Validation(
            "username may only contain letters, digits, and underscores".to_string(),
        ));
    }
    Ok(())
}

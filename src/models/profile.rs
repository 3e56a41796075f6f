// SPDX-License-Identifier: MIT
// Copyright 2026 CourseLoop Developers

//! Public profile model and partial-update patch.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public profile row stored in the `profiles` table.
///
/// The row id is the auth user id (1:1 with the session user).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    /// Unique handle shown on posts (3-20 chars, alphanumeric + underscore)
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub university: Option<String>,
    /// When the profile was created (RFC 3339)
    pub created_at: String,
}

/// Partial profile update.
///
/// `None` fields are never serialized, so the backend leaves them untouched
/// rather than overwriting them with empty values.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub university: Option<String>,
}

impl ProfilePatch {
    /// True when no field is set; such a patch is a local no-op.
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.full_name.is_none()
            && self.avatar_url.is_none()
            && self.university.is_none()
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 CourseLoop Developers

//! Post and comment models.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Post row stored in the `posts` table.
///
/// Content and author are immutable after creation; the counters are mutated
/// only through the engagement service's atomic increments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    /// Normalized course code the post belongs to
    pub course_code: String,
    pub like_count: i64,
    pub comment_count: i64,
    /// When the post was created (RFC 3339)
    pub created_at: String,
}

/// Comment row stored in the `comments` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub like_count: i64,
    /// When the comment was created (RFC 3339)
    pub created_at: String,
}

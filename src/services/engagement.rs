// SPDX-License-Identifier: MIT
// Copyright 2026 CourseLoop Developers

//! Post/comment creation and engagement counters.
//!
//! Counters are only ever mutated through the gateway's atomic increment.
//! Comment rows are authoritative; the parent post's `comment_count` is an
//! eventually-consistent cache of them, corrected by `reconcile_comment_count`
//! when an external maintenance job runs it.

use crate::error::{Error, Result};
use crate::gateway::{self, tables, BackendGateway, Filter, Order};
use crate::models::{Comment, Post};
use crate::services::catalog::normalize_course_code;
use crate::time_utils;
use std::sync::Arc;
use uuid::Uuid;

pub struct EngagementService {
    gateway: Arc<dyn BackendGateway>,
}

impl EngagementService {
    pub fn new(gateway: Arc<dyn BackendGateway>) -> Self {
        Self { gateway }
    }

    /// Add one like to a post.
    ///
    /// Delegated to the backend as a single atomic operation; a client-side
    /// read-add-write would lose updates under concurrent likes.
    pub async fn like_post(&self, post_id: Uuid) -> Result<()> {
        self.gateway
            .increment(
                tables::POSTS,
                "like_count",
                &[Filter::eq("id", post_id)],
                1,
            )
            .await
    }

    /// Add one like to a comment.
    pub async fn like_comment(&self, comment_id: Uuid) -> Result<()> {
        self.gateway
            .increment(
                tables::COMMENTS,
                "like_count",
                &[Filter::eq("id", comment_id)],
                1,
            )
            .await
    }

    /// Create a post with zeroed counters.
    pub async fn create_post(
        &self,
        author_id: Uuid,
        course_code: &str,
        content: &str,
    ) -> Result<Post> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::Validation("post content must not be empty".to_string()));
        }
        let course_code = normalize_course_code(course_code)?;

        let row = serde_json::json!({
            "id": Uuid::new_v4(),
            "author_id": author_id,
            "content": content,
            "course_code": course_code,
            "like_count": 0,
            "comment_count": 0,
            "created_at": time_utils::now_rfc3339(),
        });

        let created = self.gateway.insert(tables::POSTS, row).await?;
        gateway::decode_row(tables::POSTS, created)
    }

    /// Create a comment and bump the parent post's counter.
    ///
    /// The comment's existence is authoritative: a failed counter increment
    /// never rolls back or hides the created comment, it is logged and left
    /// for reconciliation.
    pub async fn add_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        content: &str,
    ) -> Result<Comment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::Validation(
                "comment content must not be empty".to_string(),
            ));
        }

        let row = serde_json::json!({
            "id": Uuid::new_v4(),
            "post_id": post_id,
            "author_id": author_id,
            "content": content,
            "like_count": 0,
            "created_at": time_utils::now_rfc3339(),
        });

        let created = self.gateway.insert(tables::COMMENTS, row).await?;
        let comment: Comment = gateway::decode_row(tables::COMMENTS, created)?;

        if let Err(e) = self
            .gateway
            .increment(
                tables::POSTS,
                "comment_count",
                &[Filter::eq("id", post_id)],
                1,
            )
            .await
        {
            tracing::warn!(
                error = %e,
                %post_id,
                "comment_count increment failed; reconciliation will correct it"
            );
        }

        Ok(comment)
    }

    /// Recompute a post's `comment_count` from its actual child rows.
    ///
    /// The backstop for missed increments; invoked by an external maintenance
    /// job, never on the live path. Returns the true count.
    pub async fn reconcile_comment_count(&self, post_id: Uuid) -> Result<i64> {
        let rows = self
            .gateway
            .select(tables::COMMENTS, &[Filter::eq("post_id", post_id)], None)
            .await?;
        let count = rows.len() as i64;

        self.gateway
            .update(
                tables::POSTS,
                serde_json::json!({ "comment_count": count }),
                &[Filter::eq("id", post_id)],
            )
            .await?;

        tracing::info!(%post_id, count, "comment count reconciled");
        Ok(count)
    }

    /// All posts, newest first.
    pub async fn posts_feed(&self) -> Result<Vec<Post>> {
        let rows = self
            .gateway
            .select(tables::POSTS, &[], Some(Order::desc("created_at")))
            .await?;
        gateway::decode_rows(tables::POSTS, rows)
    }

    /// Posts for one course, newest first. The code is normalized with the
    /// catalog rule so lookups match however the caller spelled it.
    pub async fn posts_for_course(&self, course_code: &str) -> Result<Vec<Post>> {
        let course_code = normalize_course_code(course_code)?;
        let rows = self
            .gateway
            .select(
                tables::POSTS,
                &[Filter::eq("course_code", course_code)],
                Some(Order::desc("created_at")),
            )
            .await?;
        gateway::decode_rows(tables::POSTS, rows)
    }

    /// Comments under a post, newest first.
    pub async fn comments_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        let rows = self
            .gateway
            .select(
                tables::COMMENTS,
                &[Filter::eq("post_id", post_id)],
                Some(Order::desc("created_at")),
            )
            .await?;
        gateway::decode_rows(tables::COMMENTS, rows)
    }
}

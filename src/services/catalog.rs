// SPDX-License-Identifier: MIT
// Copyright 2026 CourseLoop Developers

//! Course catalog: find-or-create with race collapsing.
//!
//! Many users reference the same course for the first time concurrently at
//! the start of a semester. The backend holds a uniqueness constraint on the
//! (course_code, professor_name) identity key; this service turns a losing
//! create race into a single bounded re-query so every caller sees
//! find-or-create as one idempotent operation.

use crate::error::{Error, Result};
use crate::gateway::{self, tables, BackendGateway, Filter};
use crate::models::{Course, CourseEntry, UserCourse};
use dashmap::DashMap;
use futures_util::{stream, StreamExt};
use std::sync::Arc;
use uuid::Uuid;

/// Cap on concurrent resolve/link calls in a batch.
const MAX_CONCURRENT_RESOLVES: usize = 8;

pub struct CourseCatalogService {
    gateway: Arc<dyn BackendGateway>,
    /// Resolved identity keys, shared across callers within this process.
    cache: DashMap<(String, String), Course>,
}

impl CourseCatalogService {
    pub fn new(gateway: Arc<dyn BackendGateway>) -> Self {
        Self {
            gateway,
            cache: DashMap::new(),
        }
    }

    /// Resolve (code, professor) to the canonical course and link it to the
    /// user. Safe under concurrent first-use: the same identity key always
    /// resolves to the same course id, whichever caller created the row.
    pub async fn resolve_course(
        &self,
        user_id: Uuid,
        code: &str,
        professor: &str,
    ) -> Result<Course> {
        let code = normalize_course_code(code)?;
        let professor = professor.trim();
        if professor.is_empty() {
            return Err(Error::Validation("professor name is required".to_string()));
        }

        let key = (code.clone(), professor.to_string());
        let course = match self.cache.get(&key) {
            Some(cached) => cached.value().clone(),
            None => {
                let course = self.find_or_create(&code, professor).await?;
                self.cache.insert(key, course.clone());
                course
            }
        };

        self.link(user_id, course.id).await?;
        Ok(course)
    }

    /// Resolve and link every entry of both course lists.
    ///
    /// Entries run with bounded concurrency; the first fatal failure is
    /// reported, and courses already linked stay linked — the caller retries
    /// the remaining entries only, never the whole batch.
    pub async fn add_courses_for_user(
        &self,
        user_id: Uuid,
        current_courses: &[CourseEntry],
        previous_courses: &[CourseEntry],
    ) -> Result<Vec<Course>> {
        let entries: Vec<CourseEntry> = current_courses
            .iter()
            .chain(previous_courses)
            .cloned()
            .collect();

        let resolved = stream::iter(entries)
            .map(|entry| async move {
                self.resolve_course(user_id, &entry.course_code, &entry.professor_name)
                    .await
            })
            .buffer_unordered(MAX_CONCURRENT_RESOLVES)
            .collect::<Vec<Result<Course>>>()
            .await;

        let courses = resolved.into_iter().collect::<Result<Vec<Course>>>()?;
        tracing::info!(%user_id, count = courses.len(), "courses linked");
        Ok(courses)
    }

    /// The user's linked courses, joined through `user_courses`.
    pub async fn courses_for_user(&self, user_id: Uuid) -> Result<Vec<Course>> {
        let rows = self
            .gateway
            .select(
                tables::USER_COURSES,
                &[Filter::eq("user_id", user_id)],
                None,
            )
            .await?;
        let links: Vec<UserCourse> = gateway::decode_rows(tables::USER_COURSES, rows)?;

        let courses = stream::iter(links)
            .map(|link| async move { self.fetch_course(link.course_id).await })
            .buffer_unordered(MAX_CONCURRENT_RESOLVES)
            .collect::<Vec<Result<Course>>>()
            .await;

        courses.into_iter().collect()
    }

    async fn fetch_course(&self, course_id: Uuid) -> Result<Course> {
        let rows = self
            .gateway
            .select(tables::COURSES, &[Filter::eq("id", course_id)], None)
            .await?;
        let Some(row) = rows.into_iter().next() else {
            return Err(Error::NotFound(format!("course {}", course_id)));
        };
        gateway::decode_row(tables::COURSES, row)
    }

    async fn find_or_create(&self, code: &str, professor: &str) -> Result<Course> {
        if let Some(existing) = self.lookup(code, professor).await? {
            return Ok(existing);
        }

        let row = serde_json::json!({
            "id": Uuid::new_v4(),
            "course_code": code,
            "professor_name": professor,
        });

        match self.gateway.insert(tables::COURSES, row).await {
            Ok(created) => {
                tracing::info!(course_code = %code, "course created");
                gateway::decode_row(tables::COURSES, created)
            }
            Err(e) if e.is_duplicate_key() => {
                // Lost the create race; the winner's row must be visible on
                // the one allowed re-query. If it isn't, the backend state is
                // inconsistent and the call fails rather than looping.
                self.lookup(code, professor).await?.ok_or_else(|| {
                    tracing::error!(
                        course_code = %code,
                        "course insert conflicted but re-query found nothing"
                    );
                    Error::conflict(Error::COURSE_RESOLVE)
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn lookup(&self, code: &str, professor: &str) -> Result<Option<Course>> {
        let rows = self
            .gateway
            .select(
                tables::COURSES,
                &[
                    Filter::eq("course_code", code),
                    Filter::eq("professor_name", professor),
                ],
                None,
            )
            .await?;

        rows.into_iter()
            .next()
            .map(|row| gateway::decode_row(tables::COURSES, row))
            .transpose()
    }

    /// Create the user/course link; a duplicate link is a no-op.
    async fn link(&self, user_id: Uuid, course_id: Uuid) -> Result<()> {
        let row = serde_json::json!({
            "user_id": user_id,
            "course_id": course_id,
        });

        match self.gateway.insert(tables::USER_COURSES, row).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_duplicate_key() => {
                tracing::debug!(%user_id, %course_id, "course already linked");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Normalize a course code: strip non-alphanumerics, uppercase.
///
/// Identity keys are only ever formed from normalized codes; applying this
/// anywhere a key is formed is what keeps "CS 101" and "cs-101" from
/// producing duplicate rows.
pub fn normalize_course_code(raw: &str) -> Result<String> {
    let code: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if code.is_empty() {
        return Err(Error::Validation(
            "course code must contain letters or digits".to_string(),
        ));
    }
    Ok(code)
}

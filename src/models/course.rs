// SPDX-License-Identifier: MIT
// Copyright 2026 CourseLoop Developers

//! Course catalog models.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical course row stored in the `courses` table.
///
/// Identity is the (course_code, professor_name) pair, not the row id; the
/// code is always stored normalized (uppercase, alphanumerics only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub course_code: String,
    pub professor_name: String,
}

/// Caller-side course input, as typed during onboarding (un-normalized).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseEntry {
    pub course_code: String,
    pub professor_name: String,
}

impl CourseEntry {
    pub fn new(course_code: impl Into<String>, professor_name: impl Into<String>) -> Self {
        Self {
            course_code: course_code.into(),
            professor_name: professor_name.into(),
        }
    }
}

/// Many-to-many link between a user and a course, no payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCourse {
    pub user_id: Uuid,
    pub course_id: Uuid,
}

// SPDX-License-Identifier: MIT
// Copyright 2026 CourseLoop Developers

//! Course find-or-create tests: normalization, dedup under concurrency,
//! bounded conflict retry.

use courseloop_core::error::Error;
use courseloop_core::gateway::tables;
use courseloop_core::models::CourseEntry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use uuid::Uuid;

mod common;
use common::{test_state, FakeGateway};

const PROFESSOR: &str = "Smith, J";

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_callers_resolve_to_a_single_course() {
    const CALLERS: usize = 16;
    // Spelling variants that all normalize to CS101.
    const SPELLINGS: [&str; 4] = ["CS 101", "cs101", "cs-101", "Cs 101 "];

    let gw = FakeGateway::new();
    let state = Arc::new(test_state(gw.clone()));

    let mut handles = Vec::new();
    for i in 0..CALLERS {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            let user_id = Uuid::new_v4();
            state
                .courses
                .resolve_course(user_id, SPELLINGS[i % SPELLINGS.len()], PROFESSOR)
                .await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        let course = handle.await.expect("join").expect("resolve");
        assert_eq!(course.course_code, "CS101");
        ids.push(course.id);
    }

    // Every caller got the same canonical id and exactly one row exists.
    assert!(ids.iter().all(|id| *id == ids[0]));
    assert_eq!(gw.table(tables::COURSES).len(), 1);
}

#[tokio::test]
async fn test_same_code_different_professor_is_a_different_course() {
    let gw = FakeGateway::new();
    let state = test_state(gw.clone());
    let user_id = Uuid::new_v4();

    let a = state
        .courses
        .resolve_course(user_id, "CS 101", "Smith, J")
        .await
        .expect("resolve");
    let b = state
        .courses
        .resolve_course(user_id, "CS 101", "Jones, K")
        .await
        .expect("resolve");

    assert_ne!(a.id, b.id);
    assert_eq!(gw.table(tables::COURSES).len(), 2);
}

#[tokio::test]
async fn test_duplicate_link_attempts_are_noops() {
    let gw = FakeGateway::new();
    let state = test_state(gw.clone());
    let user_id = Uuid::new_v4();

    let first = state
        .courses
        .resolve_course(user_id, "MATH 52", "Kim, A")
        .await
        .expect("first resolve");
    let second = state
        .courses
        .resolve_course(user_id, "math52", "Kim, A")
        .await
        .expect("second resolve");

    assert_eq!(first.id, second.id);
    assert_eq!(gw.table(tables::USER_COURSES).len(), 1);
}

#[tokio::test]
async fn test_lost_create_race_resolves_to_the_winner() {
    let gw = FakeGateway::new();
    let state = test_state(gw.clone());
    gw.race_next_course_insert.store(true, Ordering::SeqCst);

    let course = state
        .courses
        .resolve_course(Uuid::new_v4(), "CS 101", PROFESSOR)
        .await
        .expect("resolve survives the lost race");

    // Only the race winner's row exists, and that is the id we got.
    let rows = gw.table(tables::COURSES);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], serde_json::json!(course.id));
}

#[tokio::test]
async fn test_conflict_with_no_visible_row_is_fatal_after_one_requery() {
    let gw = FakeGateway::new();
    let state = test_state(gw.clone());
    gw.phantom_course_conflict.store(true, Ordering::SeqCst);

    let err = state
        .courses
        .resolve_course(Uuid::new_v4(), "CS 101", PROFESSOR)
        .await
        .unwrap_err();
    assert!(
        matches!(&err, Error::Conflict(label) if label == Error::COURSE_RESOLVE),
        "{err}"
    );
}

#[tokio::test]
async fn test_add_courses_links_current_and_previous_lists() {
    let gw = FakeGateway::new();
    let state = test_state(gw.clone());
    let user_id = Uuid::new_v4();

    let current = vec![
        CourseEntry::new("CS 101", "Smith, J"),
        CourseEntry::new("MATH 52", "Kim, A"),
    ];
    let previous = vec![CourseEntry::new("PHYS 7A", "Lee, B")];

    let resolved = state
        .courses
        .add_courses_for_user(user_id, &current, &previous)
        .await
        .expect("batch add");

    assert_eq!(resolved.len(), 3);
    assert_eq!(gw.table(tables::COURSES).len(), 3);
    assert_eq!(gw.table(tables::USER_COURSES).len(), 3);

    let linked = state
        .courses
        .courses_for_user(user_id)
        .await
        .expect("courses_for_user");
    assert_eq!(linked.len(), 3);
}

#[tokio::test]
async fn test_batch_spelling_variants_collapse_to_one_row() {
    let gw = FakeGateway::new();
    let state = test_state(gw.clone());
    let user_id = Uuid::new_v4();

    let current = vec![CourseEntry::new("CS 101", PROFESSOR)];
    let previous = vec![CourseEntry::new("cs-101", PROFESSOR)];

    let resolved = state
        .courses
        .add_courses_for_user(user_id, &current, &previous)
        .await
        .expect("batch add");

    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[0].id, resolved[1].id);
    assert_eq!(gw.table(tables::COURSES).len(), 1);
    assert_eq!(gw.table(tables::USER_COURSES).len(), 1);
}

#[tokio::test]
async fn test_batch_failure_keeps_partial_progress() {
    let gw = FakeGateway::new();
    let state = test_state(gw.clone());
    let user_id = Uuid::new_v4();

    // The "!!!" entry fails validation; the valid entry still resolves and
    // stays linked for the caller to skip on retry.
    let current = vec![
        CourseEntry::new("CS 101", PROFESSOR),
        CourseEntry::new("!!!", PROFESSOR),
    ];

    let err = state
        .courses
        .add_courses_for_user(user_id, &current, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    assert_eq!(gw.table(tables::COURSES).len(), 1);
    assert_eq!(gw.table(tables::USER_COURSES).len(), 1);
}

#[tokio::test]
async fn test_courses_for_user_empty() {
    let gw = FakeGateway::new();
    let state = test_state(gw);

    let linked = state
        .courses
        .courses_for_user(Uuid::new_v4())
        .await
        .expect("courses_for_user");
    assert!(linked.is_empty());
}

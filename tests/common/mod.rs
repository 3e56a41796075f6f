// SPDX-License-Identifier: MIT
// Copyright 2026 CourseLoop Developers

// Helpers are shared across test binaries; not every binary uses every knob.
#![allow(dead_code)]

//! Shared test harness: a deterministic in-memory backend gateway.
//!
//! The fake enforces the same uniqueness constraints the real backend holds
//! (profile usernames, course identity keys, user/course links) and offers
//! failure-injection knobs for the error-path tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use courseloop_core::config::Config;
use courseloop_core::error::{AuthReason, Error, Result};
use courseloop_core::gateway::{tables, BackendGateway, Filter, GatewaySession, Order};
use courseloop_core::time_utils::format_utc_rfc3339;
use courseloop_core::AppState;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

/// The code every OTP send "emails" in tests.
pub const TEST_OTP: &str = "424242";

/// Two-way handshake that holds `verify_otp` open mid-flight.
#[derive(Default)]
pub struct VerifyGate {
    /// Notified by the fake when a verification reaches the gateway.
    pub entered: Notify,
    /// Notified by the test to let the verification finish.
    pub release: Notify,
}

#[derive(Clone)]
struct IssuedOtp {
    code: String,
    expired: bool,
}

/// In-memory gateway standing in for the remote backend.
#[derive(Default)]
pub struct FakeGateway {
    rows: Mutex<HashMap<String, Vec<Value>>>,
    otps: Mutex<HashMap<String, IssuedOtp>>,
    /// Stable user id per email across sign-ins.
    users: Mutex<HashMap<String, Uuid>>,
    persisted: Mutex<Option<GatewaySession>>,
    verify_gate: Mutex<Option<Arc<VerifyGate>>>,

    pub send_otp_calls: AtomicUsize,
    pub increment_calls: AtomicUsize,

    /// Fail every `increment` with a network error.
    pub fail_increments: AtomicBool,
    /// Fail `sign_out` with a network error (after clearing the session).
    pub fail_sign_out: AtomicBool,
    /// Fail `current_session` with a network error.
    pub fail_current_session: AtomicBool,
    /// The next courses insert loses the create race to a competing row.
    pub race_next_course_insert: AtomicBool,
    /// Courses inserts conflict without any row becoming visible.
    pub phantom_course_conflict: AtomicBool,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Install the verification handshake for the sign-out-wins test.
    pub fn set_verify_gate(&self, gate: Arc<VerifyGate>) {
        *self.verify_gate.lock().unwrap() = Some(gate);
    }

    /// Mark the outstanding OTP for `email` as expired.
    pub fn expire_otp(&self, email: &str) {
        if let Some(otp) = self.otps.lock().unwrap().get_mut(email) {
            otp.expired = true;
        }
    }

    /// Seed a persisted backend session, as if a prior run signed in.
    pub fn seed_session(&self, user_id: Uuid) {
        *self.persisted.lock().unwrap() = Some(GatewaySession {
            user_id,
            expires_at: format_utc_rfc3339(Utc::now() + Duration::hours(1)),
        });
    }

    /// Seed an already-expired persisted session.
    pub fn seed_expired_session(&self, user_id: Uuid) {
        *self.persisted.lock().unwrap() = Some(GatewaySession {
            user_id,
            expires_at: format_utc_rfc3339(Utc::now() - Duration::hours(1)),
        });
    }

    /// Insert a row directly, bypassing constraints.
    pub fn seed_row(&self, table: &str, row: Value) {
        self.rows
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    /// Snapshot of a table's rows.
    pub fn table(&self, table: &str) -> Vec<Value> {
        self.rows
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    fn violates_unique(table: &str, existing: &[Value], row: &Value) -> bool {
        let same = |a: &Value, b: &Value, field: &str| match (field_str(a, field), field_str(b, field)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
        existing.iter().any(|r| match table {
            tables::PROFILES => same(r, row, "id") || same(r, row, "username"),
            tables::COURSES => {
                same(r, row, "course_code") && same(r, row, "professor_name")
            }
            tables::USER_COURSES => same(r, row, "user_id") && same(r, row, "course_id"),
            _ => same(r, row, "id"),
        })
    }
}

/// Stringify a row field the way the wire filters do.
fn field_str(row: &Value, field: &str) -> Option<String> {
    row.get(field).map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

fn matches_filters(row: &Value, filters: &[Filter]) -> bool {
    filters
        .iter()
        .all(|f| field_str(row, &f.field).as_deref() == Some(f.value.as_str()))
}

#[async_trait]
impl BackendGateway for FakeGateway {
    async fn send_otp(&self, email: &str) -> Result<()> {
        self.send_otp_calls.fetch_add(1, Ordering::SeqCst);
        self.users
            .lock()
            .unwrap()
            .entry(email.to_string())
            .or_insert_with(Uuid::new_v4);
        self.otps.lock().unwrap().insert(
            email.to_string(),
            IssuedOtp {
                code: TEST_OTP.to_string(),
                expired: false,
            },
        );
        Ok(())
    }

    async fn verify_otp(&self, email: &str, code: &str) -> Result<GatewaySession> {
        let gate = self.verify_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let otp = self
            .otps
            .lock()
            .unwrap()
            .get(email)
            .cloned()
            .ok_or(Error::Auth(AuthReason::InvalidCode))?;

        if otp.expired {
            return Err(Error::Auth(AuthReason::ExpiredCode));
        }
        if otp.code != code {
            return Err(Error::Auth(AuthReason::InvalidCode));
        }

        let user_id = *self
            .users
            .lock()
            .unwrap()
            .get(email)
            .expect("user created on send_otp");

        let session = GatewaySession {
            user_id,
            expires_at: format_utc_rfc3339(Utc::now() + Duration::hours(1)),
        };
        *self.persisted.lock().unwrap() = Some(session.clone());
        Ok(session)
    }

    async fn current_session(&self) -> Result<Option<GatewaySession>> {
        if self.fail_current_session.load(Ordering::SeqCst) {
            return Err(Error::Network("injected session read failure".to_string()));
        }
        Ok(self.persisted.lock().unwrap().clone())
    }

    async fn sign_out(&self) -> Result<()> {
        *self.persisted.lock().unwrap() = None;
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(Error::Network("injected sign-out failure".to_string()));
        }
        Ok(())
    }

    async fn select(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<Order>,
    ) -> Result<Vec<Value>> {
        let rows = self.rows.lock().unwrap();
        let mut selected: Vec<Value> = rows
            .get(table)
            .map(|all| {
                all.iter()
                    .filter(|row| matches_filters(row, filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = order {
            selected.sort_by(|a, b| {
                let a = field_str(a, &order.field).unwrap_or_default();
                let b = field_str(b, &order.field).unwrap_or_default();
                if order.descending {
                    b.cmp(&a)
                } else {
                    a.cmp(&b)
                }
            });
        }
        Ok(selected)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let mut rows = self.rows.lock().unwrap();
        let existing = rows.entry(table.to_string()).or_default();

        if table == tables::COURSES {
            if self.phantom_course_conflict.load(Ordering::SeqCst) {
                return Err(Error::conflict(Error::DUPLICATE_KEY));
            }
            if self.race_next_course_insert.swap(false, Ordering::SeqCst) {
                // A competing caller wins the race with its own row id.
                let mut racer = row.clone();
                racer["id"] = Value::String(Uuid::new_v4().to_string());
                existing.push(racer);
            }
        }

        if Self::violates_unique(table, existing, &row) {
            return Err(Error::conflict(Error::DUPLICATE_KEY));
        }

        existing.push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, patch: Value, filters: &[Filter]) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let Some(all) = rows.get_mut(table) else {
            return Ok(());
        };

        // Enforce username uniqueness on update too, as the backend would.
        if table == tables::PROFILES {
            if let Some(username) = patch.get("username") {
                let taken = all.iter().any(|r| {
                    r.get("username") == Some(username) && !matches_filters(r, filters)
                });
                if taken {
                    return Err(Error::conflict(Error::DUPLICATE_KEY));
                }
            }
        }

        let patch = patch.as_object().cloned().unwrap_or_default();
        for row in all.iter_mut().filter(|row| matches_filters(row, filters)) {
            if let Some(obj) = row.as_object_mut() {
                for (k, v) in &patch {
                    obj.insert(k.clone(), v.clone());
                }
            }
        }
        Ok(())
    }

    async fn increment(
        &self,
        table: &str,
        field: &str,
        filters: &[Filter],
        delta: i64,
    ) -> Result<()> {
        self.increment_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_increments.load(Ordering::SeqCst) {
            return Err(Error::Network("injected increment failure".to_string()));
        }

        let mut rows = self.rows.lock().unwrap();
        let Some(all) = rows.get_mut(table) else {
            return Ok(());
        };
        for row in all.iter_mut().filter(|row| matches_filters(row, filters)) {
            let current = row.get(field).and_then(Value::as_i64).unwrap_or(0);
            row[field] = Value::from(current + delta);
        }
        Ok(())
    }
}

/// Build the service stack against a fake gateway.
#[allow(dead_code)]
pub fn test_state(gateway: Arc<FakeGateway>) -> AppState {
    AppState::with_gateway(Config::default(), gateway).expect("test app state")
}

/// Drive the full OTP flow and return the signed-in user id.
#[allow(dead_code)]
pub async fn sign_in(state: &AppState, email: &str) -> Uuid {
    state
        .session
        .request_otp(email)
        .await
        .expect("request_otp should succeed");
    state
        .session
        .verify_otp(email, TEST_OTP)
        .await
        .expect("verify_otp should succeed");
    state
        .session
        .authenticated_user()
        .expect("authenticated after verify")
}

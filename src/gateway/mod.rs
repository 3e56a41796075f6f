//! Backend gateway boundary.
//!
//! The remote persistence + auth backend is consumed through the narrow
//! [`BackendGateway`] trait so every service takes an injected capability
//! instead of reaching for a global client. Production uses [`HttpGateway`];
//! tests inject a deterministic in-memory fake.

pub mod http;

pub use http::HttpGateway;

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Table names as constants.
pub mod tables {
    pub const PROFILES: &str = "profiles";
    pub const POSTS: &str = "posts";
    pub const COMMENTS: &str = "comments";
    pub const COURSES: &str = "courses";
    /// Many-to-many user/course links
    pub const USER_COURSES: &str = "user_courses";
}

/// Field-equality filter applied to select/update/increment calls.
///
/// Values are carried as strings, matching the wire shape of the REST
/// filter syntax (`field=eq.value`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub value: String,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl ToString) -> Self {
        Self {
            field: field.into(),
            value: value.to_string(),
        }
    }
}

/// Result ordering for select calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub field: String,
    pub descending: bool,
}

impl Order {
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }
}

/// Authenticated session material returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySession {
    pub user_id: Uuid,
    /// When the session expires (RFC 3339)
    pub expires_at: String,
}

/// Narrow contract over the remote persistence + auth backend.
///
/// Row payloads cross this seam as `serde_json::Value`; the services decode
/// them into typed models. `insert` may fail with [`Error::Conflict`] when a
/// backend uniqueness constraint rejects the row, and `increment` must be a
/// single backend-side atomic operation (a read-modify-write here would lose
/// updates under concurrent callers).
#[async_trait::async_trait]
pub trait BackendGateway: Send + Sync {
    // ─── Auth ────────────────────────────────────────────────────
    async fn send_otp(&self, email: &str) -> Result<()>;
    async fn verify_otp(&self, email: &str, code: &str) -> Result<GatewaySession>;
    async fn current_session(&self) -> Result<Option<GatewaySession>>;
    async fn sign_out(&self) -> Result<()>;

    // ─── Rows ────────────────────────────────────────────────────
    async fn select(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<Order>,
    ) -> Result<Vec<Value>>;
    async fn insert(&self, table: &str, row: Value) -> Result<Value>;
    async fn update(&self, table: &str, patch: Value, filters: &[Filter]) -> Result<()>;

    // ─── Atomic counter ──────────────────────────────────────────
    async fn increment(&self, table: &str, field: &str, filters: &[Filter], delta: i64)
        -> Result<()>;
}

/// Decode one row returned by the gateway into a typed model.
pub(crate) fn decode_row<T: DeserializeOwned>(table: &str, row: Value) -> Result<T> {
    serde_json::from_value(row)
        .map_err(|e| Error::Internal(anyhow::anyhow!("failed to decode {} row: {}", table, e)))
}

/// Decode every row of a select result.
pub(crate) fn decode_rows<T: DeserializeOwned>(table: &str, rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter().map(|row| decode_row(table, row)).collect()
}

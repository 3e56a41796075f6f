// SPDX-License-Identifier: MIT
// Copyright 2026 CourseLoop Developers

//! HTTP implementation of the backend gateway.
//!
//! Speaks a PostgREST-style REST dialect: row access under `/rest/v1/{table}`
//! with `field=eq.value` filters, auth under `/auth/v1/*`, and the atomic
//! counter as an `/rest/v1/rpc/increment_field` call. The signed-in user's
//! access token lives here, not in the session manager; the embedding app can
//! read it back for persistence across runs.

use crate::config::Config;
use crate::error::{AuthReason, Error, Result};
use crate::gateway::{BackendGateway, Filter, GatewaySession, Order};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::RwLock;
use uuid::Uuid;

/// Session TTL assumed for seeded tokens that carry no expiry of their own.
const DEFAULT_SESSION_TTL_SECS: i64 = 3600;

/// Access token plus what we know about its lifetime.
#[derive(Debug, Clone)]
struct StoredSession {
    access_token: String,
    expires_at: Option<String>,
}

/// Production gateway over the remote backend's REST + auth API.
pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    session: RwLock<Option<StoredSession>>,
}

impl HttpGateway {
    /// Create a gateway from configuration.
    ///
    /// A `session_token` in the config seeds the stored session so
    /// `current_session` can revalidate it on process start.
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::Internal(anyhow::anyhow!("failed to build HTTP client: {}", e)))?;

        let session = config.session_token.as_ref().map(|token| StoredSession {
            access_token: token.clone(),
            expires_at: None,
        });

        tracing::info!(base_url = %config.backend_url, "Backend gateway initialized");

        Ok(Self {
            http,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
            api_key: config.backend_api_key.clone(),
            session: RwLock::new(session),
        })
    }

    /// The current access token, for the embedding app to persist.
    pub fn session_token(&self) -> Option<String> {
        self.read_session().map(|s| s.access_token)
    }

    fn read_session(&self) -> Option<StoredSession> {
        self.session
            .read()
            .expect("session lock poisoned")
            .clone()
    }

    fn store_session(&self, session: Option<StoredSession>) {
        *self.session.write().expect("session lock poisoned") = session;
    }

    /// Bearer token for row access: the user token when signed in, the anon
    /// key otherwise.
    fn bearer(&self) -> String {
        self.read_session()
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.api_key.clone())
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, endpoint: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, endpoint)
    }

    fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
        filters
            .iter()
            .map(|f| (f.field.clone(), format!("eq.{}", f.value)))
            .collect()
    }

    fn transport_err(e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Network(Error::TIMED_OUT.to_string())
        } else {
            Error::Network(e.to_string())
        }
    }

    /// Map a non-success response to the error taxonomy.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        // Unique-constraint violations surface as 409, or as the backend's
        // duplicate-key error code in the body.
        if status.as_u16() == 409 || body.contains("23505") {
            return Err(Error::conflict(Error::DUPLICATE_KEY));
        }

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::Auth(AuthReason::NotAuthenticated));
        }

        if status.as_u16() == 404 {
            return Err(Error::NotFound(body));
        }

        Err(Error::Network(format!("HTTP {}: {}", status, body)))
    }

    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T> {
        Self::check_response(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Network(format!("JSON parse error: {}", e)))
    }
}

/// Payload of a successful OTP verification.
#[derive(Debug, Deserialize)]
struct VerifyResponse {
    access_token: String,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: AuthUserPayload,
}

#[derive(Debug, Deserialize)]
struct AuthUserPayload {
    id: Uuid,
}

impl VerifyResponse {
    fn expiry_rfc3339(&self) -> String {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .unwrap_or_else(|| {
                Utc::now() + Duration::seconds(self.expires_in.unwrap_or(DEFAULT_SESSION_TTL_SECS))
            });
        format_utc_rfc3339(expires_at)
    }
}

#[async_trait::async_trait]
impl BackendGateway for HttpGateway {
    async fn send_otp(&self, email: &str) -> Result<()> {
        let response = self
            .http
            .post(self.auth_url("otp"))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "create_user": true }))
            .send()
            .await
            .map_err(Self::transport_err)?;

        Self::check_response(response).await?;
        tracing::debug!("OTP send accepted by backend");
        Ok(())
    }

    async fn verify_otp(&self, email: &str, code: &str) -> Result<GatewaySession> {
        let response = self
            .http
            .post(self.auth_url("verify"))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "type": "email", "email": email, "token": code }))
            .send()
            .await
            .map_err(Self::transport_err)?;

        // Rejections from this endpoint mean the code itself was bad; the
        // backend reports expiry distinctly in the body.
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if body.contains("expired") {
                return Err(Error::Auth(AuthReason::ExpiredCode));
            }
            if matches!(status.as_u16(), 400 | 401 | 403 | 422) {
                return Err(Error::Auth(AuthReason::InvalidCode));
            }
            return Err(Error::Network(format!("HTTP {}: {}", status, body)));
        }

        let verified: VerifyResponse = response
            .json()
            .await
            .map_err(|e| Error::Network(format!("JSON parse error: {}", e)))?;

        let expires_at = verified.expiry_rfc3339();
        self.store_session(Some(StoredSession {
            access_token: verified.access_token,
            expires_at: Some(expires_at.clone()),
        }));

        Ok(GatewaySession {
            user_id: verified.user.id,
            expires_at,
        })
    }

    async fn current_session(&self) -> Result<Option<GatewaySession>> {
        let Some(stored) = self.read_session() else {
            return Ok(None);
        };

        let response = self
            .http
            .get(self.auth_url("user"))
            .header("apikey", &self.api_key)
            .bearer_auth(&stored.access_token)
            .send()
            .await
            .map_err(Self::transport_err)?;

        // A rejected token is "no session", not an error; drop it locally.
        if matches!(response.status().as_u16(), 401 | 403) {
            self.store_session(None);
            return Ok(None);
        }

        let user: AuthUserPayload = Self::check_response_json(response).await?;

        let expires_at = stored.expires_at.clone().unwrap_or_else(|| {
            // Seeded tokens carry no expiry; assume the default TTL.
            format_utc_rfc3339(Utc::now() + Duration::seconds(DEFAULT_SESSION_TTL_SECS))
        });

        Ok(Some(GatewaySession {
            user_id: user.id,
            expires_at,
        }))
    }

    async fn sign_out(&self) -> Result<()> {
        // Clear the stored token before talking to the backend so a failed
        // remote call can never leave stale credentials behind.
        let Some(stored) = self.read_session() else {
            return Ok(());
        };
        self.store_session(None);

        let response = self
            .http
            .post(self.auth_url("logout"))
            .header("apikey", &self.api_key)
            .bearer_auth(&stored.access_token)
            .send()
            .await
            .map_err(Self::transport_err)?;

        Self::check_response(response).await?;
        Ok(())
    }

    async fn select(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<Order>,
    ) -> Result<Vec<Value>> {
        let mut params = Self::filter_params(filters);
        if let Some(order) = order {
            let direction = if order.descending { "desc" } else { "asc" };
            params.push(("order".to_string(), format!("{}.{}", order.field, direction)));
        }

        let response = self
            .http
            .get(self.rest_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(self.bearer())
            .query(&params)
            .send()
            .await
            .map_err(Self::transport_err)?;

        Self::check_response_json(response).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let response = self
            .http
            .post(self.rest_url(table))
            .header("apikey", &self.api_key)
            .header("Prefer", "return=representation")
            .bearer_auth(self.bearer())
            .json(&row)
            .send()
            .await
            .map_err(Self::transport_err)?;

        let created: Value = Self::check_response_json(response).await?;

        // The REST dialect echoes inserts back as a one-element array.
        match created {
            Value::Array(rows) => rows.into_iter().next().ok_or_else(|| {
                Error::Internal(anyhow::anyhow!("insert into {} returned no row", table))
            }),
            other => Ok(other),
        }
    }

    async fn update(&self, table: &str, patch: Value, filters: &[Filter]) -> Result<()> {
        let response = self
            .http
            .patch(self.rest_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(self.bearer())
            .query(&Self::filter_params(filters))
            .json(&patch)
            .send()
            .await
            .map_err(Self::transport_err)?;

        Self::check_response(response).await?;
        Ok(())
    }

    async fn increment(
        &self,
        table: &str,
        field: &str,
        filters: &[Filter],
        delta: i64,
    ) -> Result<()> {
        let matches: serde_json::Map<String, Value> = filters
            .iter()
            .map(|f| (f.field.clone(), Value::String(f.value.clone())))
            .collect();

        let response = self
            .http
            .post(format!("{}/rest/v1/rpc/increment_field", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(self.bearer())
            .json(&serde_json::json!({
                "tbl": table,
                "col": field,
                "delta": delta,
                "match": matches,
            }))
            .send()
            .await
            .map_err(Self::transport_err)?;

        Self::check_response(response).await?;
        Ok(())
    }
}

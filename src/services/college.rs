// SPDX-License-Identifier: MIT
// Copyright 2026 CourseLoop Developers

//! College directory lookup client.
//!
//! A stateless, read-only passthrough to the college-scorecard API, used
//! during onboarding to pick a university. Strictly best-effort: every
//! failure degrades to an empty result, so the caller cannot tell "no
//! matches" from "lookup failed".

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::college::{College, CollegeResponse};

/// Fields requested from the lookup API.
const COLLEGE_FIELDS: &str = "id,school.name,school.city,school.state";

pub struct CollegeDirectory {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CollegeDirectory {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::Internal(anyhow::anyhow!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.college_api_url.clone(),
            api_key: config.college_api_key.clone(),
        })
    }

    /// Search colleges by name. Never raises; an empty query short-circuits
    /// with no network call.
    pub async fn search(&self, query: &str) -> Vec<College> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        match self.fetch(query).await {
            Ok(colleges) => colleges,
            Err(e) => {
                tracing::warn!(error = %e, "college search failed; returning no matches");
                Vec::new()
            }
        }
    }

    async fn fetch(&self, query: &str) -> Result<Vec<College>> {
        let url = format!(
            "{}?api_key={}&fields={}&school.name={}",
            self.base_url,
            self.api_key,
            COLLEGE_FIELDS,
            urlencoding::encode(query)
        );

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Network(format!("HTTP {}", response.status())));
        }

        let body: CollegeResponse = response
            .json()
            .await
            .map_err(|e| Error::Network(format!("JSON parse error: {}", e)))?;

        Ok(body.results)
    }
}

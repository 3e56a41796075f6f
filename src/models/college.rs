// SPDX-License-Identifier: MIT
// Copyright 2026 CourseLoop Developers

//! College lookup API response models.
//!
//! These mirror the college-scorecard wire format, where nested fields come
//! back dot-flattened (`school.name`) and ids may be numbers or strings.

use serde::{Deserialize, Deserializer};

/// A college returned by the lookup API. Never persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct College {
    #[serde(deserialize_with = "id_to_string")]
    pub id: String,
    #[serde(rename = "school.name")]
    pub name: String,
    #[serde(rename = "school.city", default)]
    pub city: Option<String>,
    #[serde(rename = "school.state", default)]
    pub state: Option<String>,
}

/// Full search response: pagination metadata plus the result page.
#[derive(Debug, Clone, Deserialize)]
pub struct CollegeResponse {
    pub metadata: CollegeMetadata,
    pub results: Vec<College>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollegeMetadata {
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// The API serves ids as integers in some datasets and strings in others.
fn id_to_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Num(i64),
        Str(String),
    }

    Ok(match IdRepr::deserialize(deserializer)? {
        IdRepr::Num(n) => n.to_string(),
        IdRepr::Str(s) => s,
    })
}

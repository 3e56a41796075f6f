//! Application configuration loaded from environment variables.
//!
//! The backend anon key is a publishable credential; the college lookup key
//! is optional because the directory client degrades to empty results.

use std::env;

/// Default institutional email suffix accepted for OTP sign-in.
const DEFAULT_EMAIL_DOMAIN: &str = ".edu";

/// Default per-request timeout for backend calls, in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend project URL (e.g. `https://xyzproject.example.co`)
    pub backend_url: String,
    /// Publishable (anon) API key for the backend
    pub backend_api_key: String,
    /// Session token the embedding app persisted from a previous run, if any
    pub session_token: Option<String>,
    /// Institutional email suffixes accepted for OTP sign-in
    pub allowed_email_domains: Vec<String>,
    /// College lookup API base URL
    pub college_api_url: String,
    /// College lookup API key (empty key degrades search to "no matches")
    pub college_api_key: String,
    /// Per-request timeout for backend and lookup calls, in seconds
    pub request_timeout_secs: u64,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:54321".to_string(),
            backend_api_key: "test_anon_key".to_string(),
            session_token: None,
            allowed_email_domains: vec![DEFAULT_EMAIL_DOMAIN.to_string()],
            college_api_url: "http://localhost:54321/colleges".to_string(),
            college_api_key: "test_college_key".to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// `BACKEND_URL` and `BACKEND_API_KEY` are required; everything else has
    /// a workable default.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            backend_url: env::var("BACKEND_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("BACKEND_URL"))?,
            backend_api_key: env::var("BACKEND_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("BACKEND_API_KEY"))?,
            session_token: env::var("SESSION_TOKEN")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            allowed_email_domains: env::var("ALLOWED_EMAIL_DOMAINS")
                .map(|v| parse_domain_list(&v))
                .unwrap_or_else(|_| vec![DEFAULT_EMAIL_DOMAIN.to_string()]),
            college_api_url: env::var("COLLEGE_API_URL").unwrap_or_else(|_| {
                "https://api.data.gov/ed/collegescorecard/v1/schools".to_string()
            }),
            college_api_key: env::var("COLLEGE_API_KEY").unwrap_or_default(),
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| DEFAULT_REQUEST_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        })
    }
}

/// Parse a comma-separated suffix list, keeping each entry dot-prefixed.
fn parse_domain_list(raw: &str) -> Vec<String> {
    let domains: Vec<String> = raw
        .split(',')
        .map(|d| d.trim().to_ascii_lowercase())
        .filter(|d| !d.is_empty())
        .map(|d| {
            if d.starts_with('.') {
                d
            } else {
                format!(".{}", d)
            }
        })
        .collect();

    if domains.is_empty() {
        vec![DEFAULT_EMAIL_DOMAIN.to_string()]
    } else {
        domains
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

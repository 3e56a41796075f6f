// SPDX-License-Identifier: MIT
// Copyright 2026 CourseLoop Developers

//! Application error types shared across all services.

use std::fmt;

/// Why an authentication operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthReason {
    /// The submitted code does not match the outstanding OTP.
    InvalidCode,
    /// The outstanding OTP expired before it was verified.
    ExpiredCode,
    /// Verification was attempted with no outstanding OTP context.
    NoPendingOtp,
    /// An operation that requires a session was called while signed out.
    NotAuthenticated,
}

impl fmt::Display for AuthReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            AuthReason::InvalidCode => "invalid verification code",
            AuthReason::ExpiredCode => "verification code expired",
            AuthReason::NoPendingOtp => "no verification in progress",
            AuthReason::NotAuthenticated => "not signed in",
        };
        f.write_str(msg)
    }
}

/// Application error type.
///
/// Validation and Conflict are terminal for the call and reported verbatim;
/// Network is the only class a caller may retry as-is.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("authentication failed: {0}")]
    Auth(AuthReason),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl Error {
    /// Conflict label for a username already owned by a different user.
    pub const USERNAME_TAKEN: &'static str = "username_taken";
    /// Conflict label for an exhausted course find-or-create re-query.
    pub const COURSE_RESOLVE: &'static str = "course_resolve";
    /// Conflict label the gateway reports for a uniqueness violation.
    pub const DUPLICATE_KEY: &'static str = "duplicate_key";
    /// Network message for a request that hit the client timeout.
    pub const TIMED_OUT: &'static str = "request timed out";

    /// Build a conflict error from one of the label constants.
    pub fn conflict(label: &str) -> Self {
        Error::Conflict(label.to_string())
    }

    /// Whether the caller may retry the failed call as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_))
    }

    /// Whether this is the gateway-level duplicate-key conflict.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Error::Conflict(label) if label == Self::DUPLICATE_KEY)
    }

    /// Whether the request was aborted by the client-side timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Network(msg) if msg.contains(Self::TIMED_OUT))
    }
}

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, Error>;

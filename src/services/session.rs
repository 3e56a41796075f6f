// SPDX-License-Identifier: MIT
// Copyright 2026 CourseLoop Developers

//! Session lifecycle: email-OTP login, session restoration, sign-out.
//!
//! The manager owns the only mutable session state in the process and is its
//! single writer. Operations do their network work first and commit state in
//! short, await-free critical sections; a sign-out epoch enforces the
//! "sign-out wins" ordering rule, discarding authenticated transitions that
//! complete after a later sign-out.

use crate::error::{AuthReason, Error, Result};
use crate::gateway::{BackendGateway, GatewaySession};
use crate::models::Profile;
use crate::services::profile::fetch_profile;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// The process-local authenticated session.
///
/// At most one exists at a time; created on OTP verification or restored
/// from backend state, destroyed on sign-out or expiry.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn from_gateway(gs: &GatewaySession) -> Result<Self> {
        let expires_at = DateTime::parse_from_rfc3339(&gs.expires_at)
            .map_err(|e| {
                Error::Internal(anyhow::anyhow!("failed to parse session expiry: {}", e))
            })?
            .with_timezone(&Utc);

        Ok(Self {
            user_id: gs.user_id,
            issued_at: Utc::now(),
            expires_at,
        })
    }

    fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Internal state machine: SignedOut -> OtpSent -> Authenticated -> SignedOut.
enum AuthState {
    SignedOut,
    OtpSent { email: String },
    Authenticated { session: Session, profile: Option<Profile> },
}

/// Caller-facing snapshot of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    SignedOut,
    OtpSent,
    Authenticated { user_id: Uuid, profile_known: bool },
}

/// Owns authentication state and the OTP login flow.
pub struct SessionManager {
    gateway: Arc<dyn BackendGateway>,
    allowed_email_domains: Vec<String>,
    state: Mutex<AuthState>,
    /// Bumped on every sign-out; in-flight logins that started before the
    /// bump discard their result.
    signout_epoch: AtomicU64,
}

impl SessionManager {
    pub fn new(gateway: Arc<dyn BackendGateway>, allowed_email_domains: Vec<String>) -> Self {
        Self {
            gateway,
            allowed_email_domains,
            state: Mutex::new(AuthState::SignedOut),
            signout_epoch: AtomicU64::new(0),
        }
    }

    /// Restore a previously persisted session on process start.
    ///
    /// A missing profile is not an error (the user may be auth-verified but
    /// not yet onboarded); any backend failure lands in `SignedOut`.
    pub async fn restore_session(&self) -> Result<SessionStatus> {
        let epoch = self.signout_epoch.load(Ordering::Acquire);

        let restored = match self.gateway.current_session().await {
            Ok(restored) => restored,
            Err(e) => {
                // Never trust a partially-read session.
                self.force_signed_out();
                return Err(e);
            }
        };

        let Some(gs) = restored else {
            self.force_signed_out();
            return Ok(SessionStatus::SignedOut);
        };

        let session = match Session::from_gateway(&gs) {
            Ok(session) => session,
            Err(e) => {
                self.force_signed_out();
                return Err(e);
            }
        };

        if session.is_expired() {
            tracing::info!(user_id = %session.user_id, "persisted session expired");
            self.force_signed_out();
            return Ok(SessionStatus::SignedOut);
        }

        let profile = match self.load_profile(session.user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                self.force_signed_out();
                return Err(e);
            }
        };

        Ok(self.commit_authenticated(epoch, session, profile))
    }

    /// Send a login code to an institutional email address.
    ///
    /// The domain allow-list check happens before any network call.
    pub async fn request_otp(&self, email: &str) -> Result<SessionStatus> {
        let email = validate_email(&self.allowed_email_domains, email)?;

        if matches!(*self.lock_state(), AuthState::Authenticated { .. }) {
            return Err(Error::Validation("already signed in".to_string()));
        }

        self.gateway.send_otp(&email).await?;
        tracing::info!("login code sent");

        // Re-requesting replaces the outstanding OTP context; there is never
        // more than one.
        *self.lock_state() = AuthState::OtpSent { email };
        Ok(SessionStatus::OtpSent)
    }

    /// Verify the emailed code and enter `Authenticated`.
    ///
    /// A wrong or expired code keeps the OTP context so the user can retry;
    /// every other failure lands in `SignedOut`.
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<SessionStatus> {
        // Snapshot the epoch before anything else so a sign-out anywhere
        // during this call discards the result.
        let epoch = self.signout_epoch.load(Ordering::Acquire);
        let email = email.trim().to_ascii_lowercase();

        {
            let state = self.lock_state();
            match &*state {
                AuthState::OtpSent { email: pending } if *pending == email => {}
                _ => return Err(Error::Auth(AuthReason::NoPendingOtp)),
            }
        }

        let verified = match self.gateway.verify_otp(&email, code).await {
            Ok(verified) => verified,
            Err(e @ Error::Auth(_)) => return Err(e),
            Err(e) => {
                self.force_signed_out();
                return Err(e);
            }
        };

        let session = match Session::from_gateway(&verified) {
            Ok(session) => session,
            Err(e) => {
                self.force_signed_out();
                return Err(e);
            }
        };

        let profile = match self.load_profile(session.user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                self.force_signed_out();
                return Err(e);
            }
        };

        Ok(self.commit_authenticated(epoch, session, profile))
    }

    /// Sign out. Local state is cleared first and unconditionally; a failed
    /// backend invalidation is logged, never surfaced.
    pub async fn sign_out(&self) -> Result<()> {
        self.signout_epoch.fetch_add(1, Ordering::AcqRel);
        *self.lock_state() = AuthState::SignedOut;

        if let Err(e) = self.gateway.sign_out().await {
            tracing::warn!(error = %e, "backend sign-out failed; local session cleared anyway");
        }
        Ok(())
    }

    /// Re-fetch the authenticated user's profile (e.g. after onboarding).
    pub async fn refresh_profile(&self) -> Result<SessionStatus> {
        let user_id = self.authenticated_user()?;
        let epoch = self.signout_epoch.load(Ordering::Acquire);

        let profile = self.load_profile(user_id).await?;

        let mut state = self.lock_state();
        if self.signout_epoch.load(Ordering::Acquire) != epoch {
            return Ok(SessionStatus::SignedOut);
        }
        if let AuthState::Authenticated { session, profile: slot } = &mut *state {
            *slot = profile;
            return Ok(SessionStatus::Authenticated {
                user_id: session.user_id,
                profile_known: slot.is_some(),
            });
        }
        Ok(SessionStatus::SignedOut)
    }

    /// Current state snapshot.
    pub fn status(&self) -> SessionStatus {
        match &*self.lock_state() {
            AuthState::SignedOut => SessionStatus::SignedOut,
            AuthState::OtpSent { .. } => SessionStatus::OtpSent,
            AuthState::Authenticated { session, profile } => SessionStatus::Authenticated {
                user_id: session.user_id,
                profile_known: profile.is_some(),
            },
        }
    }

    /// The signed-in user's id; the identity source for authorship and
    /// course linking.
    pub fn authenticated_user(&self) -> Result<Uuid> {
        match &*self.lock_state() {
            AuthState::Authenticated { session, .. } => Ok(session.user_id),
            _ => Err(Error::Auth(AuthReason::NotAuthenticated)),
        }
    }

    /// The signed-in user's profile, if already provisioned.
    pub fn current_profile(&self) -> Option<Profile> {
        match &*self.lock_state() {
            AuthState::Authenticated { profile, .. } => profile.clone(),
            _ => None,
        }
    }

    async fn load_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        match fetch_profile(self.gateway.as_ref(), user_id).await {
            Ok(profile) => Ok(Some(profile)),
            // Auth-verified but not yet onboarded.
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Commit the `Authenticated` transition unless a sign-out happened
    /// while the login was in flight.
    fn commit_authenticated(
        &self,
        epoch: u64,
        session: Session,
        profile: Option<Profile>,
    ) -> SessionStatus {
        let mut state = self.lock_state();
        if self.signout_epoch.load(Ordering::Acquire) != epoch {
            tracing::info!(
                user_id = %session.user_id,
                "discarding login completed after sign-out"
            );
            return SessionStatus::SignedOut;
        }

        let status = SessionStatus::Authenticated {
            user_id: session.user_id,
            profile_known: profile.is_some(),
        };
        *state = AuthState::Authenticated { session, profile };
        status
    }

    fn force_signed_out(&self) {
        *self.lock_state() = AuthState::SignedOut;
    }

    fn lock_state(&self) -> MutexGuard<'_, AuthState> {
        self.state.lock().expect("session state lock poisoned")
    }
}

/// Lowercase and allow-list check; runs before any network call.
fn validate_email(allowed_domains: &[String], raw: &str) -> Result<String> {
    let email = raw.trim().to_ascii_lowercase();

    let Some((local, domain)) = email.split_once('@') else {
        return Err(Error::Validation("malformed email address".to_string()));
    };
    if local.is_empty() || domain.is_empty() {
        return Err(Error::Validation("malformed email address".to_string()));
    }

    if !allowed_domains.iter().any(|suffix| domain.ends_with(suffix.as_str())) {
        return Err(Error::Validation(format!(
            "use your university email address ({})",
            allowed_domains.join(", ")
        )));
    }

    Ok(email)
}

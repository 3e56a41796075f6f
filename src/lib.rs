// SPDX-License-Identifier: MIT
// Copyright 2026 CourseLoop Developers

//! CourseLoop core: the identity and data-consistency layer behind the
//! anonymous campus discussion app.
//!
//! This crate owns the parts with real invariants: the email-OTP session
//! state machine, profile provisioning, course catalog find-or-create under
//! concurrency, and engagement-counter synchronization against a remote
//! persistence backend. UI, navigation, and the backend storage engine live
//! elsewhere; the backend is consumed through the narrow
//! [`gateway::BackendGateway`] capability injected into every service.

pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod services;
pub mod time_utils;

use config::Config;
use error::Result;
use gateway::{BackendGateway, HttpGateway};
use services::{
    CollegeDirectory, CourseCatalogService, EngagementService, ProfileService, SessionManager,
};
use std::sync::Arc;

/// Shared application state: every service wired to one backend gateway.
pub struct AppState {
    pub config: Config,
    pub session: SessionManager,
    pub profiles: ProfileService,
    pub courses: CourseCatalogService,
    pub engagement: EngagementService,
    pub colleges: CollegeDirectory,
}

impl AppState {
    /// Build the full service stack against the production HTTP gateway.
    pub fn new(config: Config) -> Result<Self> {
        let gateway: Arc<dyn BackendGateway> = Arc::new(HttpGateway::new(&config)?);
        Self::with_gateway(config, gateway)
    }

    /// Build the service stack against an injected gateway.
    ///
    /// Tests pass a deterministic in-memory fake here.
    pub fn with_gateway(config: Config, gateway: Arc<dyn BackendGateway>) -> Result<Self> {
        let session = SessionManager::new(gateway.clone(), config.allowed_email_domains.clone());
        let profiles = ProfileService::new(gateway.clone());
        let courses = CourseCatalogService::new(gateway.clone());
        let engagement = EngagementService::new(gateway);
        let colleges = CollegeDirectory::new(&config)?;

        Ok(Self {
            config,
            session,
            profiles,
            courses,
            engagement,
            colleges,
        })
    }
}

/// Initialize structured JSON logging, env-filter driven.
///
/// For the embedding app's startup path; the library itself never installs a
/// subscriber on its own.
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("courseloop_core=debug".parse().expect("valid directive"))
                .add_directive("info".parse().expect("valid directive")),
        )
        .with(format)
        .init();
}

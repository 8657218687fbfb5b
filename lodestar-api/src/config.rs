//! API Configuration Module
//!
//! Server, CORS and upstream client settings. Configuration is loaded from
//! environment variables with sensible defaults for development.

use std::time::Duration;

use crate::error::{ApiError, ApiResult};

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// Which document store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

impl StoreBackend {
    pub fn parse(raw: &str) -> ApiResult<Self> {
        match raw.trim().to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(ApiError::invalid_input(format!(
                "Unknown store backend: {}",
                other
            ))),
        }
    }
}

/// API configuration for CORS, request limits and startup behaviour.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    /// Upper bound on a single request, refresh included.
    pub request_timeout: Duration,

    pub store_backend: StoreBackend,

    /// Rebuild the document store from the repository when it starts empty.
    pub refresh_on_startup: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_max_age_secs: 86400, // 24 hours
            request_timeout: Duration::from_secs(300),
            store_backend: StoreBackend::Postgres,
            refresh_on_startup: true,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `LODESTAR_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `LODESTAR_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `LODESTAR_REQUEST_TIMEOUT_SECS`: Per-request timeout (default: 300)
    /// - `LODESTAR_STORE`: "memory" or "postgres" (default: postgres)
    /// - `LODESTAR_REFRESH_ON_STARTUP`: "true" or "false" (default: true)
    pub fn from_env() -> ApiResult<Self> {
        let cors_origins = std::env::var("LODESTAR_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_max_age_secs = std::env::var("LODESTAR_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(86400);

        let request_timeout = Duration::from_secs(
            std::env::var("LODESTAR_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
        );

        let store_backend = match std::env::var("LODESTAR_STORE") {
            Ok(raw) => StoreBackend::parse(&raw)?,
            Err(_) => StoreBackend::Postgres,
        };

        let refresh_on_startup = std::env::var("LODESTAR_REFRESH_ON_STARTUP")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        Ok(Self {
            cors_origins,
            cors_max_age_secs,
            request_timeout,
            store_backend,
            refresh_on_startup,
        })
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.cors_origins.is_empty() || self.cors_origins.iter().any(|o| o == origin)
    }
}

// ============================================================================
// UPSTREAM CLIENTS
// ============================================================================

/// Repository host (GitLab) connection settings.
#[derive(Debug, Clone)]
pub struct GitlabConfig {
    pub base_url: String,
    pub token: String,
    pub timeout: Duration,
}

impl Default for GitlabConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            token: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl GitlabConfig {
    /// - `LODESTAR_GITLAB_URL`, `LODESTAR_GITLAB_TOKEN`, `LODESTAR_GITLAB_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("LODESTAR_GITLAB_URL").unwrap_or(defaults.base_url),
            token: std::env::var("LODESTAR_GITLAB_TOKEN").unwrap_or_default(),
            timeout: std::env::var("LODESTAR_GITLAB_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }
}

/// Engagement API connection settings.
#[derive(Debug, Clone)]
pub struct EngagementApiConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for EngagementApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl EngagementApiConfig {
    /// - `LODESTAR_ENGAGEMENT_API_URL`, `LODESTAR_ENGAGEMENT_API_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("LODESTAR_ENGAGEMENT_API_URL").unwrap_or(defaults.base_url),
            timeout: std::env::var("LODESTAR_ENGAGEMENT_API_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }
}

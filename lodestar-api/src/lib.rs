//! Lodestar API - Artifact Reconciliation Service
//!
//! REST layer (Axum) over the reconciliation, refresh and query services.
//! Artifacts live in a queryable document store and, per engagement, as a
//! JSON snapshot in the engagement's git repository. Writes go to both;
//! refresh rebuilds the store from the repositories.

pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod macros;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use clients::{EngagementApiClient, GitlabClient, RetryPolicy};
pub use config::{ApiConfig, EngagementApiConfig, GitlabConfig, StoreBackend};
pub use db::{DbConfig, PgArtifactStore};
pub use error::{ApiError, ApiResult, ErrorCode};
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use services::{
    CommitOptions, EngagementLocks, Page, QueryService, ReconcileOutcome, ReconcileService,
    RefreshReport, RefreshService, SnapshotWriter,
};
pub use state::AppState;

//! OpenAPI Specification for the Lodestar Artifacts API
//!
//! Generated by utoipa from the route annotations and schema derives.

use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::routes::{artifact, health};
use crate::services::{ReconcileOutcome, RefreshFailure, RefreshReport};
use crate::telemetry::metrics;
use crate::types::BulkGroupResponse;
use lodestar_core::{Artifact, ArtifactCount};

/// OpenAPI document for the artifacts service.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Lodestar Artifacts API",
        version = "0.1.0",
        description = "Engagement artifacts kept consistent between the document store and per-engagement git repositories",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
    ),
    tags(
        (name = "Artifacts", description = "Artifact listing, reconciliation and refresh"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics"),
    ),
    paths(
        artifact::list_artifacts,
        artifact::count_artifacts,
        artifact::list_types,
        artifact::type_counts,
        artifact::engagement_counts,
        artifact::engagement_artifacts,
        artifact::update_engagement_artifacts,
        artifact::bulk_update,
        artifact::refresh,
        health::ping,
        health::readiness,
        metrics::metrics_handler,
    ),
    components(schemas(
        Artifact,
        ArtifactCount,
        ApiError,
        ErrorCode,
        ReconcileOutcome,
        RefreshReport,
        RefreshFailure,
        BulkGroupResponse,
        health::HealthResponse,
        health::HealthStatus,
        health::HealthDetails,
        health::ComponentHealth,
    ))
)]
pub struct ApiDoc;

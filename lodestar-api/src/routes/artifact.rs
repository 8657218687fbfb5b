//! Artifact REST API Routes
//!
//! Listing, counting, per-engagement replacement, bulk update and refresh
//! from the repository.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use lodestar_core::{Artifact, ArtifactCount};

use crate::error::ApiResult;
use crate::services::{CommitOptions, QueryService, ReconcileService, RefreshService};
use crate::state::AppState;
use crate::types::{count_options, list_options, regions, BulkGroupResponse, QueryPairs};

pub const X_PAGE: &str = "x-page";
pub const X_PER_PAGE: &str = "x-per-page";
pub const X_TOTAL_ARTIFACTS: &str = "x-total-artifacts";
pub const X_TOTAL_PAGES: &str = "x-total-pages";

fn header(headers: &mut HeaderMap, name: &'static str, value: u64) {
    headers.insert(HeaderName::from_static(name), HeaderValue::from(value));
}

// ============================================================================
// READ HANDLERS
// ============================================================================

/// GET /api/artifacts - Paged, filtered listing
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/artifacts",
    tag = "Artifacts",
    params(
        ("engagementUuid" = Option<String>, Query, description = "Filter by engagement"),
        ("type" = Option<String>, Query, description = "Filter by artifact type"),
        ("region" = Option<Vec<String>>, Query, description = "Filter by region (repeat or comma-separate)"),
        ("page" = Option<i64>, Query, description = "Zero-based page"),
        ("pageSize" = Option<i64>, Query, description = "Items per page"),
        ("sort" = Option<String>, Query, description = "field|DIR pairs, comma-separated"),
    ),
    responses(
        (status = 200, description = "Page of artifacts", body = Vec<Artifact>),
        (status = 400, description = "Invalid filter combination", body = crate::error::ApiError),
    ),
))]
pub async fn list_artifacts(
    State(query): State<Arc<QueryService>>,
    Query(pairs): Query<QueryPairs>,
) -> ApiResult<impl IntoResponse> {
    let options = list_options(&pairs)?;
    let page = query.list(&options).await?;

    let mut headers = HeaderMap::new();
    header(&mut headers, X_PAGE, page.page as u64);
    header(&mut headers, X_PER_PAGE, page.page_size as u64);
    header(&mut headers, X_TOTAL_ARTIFACTS, page.total);
    header(&mut headers, X_TOTAL_PAGES, page.total_pages);

    Ok((headers, Json(page.items)))
}

/// GET /api/artifacts/count - Count matching artifacts
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/artifacts/count",
    tag = "Artifacts",
    responses(
        (status = 200, description = "Matching artifact count", body = ArtifactCount),
        (status = 400, description = "Invalid filter combination", body = crate::error::ApiError),
    ),
))]
pub async fn count_artifacts(
    State(query): State<Arc<QueryService>>,
    Query(pairs): Query<QueryPairs>,
) -> ApiResult<Json<ArtifactCount>> {
    let count = query.count(&count_options(&pairs)).await?;
    Ok(Json(count))
}

/// GET /api/artifacts/types - Distinct artifact types
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/artifacts/types",
    tag = "Artifacts",
    responses((status = 200, description = "Sorted distinct types", body = Vec<String>)),
))]
pub async fn list_types(
    State(query): State<Arc<QueryService>>,
    Query(pairs): Query<QueryPairs>,
) -> ApiResult<Json<BTreeSet<String>>> {
    Ok(Json(query.types(&regions(&pairs)).await?))
}

/// GET /api/artifacts/types/count - Per-type counts
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/artifacts/types/count",
    tag = "Artifacts",
    responses((status = 200, description = "Counts by type, largest first", body = Vec<ArtifactCount>)),
))]
pub async fn type_counts(
    State(query): State<Arc<QueryService>>,
    Query(pairs): Query<QueryPairs>,
) -> ApiResult<Json<Vec<ArtifactCount>>> {
    Ok(Json(query.type_counts(&regions(&pairs)).await?))
}

/// GET /api/artifacts/engagements/count - Counts keyed by engagement uuid
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/artifacts/engagements/count",
    tag = "Artifacts",
    responses((status = 200, description = "Artifact count per engagement", body = BTreeMap<String, u64>)),
))]
pub async fn engagement_counts(
    State(query): State<Arc<QueryService>>,
) -> ApiResult<Json<BTreeMap<String, u64>>> {
    Ok(Json(query.engagement_counts().await?))
}

/// GET /api/artifacts/engagement/{engagementUuid} - One engagement's artifacts
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/artifacts/engagement/{engagementUuid}",
    tag = "Artifacts",
    params(("engagementUuid" = String, Path, description = "Engagement uuid")),
    responses((status = 200, description = "Artifacts, newest first", body = Vec<Artifact>)),
))]
pub async fn engagement_artifacts(
    State(query): State<Arc<QueryService>>,
    Path(engagement_uuid): Path<String>,
) -> ApiResult<Json<Vec<Artifact>>> {
    Ok(Json(query.by_engagement(&engagement_uuid).await?))
}

// ============================================================================
// WRITE HANDLERS
// ============================================================================

/// PUT /api/artifacts/engagement/{engagementUuid}/{region} - Replace an engagement's artifacts
#[cfg_attr(feature = "openapi", utoipa::path(
    put,
    path = "/api/artifacts/engagement/{engagementUuid}/{region}",
    tag = "Artifacts",
    params(
        ("engagementUuid" = String, Path, description = "Engagement uuid"),
        ("region" = String, Path, description = "Region stamped on items without one"),
        ("authorEmail" = Option<String>, Query, description = "Commit author email"),
        ("authorName" = Option<String>, Query, description = "Commit author name"),
        ("commitMessage" = Option<String>, Query, description = "Commit message"),
    ),
    request_body = Vec<Artifact>,
    responses(
        (status = 200, description = "Stored artifacts after reconciliation", body = Vec<Artifact>),
        (status = 400, description = "Validation failed", body = crate::error::ApiError),
        (status = 404, description = "Unknown engagement", body = crate::error::ApiError),
        (status = 502, description = "Repository write failed", body = crate::error::ApiError),
    ),
))]
pub async fn update_engagement_artifacts(
    State(reconcile): State<Arc<ReconcileService>>,
    Path((engagement_uuid, region)): Path<(String, String)>,
    Query(options): Query<CommitOptions>,
    Json(items): Json<Vec<Artifact>>,
) -> ApiResult<Json<Vec<Artifact>>> {
    let outcome = reconcile
        .reconcile_engagement(&engagement_uuid, Some(&region), items, &options)
        .await?;
    Ok(Json(outcome.artifacts))
}

/// PUT /api/artifacts - Reconcile artifacts of several engagements
#[cfg_attr(feature = "openapi", utoipa::path(
    put,
    path = "/api/artifacts",
    tag = "Artifacts",
    request_body = Vec<Artifact>,
    responses(
        (status = 200, description = "Result per engagement", body = Vec<BulkGroupResponse>),
        (status = 400, description = "Validation failed", body = crate::error::ApiError),
    ),
))]
pub async fn bulk_update(
    State(reconcile): State<Arc<ReconcileService>>,
    Query(options): Query<CommitOptions>,
    Json(items): Json<Vec<Artifact>>,
) -> ApiResult<Json<Vec<BulkGroupResponse>>> {
    let groups = reconcile.reconcile_bulk(items, &options).await?;
    Ok(Json(groups.into_iter().map(BulkGroupResponse::from).collect()))
}

/// PUT /api/artifacts/refresh - Purge the store and reload it from the repository
#[cfg_attr(feature = "openapi", utoipa::path(
    put,
    path = "/api/artifacts/refresh",
    tag = "Artifacts",
    responses(
        (status = 202, description = "Store reloaded", body = crate::services::RefreshReport),
        (status = 502, description = "Engagement directory unavailable", body = crate::error::ApiError),
    ),
))]
pub async fn refresh(State(service): State<Arc<RefreshService>>) -> ApiResult<impl IntoResponse> {
    service.purge().await?;
    let report = service.refresh().await?;

    let mut headers = HeaderMap::new();
    header(&mut headers, X_TOTAL_ARTIFACTS, report.total);

    Ok((StatusCode::ACCEPTED, headers, Json(report)))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the artifact routes router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_artifacts).put(bulk_update))
        .route("/count", get(count_artifacts))
        .route("/types", get(list_types))
        .route("/types/count", get(type_counts))
        .route("/engagements/count", get(engagement_counts))
        .route("/engagement/:engagement_uuid", get(engagement_artifacts))
        .route(
            "/engagement/:engagement_uuid/:region",
            put(update_engagement_artifacts),
        )
        .route("/refresh", put(refresh))
}

//! Request parsing and response types for the artifacts API.
//!
//! Query strings are taken as raw key/value pairs so that `region` can be
//! repeated as well as comma-separated.

use lodestar_core::{normalize_regions, CountOptions, ListOptions};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::services::{GroupResult, ReconcileOutcome};

/// Raw query string pairs in request order.
pub type QueryPairs = Vec<(String, String)>;

fn last_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn parse_int(pairs: &[(String, String)], key: &str) -> ApiResult<Option<i64>> {
    match last_value(pairs, key).map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| {
            ApiError::invalid_input(format!("{} must be an integer, got '{}'", key, raw))
                .with_details(serde_json::json!({ "field": key }))
        }),
    }
}

/// All `region` and `regions` values, comma lists expanded.
pub fn regions(pairs: &[(String, String)]) -> Vec<String> {
    let raw: Vec<String> = pairs
        .iter()
        .filter(|(k, _)| k == "region" || k == "regions")
        .map(|(_, v)| v.clone())
        .collect();
    normalize_regions(&raw)
}

pub fn count_options(pairs: &[(String, String)]) -> CountOptions {
    CountOptions {
        engagement_uuid: last_value(pairs, "engagementUuid").map(str::to_string),
        artifact_type: last_value(pairs, "type").map(str::to_string),
        regions: regions(pairs),
    }
}

pub fn list_options(pairs: &[(String, String)]) -> ApiResult<ListOptions> {
    Ok(ListOptions {
        filter: count_options(pairs),
        page: parse_int(pairs, "page")?,
        page_size: parse_int(pairs, "pageSize")?,
        sort: last_value(pairs, "sort").map(str::to_string),
    })
}

// ============================================================================
// RESPONSES
// ============================================================================

/// Result for one engagement of a bulk update.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct BulkGroupResponse {
    pub engagement_uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ReconcileOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl From<GroupResult> for BulkGroupResponse {
    fn from(group: GroupResult) -> Self {
        match group.result {
            Ok(outcome) => Self {
                engagement_uuid: group.engagement_uuid,
                outcome: Some(outcome),
                error: None,
            },
            Err(e) => Self {
                engagement_uuid: group.engagement_uuid,
                outcome: None,
                error: Some(e.into()),
            },
        }
    }
}

//! Engagement API client

use async_trait::async_trait;
use lodestar_core::{Engagement, RemoteError};
use lodestar_storage::EngagementDirectory;
use reqwest::StatusCode;

use crate::config::EngagementApiConfig;
use crate::error::{ApiError, ApiResult};

const SERVICE: &str = "engagement-api";

fn transport_error(err: reqwest::Error) -> RemoteError {
    if err.is_connect() || err.is_timeout() {
        RemoteError::Transient {
            service: SERVICE.to_string(),
            reason: err.to_string(),
        }
    } else {
        RemoteError::Fatal {
            service: SERVICE.to_string(),
            status: err.status().map(|s| s.as_u16()),
            reason: err.to_string(),
        }
    }
}

fn status_error(status: StatusCode, resource: &str) -> RemoteError {
    if status == StatusCode::NOT_FOUND {
        RemoteError::NotFound {
            resource: resource.to_string(),
        }
    } else {
        RemoteError::Fatal {
            service: SERVICE.to_string(),
            status: Some(status.as_u16()),
            reason: format!("{} returned {}", resource, status),
        }
    }
}

/// [`EngagementDirectory`] backed by the engagement service's v2 API.
#[derive(Debug, Clone)]
pub struct EngagementApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl EngagementApiClient {
    pub fn new(config: &EngagementApiConfig) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::internal_error(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v2/engagements{}", self.base_url, path)
    }
}

#[async_trait]
impl EngagementDirectory for EngagementApiClient {
    async fn list_engagements(&self) -> Result<Vec<Engagement>, RemoteError> {
        let response = self
            .http
            .get(self.url(""))
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(response.status(), "engagements"));
        }
        response.json().await.map_err(transport_error)
    }

    async fn get_engagement(&self, engagement_uuid: &str) -> Result<Engagement, RemoteError> {
        let path = format!("/{}", urlencoding::encode(engagement_uuid));
        let response = self
            .http
            .get(self.url(&path))
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(
                response.status(),
                &format!("engagement {}", engagement_uuid),
            ));
        }
        response.json().await.map_err(transport_error)
    }

    async fn update_artifact_count(
        &self,
        engagement_uuid: &str,
        count: usize,
    ) -> Result<(), RemoteError> {
        let path = format!("/{}/artifacts/{}", urlencoding::encode(engagement_uuid), count);
        let response = self
            .http
            .put(self.url(&path))
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(
                response.status(),
                &format!("engagement {}", engagement_uuid),
            ));
        }
        Ok(())
    }
}

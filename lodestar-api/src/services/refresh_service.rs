//! Refresh Orchestrator
//!
//! Rebuilds the document store from the repository snapshots of every
//! known engagement. Each engagement loads in isolation; one bad snapshot
//! is reported and the rest still load.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use lodestar_core::{
    Artifact, ArtifactFilter, ArtifactsConfig, Engagement, LodestarError, LodestarResult,
};
use lodestar_storage::{ArtifactStore, EngagementDirectory};
use serde::Serialize;

use super::engagement_lock::EngagementLocks;
use super::snapshot_service::SnapshotWriter;
use crate::clients::RetryPolicy;
use crate::telemetry::metrics::with_metrics;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct RefreshFailure {
    pub engagement_uuid: String,
    pub message: String,
}

/// Summary of a refresh run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    /// Store-wide artifact count after the refresh.
    pub total: u64,
    /// Engagements listed by the directory.
    pub engagements: usize,
    pub failures: Vec<RefreshFailure>,
}

enum EngagementRefresh {
    Loaded(usize),
    Missing,
    Skipped,
}

pub struct RefreshService {
    store: Arc<dyn ArtifactStore>,
    directory: Arc<dyn EngagementDirectory>,
    snapshots: Arc<SnapshotWriter>,
    locks: EngagementLocks,
    config: Arc<ArtifactsConfig>,
    retry: RetryPolicy,
}

impl RefreshService {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        directory: Arc<dyn EngagementDirectory>,
        snapshots: Arc<SnapshotWriter>,
        locks: EngagementLocks,
        config: Arc<ArtifactsConfig>,
    ) -> Self {
        let retry = RetryPolicy::from_config(&config);
        Self {
            store,
            directory,
            snapshots,
            locks,
            config,
            retry,
        }
    }

    /// Delete every stored artifact.
    pub async fn purge(&self) -> LodestarResult<u64> {
        let removed = self.store.delete_all().await?;
        tracing::info!(removed, "Artifact store purged");
        Ok(removed)
    }

    /// Load every engagement's snapshot into the store.
    ///
    /// Each refreshed engagement ends up holding exactly its snapshot:
    /// stored records absent from it are deleted, and a missing snapshot
    /// file empties the engagement. Engagements that fail keep their
    /// records untouched.
    pub async fn refresh(&self) -> LodestarResult<RefreshReport> {
        let directory = &self.directory;
        let engagements = self
            .retry
            .run("list_engagements", || directory.list_engagements())
            .await?;
        let engagement_count = engagements.len();
        tracing::info!(engagements = engagement_count, "Refresh started");

        let outcomes: Vec<(Option<String>, LodestarResult<EngagementRefresh>)> =
            stream::iter(engagements)
                .map(|engagement| async move {
                    let uuid = engagement.uuid.clone();
                    (uuid, self.refresh_engagement(engagement).await)
                })
                .buffer_unordered(self.config.refresh_concurrency.max(1))
                .collect()
                .await;

        let mut failures = Vec::new();
        for (uuid, outcome) in outcomes {
            let status = match outcome {
                Ok(EngagementRefresh::Loaded(0)) | Ok(EngagementRefresh::Missing) => "empty",
                Ok(EngagementRefresh::Loaded(_)) => "loaded",
                Ok(EngagementRefresh::Skipped) => "skipped",
                Err(e) => {
                    let engagement_uuid = uuid.unwrap_or_default();
                    tracing::error!(engagement_uuid = %engagement_uuid, error = %e, "Engagement refresh failed");
                    failures.push(RefreshFailure {
                        engagement_uuid,
                        message: e.to_string(),
                    });
                    "failed"
                }
            };
            with_metrics(|m| m.record_refresh_engagement(status));
        }
        failures.sort_by(|a, b| a.engagement_uuid.cmp(&b.engagement_uuid));

        let total = self.store.count(&ArtifactFilter::All).await?;
        tracing::info!(
            total,
            engagements = engagement_count,
            failures = failures.len(),
            "Refresh completed"
        );

        Ok(RefreshReport {
            total,
            engagements: engagement_count,
            failures,
        })
    }

    /// Run [`Self::refresh`] when the store holds no artifacts.
    pub async fn ensure_populated(&self) -> LodestarResult<Option<RefreshReport>> {
        let count = self.store.count(&ArtifactFilter::All).await?;
        if count > 0 {
            tracing::info!(count, "Artifact store already populated");
            return Ok(None);
        }
        tracing::info!("Artifact store empty, loading from repository");
        self.refresh().await.map(Some)
    }

    async fn refresh_engagement(&self, engagement: Engagement) -> LodestarResult<EngagementRefresh> {
        let Some(engagement_uuid) = engagement
            .uuid
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
        else {
            tracing::error!(project_id = ?engagement.project_id, "Engagement without uuid skipped");
            return Ok(EngagementRefresh::Skipped);
        };
        let project_id = engagement.require_project_id()?;

        let _guard = self.locks.acquire(engagement_uuid).await;
        let Some(items) = self.snapshots.fetch(project_id).await? else {
            let removed = self.prune(engagement_uuid, &HashSet::new()).await?;
            tracing::debug!(engagement_uuid, project_id, removed, "No snapshot file");
            return Ok(EngagementRefresh::Missing);
        };

        let loaded = items.len();
        let mut kept = HashSet::with_capacity(loaded);
        for item in items {
            kept.insert(self.upsert(engagement_uuid, item).await?);
        }
        let removed = self.prune(engagement_uuid, &kept).await?;
        tracing::debug!(engagement_uuid, project_id, loaded, removed, "Engagement refreshed");
        Ok(EngagementRefresh::Loaded(loaded))
    }

    /// Delete the engagement's stored records whose uuid is not in `kept`.
    async fn prune(&self, engagement_uuid: &str, kept: &HashSet<String>) -> LodestarResult<u64> {
        let mut removed = 0;
        for stored in self.store.list_by_engagement(engagement_uuid).await? {
            if let Some(uuid) = stored.uuid_str().filter(|u| !kept.contains(*u)) {
                removed += self.store.delete_by_uuid(uuid).await?;
            }
        }
        Ok(removed)
    }

    /// Insert or update one snapshot item, returning its uuid.
    async fn upsert(&self, engagement_uuid: &str, mut item: Artifact) -> Result<String, LodestarError> {
        item.engagement_uuid = engagement_uuid.to_string();
        let uuid = item.ensure_uuid().to_string();
        let now = Utc::now();

        match self.store.find_by_uuid(&uuid).await? {
            Some(current) => {
                item.id = current.id;
                item.created = current.created.or(item.created).or(Some(now));
                item.modified = Some(now);
                self.store.update(&item).await?;
            }
            None => {
                let created = item.created.unwrap_or(now);
                item.id = None;
                item.created = Some(created);
                item.modified = Some(item.modified.unwrap_or(created));
                self.store.insert(&item).await?;
            }
        }
        Ok(uuid)
    }
}

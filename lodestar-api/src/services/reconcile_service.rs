//! Reconciliation Engine
//!
//! Replaces an engagement's stored artifact list with a submitted one:
//! computes the change set, applies it to the document store, mirrors the
//! result into the repository snapshot and reports the new count to the
//! engagement directory.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use lodestar_core::{
    validate_all, Artifact, ArtifactsConfig, ChangeSet, LodestarResult, ValidationError,
};
use lodestar_storage::{ArtifactStore, EngagementDirectory};
use serde::Serialize;

use super::engagement_lock::EngagementLocks;
use super::snapshot_service::{CommitOptions, SnapshotWriter};
use crate::clients::RetryPolicy;
use crate::telemetry::metrics::with_metrics;

/// Result of reconciling one engagement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub engagement_uuid: String,
    /// Stored list after reconciliation, newest first.
    pub artifacts: Vec<Artifact>,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Whether a snapshot was written.
    pub committed: bool,
}

/// Per-engagement result of a bulk update.
#[derive(Debug)]
pub struct GroupResult {
    pub engagement_uuid: String,
    pub result: LodestarResult<ReconcileOutcome>,
}

pub struct ReconcileService {
    store: Arc<dyn ArtifactStore>,
    directory: Arc<dyn EngagementDirectory>,
    snapshots: Arc<SnapshotWriter>,
    locks: EngagementLocks,
    config: Arc<ArtifactsConfig>,
    retry: RetryPolicy,
}

impl ReconcileService {
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

    /// Reconcile one engagement against `items`.
    ///
    /// Items without a region get `region`; items without an engagement uuid
    /// get `engagement_uuid`. An item naming a different engagement is
    /// rejected before the store is touched.
    pub async fn reconcile_engagement(
        &self,
        engagement_uuid: &str,
        region: Option<&str>,
        mut items: Vec<Artifact>,
        options: &CommitOptions,
    ) -> LodestarResult<ReconcileOutcome> {
        let region = region.map(str::trim).filter(|r| !r.is_empty());
        for (index, item) in items.iter_mut().enumerate() {
            let owner = item.engagement_uuid.trim();
            if owner.is_empty() {
                item.engagement_uuid = engagement_uuid.to_string();
            } else if owner != engagement_uuid {
                return Err(ValidationError::InvalidValue {
                    field: "engagementUuid".to_string(),
                    reason: format!(
                        "item {index} names engagement {owner}, expected {engagement_uuid}"
                    ),
                }
                .into());
            }
            if let Some(region) = region {
                if item.region.as_deref().map_or(true, |r| r.trim().is_empty()) {
                    item.region = Some(region.to_string());
                }
            }
        }
        validate_all(&items)?;
        self.reconcile_locked(engagement_uuid, items, options).await
    }

    /// Group `items` by engagement and reconcile each group independently.
    ///
    /// Validation covers the whole request up front, including uuids already
    /// stored under another engagement. After that a failing group is
    /// reported in its [`GroupResult`] and does not stop the others.
    pub async fn reconcile_bulk(
        &self,
        items: Vec<Artifact>,
        options: &CommitOptions,
    ) -> LodestarResult<Vec<GroupResult>> {
        validate_all(&items)?;

        let mut seen = HashSet::new();
        for uuid in items.iter().filter_map(Artifact::uuid_str) {
            if !seen.insert(uuid) {
                return Err(ValidationError::DuplicateUuid {
                    uuid: uuid.to_string(),
                }
                .into());
            }
        }

        for item in &items {
            self.reject_foreign(item.engagement_uuid.trim(), item).await?;
        }

        let mut groups: BTreeMap<String, Vec<Artifact>> = BTreeMap::new();
        for item in items {
            groups
                .entry(item.engagement_uuid.trim().to_string())
                .or_default()
                .push(item);
        }
        tracing::info!(groups = groups.len(), "Bulk reconciliation started");

        let mut results: Vec<GroupResult> = stream::iter(groups)
            .map(|(engagement_uuid, group)| async move {
                let result = self.reconcile_locked(&engagement_uuid, group, options).await;
                GroupResult {
                    engagement_uuid,
                    result,
                }
            })
            .buffer_unordered(self.config.bulk_concurrency.max(1))
            .collect()
            .await;

        results.sort_by(|a, b| a.engagement_uuid.cmp(&b.engagement_uuid));
        Ok(results)
    }

    async fn reconcile_locked(
        &self,
        engagement_uuid: &str,
        items: Vec<Artifact>,
        options: &CommitOptions,
    ) -> LodestarResult<ReconcileOutcome> {
        let _guard = self.locks.acquire(engagement_uuid).await;
        let result = self.apply(engagement_uuid, items, options).await;
        match &result {
            Ok(outcome) if outcome.committed => with_metrics(|m| {
                m.record_reconciliation("applied", outcome.created, outcome.updated, outcome.deleted)
            }),
            Ok(_) => with_metrics(|m| m.record_reconciliation("noop", 0, 0, 0)),
            Err(e) => {
                with_metrics(|m| m.record_reconciliation("failed", 0, 0, 0));
                tracing::error!(engagement_uuid, error = %e, "Reconciliation failed");
            }
        }
        result
    }

    async fn apply(
        &self,
        engagement_uuid: &str,
        items: Vec<Artifact>,
        options: &CommitOptions,
    ) -> LodestarResult<ReconcileOutcome> {
        let existing = self.store.list_by_engagement(engagement_uuid).await?;
        let change_set = ChangeSet::compute(engagement_uuid, items, &existing)?;

        if change_set.is_empty() {
            tracing::debug!(engagement_uuid, "No artifact changes");
            return Ok(ReconcileOutcome {
                engagement_uuid: engagement_uuid.to_string(),
                artifacts: existing,
                created: 0,
                updated: 0,
                deleted: 0,
                committed: false,
            });
        }

        // Nothing is written until every created uuid is known to be free.
        for item in &change_set.created {
            self.reject_foreign(engagement_uuid, item).await?;
        }

        for uuid in change_set.deleted_uuids() {
            self.store.delete_by_uuid(&uuid).await?;
        }

        let now = Utc::now();
        for item in &change_set.created {
            let mut artifact = item.clone();
            artifact.id = None;
            artifact.created = Some(now);
            artifact.modified = Some(now);
            self.store.insert(&artifact).await?;
        }

        for update in &change_set.updated {
            let mut artifact = update.incoming.clone();
            artifact.id = update.existing.id;
            artifact.created = update.existing.created.or(Some(now));
            artifact.modified = Some(update.existing.modified.map_or(now, |m| m.max(now)));
            self.store.update(&artifact).await?;
        }

        let change_log = change_set.change_log();
        let commit_options = CommitOptions {
            commit_message: Some(format!(
                "{}\n\n{}",
                options.commit_message(&self.config),
                change_log.join("\n")
            )),
            ..options.clone()
        };

        let artifacts = self.store.list_by_engagement(engagement_uuid).await?;
        self.snapshots
            .write(engagement_uuid, &artifacts, &commit_options)
            .await?;

        if artifacts.len() != existing.len() {
            self.notify_count(engagement_uuid, artifacts.len()).await;
        }

        tracing::info!(
            engagement_uuid,
            created = change_set.created.len(),
            updated = change_set.updated.len(),
            deleted = change_set.deleted.len(),
            total = artifacts.len(),
            "Artifacts reconciled"
        );

        Ok(ReconcileOutcome {
            engagement_uuid: engagement_uuid.to_string(),
            created: change_set.created.len(),
            updated: change_set.updated.len(),
            deleted: change_set.deleted.len(),
            artifacts,
            committed: true,
        })
    }

    /// Fails when `item`'s uuid is stored under an engagement other than
    /// `engagement_uuid`. Moving artifacts between engagements is not
    /// supported.
    async fn reject_foreign(&self, engagement_uuid: &str, item: &Artifact) -> LodestarResult<()> {
        let Some(uuid) = item.uuid_str() else {
            return Ok(());
        };
        match self.store.find_by_uuid(uuid).await? {
            Some(current) if current.engagement_uuid != engagement_uuid => {
                tracing::warn!(
                    engagement_uuid,
                    uuid,
                    owner = %current.engagement_uuid,
                    "Artifact uuid belongs to another engagement"
                );
                Err(ValidationError::ForeignUuid {
                    uuid: uuid.to_string(),
                    owner: current.engagement_uuid,
                }
                .into())
            }
            _ => Ok(()),
        }
    }

    /// Best-effort: a failed notification is logged, never returned.
    async fn notify_count(&self, engagement_uuid: &str, count: usize) {
        let directory = &self.directory;
        let result = self
            .retry
            .run("update_artifact_count", || {
                directory.update_artifact_count(engagement_uuid, count)
            })
            .await;
        if let Err(e) = result {
            tracing::warn!(engagement_uuid, count, error = %e, "Artifact count notification failed");
        }
    }
}

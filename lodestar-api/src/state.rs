//! Shared application state for Axum routers.

use std::sync::Arc;

use lodestar_core::ArtifactsConfig;
use lodestar_storage::{ArtifactStore, EngagementDirectory, RepositoryBackend};

use crate::services::{
    EngagementLocks, QueryService, ReconcileService, RefreshService, SnapshotWriter,
};

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub query: Arc<QueryService>,
    pub reconcile: Arc<ReconcileService>,
    pub refresh: Arc<RefreshService>,
    pub config: Arc<ArtifactsConfig>,
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Wire the services over the three collaborators.
    ///
    /// Reconciliation and refresh share one set of engagement locks.
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        repository: Arc<dyn RepositoryBackend>,
        directory: Arc<dyn EngagementDirectory>,
        config: ArtifactsConfig,
    ) -> Self {
        let config = Arc::new(config);
        let locks = EngagementLocks::new();
        let snapshots = Arc::new(SnapshotWriter::new(
            repository,
            directory.clone(),
            config.clone(),
        ));

        Self {
            query: Arc::new(QueryService::new(store.clone(), config.clone())),
            reconcile: Arc::new(ReconcileService::new(
                store.clone(),
                directory.clone(),
                snapshots.clone(),
                locks.clone(),
                config.clone(),
            )),
            refresh: Arc::new(RefreshService::new(
                store,
                directory,
                snapshots,
                locks,
                config.clone(),
            )),
            config,
            start_time: std::time::Instant::now(),
        }
    }
}

// Use macro to reduce boilerplate for FromRef implementations
crate::impl_from_ref!(Arc<QueryService>, query);
crate::impl_from_ref!(Arc<ReconcileService>, reconcile);
crate::impl_from_ref!(Arc<RefreshService>, refresh);
crate::impl_from_ref!(Arc<ArtifactsConfig>, config);
crate::impl_from_ref!(std::time::Instant, start_time);

//! Shared harness: every service wired over in-memory collaborators.

#![allow(dead_code)]

use std::sync::Arc;

use lodestar_api::AppState;
use lodestar_test_utils::fixtures::engagements;
use lodestar_test_utils::{
    ArtifactsConfig, InMemoryArtifactStore, InMemoryEngagementDirectory, InMemoryRepository,
};

pub struct Harness {
    pub store: InMemoryArtifactStore,
    pub repository: InMemoryRepository,
    pub directory: InMemoryEngagementDirectory,
    pub config: ArtifactsConfig,
    pub state: AppState,
}

impl Harness {
    /// Engagements 1111 (project 91) and 2222 (project 92), legacy mirroring off.
    pub fn new() -> Self {
        Self::with_config(ArtifactsConfig {
            legacy_mirror: false,
            retry_delay: std::time::Duration::from_millis(1),
            ..Default::default()
        })
    }

    pub fn with_config(config: ArtifactsConfig) -> Self {
        let store = InMemoryArtifactStore::new();
        let repository = InMemoryRepository::new();
        let directory = InMemoryEngagementDirectory::with_engagements(engagements());
        let state = AppState::new(
            Arc::new(store.clone()),
            Arc::new(repository.clone()),
            Arc::new(directory.clone()),
            config.clone(),
        );
        Self {
            store,
            repository,
            directory,
            config,
            state,
        }
    }
}

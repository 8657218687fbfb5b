//! Lodestar Storage - Collaborator Traits and In-Memory Implementations
//!
//! The reconciliation engine talks to three collaborators:
//! - the document store holding queryable artifact records ([`ArtifactStore`])
//! - the repository host holding per-engagement snapshot files ([`RepositoryBackend`])
//! - the engagement directory mapping engagements to repository projects
//!   ([`EngagementDirectory`])
//!
//! Production implementations live in `lodestar-api`; the in-memory ones here
//! back tests and local runs.

pub mod directory;
pub mod memory;
pub mod repository;

pub use directory::{EngagementDirectory, InMemoryEngagementDirectory};
pub use memory::InMemoryArtifactStore;
pub use repository::{
    Commit, CommitAction, CommitActionKind, FileWrite, InMemoryRepository, RepositoryBackend,
    RepositoryFile,
};

use std::collections::{BTreeMap, BTreeSet};

use ::async_trait::async_trait;
use lodestar_core::{
    Artifact, ArtifactCount, ArtifactFilter, LodestarResult, PageRequest, SortSpec,
};

// ============================================================================
// DOCUMENT STORE
// ============================================================================

/// Queryable artifact storage.
///
/// `uuid` is unique across the store. Implementations assign the storage key
/// on insert and keep it on update.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Get an artifact by uuid.
    async fn find_by_uuid(&self, uuid: &str) -> LodestarResult<Option<Artifact>>;

    /// All artifacts of one engagement, newest first.
    async fn list_by_engagement(&self, engagement_uuid: &str) -> LodestarResult<Vec<Artifact>>;

    /// Insert a new artifact. Fails with `DuplicateKey` if the uuid exists.
    async fn insert(&self, artifact: &Artifact) -> LodestarResult<Artifact>;

    /// Replace the artifact with the same uuid. Fails with `NotFound` if absent.
    async fn update(&self, artifact: &Artifact) -> LodestarResult<Artifact>;

    /// Delete by uuid, returning the number of records removed.
    async fn delete_by_uuid(&self, uuid: &str) -> LodestarResult<u64>;

    /// Remove every artifact, returning the number removed.
    async fn delete_all(&self) -> LodestarResult<u64>;

    /// One page of artifacts matching `filter` in `sort` order.
    async fn list(
        &self,
        filter: &ArtifactFilter,
        sort: &SortSpec,
        page: PageRequest,
    ) -> LodestarResult<Vec<Artifact>>;

    /// Number of artifacts matching `filter`.
    async fn count(&self, filter: &ArtifactFilter) -> LodestarResult<u64>;

    /// Per-type counts, optionally restricted to `regions`.
    /// Ordered by count descending, then type ascending.
    async fn count_by_type(&self, regions: &[String]) -> LodestarResult<Vec<ArtifactCount>>;

    /// Artifact count keyed by engagement uuid.
    async fn count_by_engagement(&self) -> LodestarResult<BTreeMap<String, u64>>;

    /// Distinct artifact types, optionally restricted to `regions`.
    async fn distinct_types(&self, regions: &[String]) -> LodestarResult<BTreeSet<String>>;

    /// Reachability probe for readiness checks.
    async fn ping(&self) -> LodestarResult<()> {
        Ok(())
    }
}

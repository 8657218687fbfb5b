//! Lodestar Core - Artifact Types
//!
//! Artifact records, the change-set calculator, list/count filter descriptors
//! and the snapshot file codec. Everything here is pure: no I/O, no async.
//! Storage and remote collaborators live in `lodestar-storage`, orchestration
//! in `lodestar-api`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod artifact;
pub mod changeset;
pub mod config;
pub mod error;
pub mod filter;
pub mod snapshot;
pub mod timestamp;

pub use artifact::{validate_all, Artifact, ArtifactCount, Engagement};
pub use changeset::{field_changes, ArtifactUpdate, ChangeSet, FieldChange};
pub use config::ArtifactsConfig;
pub use error::{
    ConfigError, LodestarError, LodestarResult, RemoteError, SnapshotError, StorageError,
    ValidationError,
};
pub use filter::{
    normalize_regions, ArtifactFilter, CountOptions, ListOptions, PageRequest, ResolvedQuery,
    SortDirection, SortField, SortKey, SortSpec, DEFAULT_PAGE_SIZE,
};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new artifact uuid (UUIDv7, timestamp-sortable) in string form.
pub fn new_artifact_uuid() -> String {
    Uuid::now_v7().to_string()
}

//! Artifact services
//!
//! Orchestration over the document store, the repository host and the
//! engagement directory. Handlers call these; these call the collaborators.

pub mod engagement_lock;
pub mod query_service;
pub mod reconcile_service;
pub mod refresh_service;
pub mod snapshot_service;

pub use engagement_lock::EngagementLocks;
pub use query_service::{Page, QueryService};
pub use reconcile_service::{GroupResult, ReconcileOutcome, ReconcileService};
pub use refresh_service::{RefreshFailure, RefreshReport, RefreshService};
pub use snapshot_service::{CommitOptions, SnapshotWriter, WriteStrategy};

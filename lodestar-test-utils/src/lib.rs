//! Lodestar Test Utilities
//!
//! Shared test infrastructure for the Lodestar workspace:
//! - Proptest generators for artifacts
//! - Fixtures for the common engagement scenarios
//! - Helpers that seed the in-memory collaborators

// Re-export in-memory collaborators from their source crate
pub use lodestar_storage::{
    ArtifactStore, InMemoryArtifactStore, InMemoryEngagementDirectory, InMemoryRepository,
};

pub use lodestar_core::{Artifact, ArtifactsConfig, Engagement, Timestamp};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for artifact records.

    use super::*;
    use proptest::prelude::*;

    /// Non-blank printable text.
    pub fn arb_text() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9][a-zA-Z0-9 ]{0,23}"
    }

    pub fn arb_artifact_type() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["Demo", "Multimedia", "Report", "Survey"]).prop_map(String::from)
    }

    pub fn arb_region() -> impl Strategy<Value = Option<String>> {
        prop::option::of(prop::sample::select(vec!["na", "emea", "apac", "latam"]))
            .prop_map(|r| r.map(String::from))
    }

    /// Generate a Timestamp between 2020 and 2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(chrono::Utc::now)
        })
    }

    /// A valid artifact for `engagement_uuid` with the given uuid.
    pub fn arb_artifact(
        engagement_uuid: String,
        uuid: Option<String>,
    ) -> impl Strategy<Value = Artifact> {
        (
            arb_text(),
            arb_text(),
            arb_artifact_type(),
            arb_text(),
            arb_region(),
        )
            .prop_map(move |(title, description, artifact_type, link, region)| Artifact {
                uuid: uuid.clone(),
                engagement_uuid: engagement_uuid.clone(),
                title,
                description,
                artifact_type,
                link_address: format!("https://example.com/{}", link.trim()),
                region,
                ..Default::default()
            })
    }

    /// Artifacts for one engagement with distinct uuids.
    pub fn arb_engagement_artifacts(
        engagement_uuid: &str,
        max: usize,
    ) -> impl Strategy<Value = Vec<Artifact>> {
        let engagement_uuid = engagement_uuid.to_string();
        prop::collection::hash_set("[a-f0-9]{12}", 0..=max).prop_flat_map(move |uuids| {
            uuids
                .into_iter()
                .map(|u| arb_artifact(engagement_uuid.clone(), Some(u)))
                .collect::<Vec<_>>()
        })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built records for common test scenarios.

    use super::*;
    use lodestar_core::{snapshot, timestamp};

    pub const ENGAGEMENT_ONE: &str = "1111";
    pub const ENGAGEMENT_TWO: &str = "2222";
    pub const PROJECT_ONE: i64 = 91;
    pub const PROJECT_TWO: i64 = 92;

    /// A valid artifact. Pass `None` to let the engine assign the uuid.
    pub fn artifact(uuid: Option<&str>, engagement_uuid: &str, title: &str) -> Artifact {
        Artifact {
            uuid: uuid.map(str::to_string),
            engagement_uuid: engagement_uuid.to_string(),
            title: title.to_string(),
            description: format!("{title} description"),
            artifact_type: "Demo".to_string(),
            link_address: format!("https://example.com/{}", title.replace(' ', "-")),
            region: Some("na".to_string()),
            ..Default::default()
        }
    }

    /// The two artifacts engagement 1111 starts with: a Demo and a Multimedia, both in `na`.
    pub fn engagement_one_artifacts() -> Vec<Artifact> {
        let created = timestamp::parse("2021-03-01T12:00:00Z");
        let mut demo = artifact(Some("a1"), ENGAGEMENT_ONE, "Demo day");
        demo.created = created;
        demo.modified = created;

        let mut media = artifact(Some("a2"), ENGAGEMENT_ONE, "Recording");
        media.artifact_type = "Multimedia".to_string();
        media.created = created;
        media.modified = timestamp::parse("2021-03-02T12:00:00Z");

        vec![demo, media]
    }

    pub fn engagements() -> Vec<Engagement> {
        vec![
            Engagement::new(ENGAGEMENT_ONE, PROJECT_ONE),
            Engagement::new(ENGAGEMENT_TWO, PROJECT_TWO),
        ]
    }

    /// Write `artifacts` as the snapshot of `project_id` on the default branch.
    pub async fn seed_snapshot(
        repository: &InMemoryRepository,
        config: &ArtifactsConfig,
        project_id: i64,
        artifacts: &[Artifact],
    ) -> Result<(), lodestar_core::SnapshotError> {
        let content = snapshot::encode(artifacts)?;
        repository
            .put_file(
                project_id,
                &config.default_branch,
                &config.artifacts_file,
                content,
            )
            .await;
        Ok(())
    }

    /// Insert `artifacts` straight into the store.
    pub async fn seed_store(
        store: &InMemoryArtifactStore,
        artifacts: &[Artifact],
    ) -> lodestar_core::LodestarResult<()> {
        for artifact in artifacts {
            store.insert(artifact).await?;
        }
        Ok(())
    }
}

//! Store refresh from repository snapshots.

mod support;

use lodestar_core::{timestamp, ArtifactFilter, Engagement, RemoteError};
use lodestar_test_utils::fixtures::*;
use lodestar_test_utils::ArtifactStore;
use support::Harness;

async fn seed_engagement_one(harness: &Harness) {
    let mut items = engagement_one_artifacts();
    items.push(artifact(Some("a3"), ENGAGEMENT_ONE, "Runbook"));
    seed_snapshot(&harness.repository, &harness.config, PROJECT_ONE, &items)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_refresh_loads_every_snapshot() {
    let harness = Harness::new();
    seed_engagement_one(&harness).await;

    let report = harness.state.refresh.refresh().await.unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.engagements, 2);
    assert!(report.failures.is_empty());
    assert_eq!(harness.store.len().await, 3);

    let a1 = harness.store.find_by_uuid("a1").await.unwrap().unwrap();
    assert_eq!(a1.engagement_uuid, ENGAGEMENT_ONE);
    assert_eq!(a1.created, timestamp::parse("2021-03-01T12:00:00Z"));
    assert_eq!(a1.modified, a1.created);
}

#[tokio::test]
async fn test_purge_then_refresh_replaces_stale_records() {
    let harness = Harness::new();
    seed_engagement_one(&harness).await;
    seed_store(&harness.store, &[artifact(Some("stale"), ENGAGEMENT_TWO, "Old")])
        .await
        .unwrap();

    harness.state.refresh.purge().await.unwrap();
    let report = harness.state.refresh.refresh().await.unwrap();

    assert_eq!(report.total, 3);
    assert!(harness.store.find_by_uuid("stale").await.unwrap().is_none());
}

#[tokio::test]
async fn test_refresh_over_existing_records_keeps_created() {
    let harness = Harness::new();
    seed_engagement_one(&harness).await;
    let mut stored = artifact(Some("a1"), ENGAGEMENT_ONE, "Demo day");
    stored.created = timestamp::parse("2020-01-01T00:00:00Z");
    stored.modified = stored.created;
    seed_store(&harness.store, &[stored]).await.unwrap();

    harness.state.refresh.refresh().await.unwrap();

    let a1 = harness.store.find_by_uuid("a1").await.unwrap().unwrap();
    assert_eq!(a1.created, timestamp::parse("2020-01-01T00:00:00Z"));
    assert!(a1.modified > a1.created);
    assert_eq!(harness.store.len().await, 3);
}

#[tokio::test]
async fn test_failing_engagement_is_reported_and_others_load() {
    let harness = Harness::new();
    seed_engagement_one(&harness).await;
    harness
        .repository
        .fail_project(
            PROJECT_TWO,
            RemoteError::Fatal {
                service: "repository".to_string(),
                status: Some(500),
                reason: "boom".to_string(),
            },
        )
        .await;

    let report = harness.state.refresh.refresh().await.unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].engagement_uuid, ENGAGEMENT_TWO);
    assert!(report.failures[0].message.contains("boom"));
}

#[tokio::test]
async fn test_malformed_snapshot_is_reported() {
    let harness = Harness::new();
    seed_engagement_one(&harness).await;
    harness
        .repository
        .put_file(
            PROJECT_TWO,
            &harness.config.default_branch,
            &harness.config.artifacts_file,
            "{ not json",
        )
        .await;

    let report = harness.state.refresh.refresh().await.unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].engagement_uuid, ENGAGEMENT_TWO);
}

#[tokio::test]
async fn test_engagement_without_project_fails_alone() {
    let harness = Harness::new();
    seed_engagement_one(&harness).await;
    harness
        .directory
        .add(Engagement {
            uuid: Some("3333".to_string()),
            project_id: None,
        })
        .await;

    let report = harness.state.refresh.refresh().await.unwrap();

    assert_eq!(report.engagements, 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].engagement_uuid, "3333");
    assert_eq!(report.total, 3);
}

#[tokio::test]
async fn test_transient_read_is_retried() {
    let harness = Harness::new();
    seed_engagement_one(&harness).await;
    harness
        .repository
        .fail_next(RemoteError::Transient {
            service: "repository".to_string(),
            reason: "connection refused".to_string(),
        })
        .await;

    let report = harness.state.refresh.refresh().await.unwrap();

    assert!(report.failures.is_empty());
    assert_eq!(report.total, 3);
}

#[tokio::test]
async fn test_ensure_populated_only_runs_on_empty_store() {
    let harness = Harness::new();
    seed_engagement_one(&harness).await;

    let first = harness.state.refresh.ensure_populated().await.unwrap();
    assert_eq!(first.map(|r| r.total), Some(3));

    let reads = harness.repository.read_count().await;
    let second = harness.state.refresh.ensure_populated().await.unwrap();
    assert!(second.is_none());
    assert_eq!(harness.repository.read_count().await, reads);
    assert_eq!(
        harness.store.count(&ArtifactFilter::All).await.unwrap(),
        3
    );
}

#[tokio::test]
async fn test_refresh_drops_records_missing_from_snapshot() {
    let harness = Harness::new();
    seed_engagement_one(&harness).await;
    seed_store(
        &harness.store,
        &[
            artifact(Some("gone"), ENGAGEMENT_ONE, "Retired"),
            artifact(Some("b1"), ENGAGEMENT_TWO, "Slides"),
        ],
    )
    .await
    .unwrap();

    let report = harness.state.refresh.refresh().await.unwrap();

    assert!(report.failures.is_empty());
    assert_eq!(report.total, 3);
    assert!(harness.store.find_by_uuid("gone").await.unwrap().is_none());
    // Project 92 has no snapshot file, so engagement 2222 ends up empty.
    assert!(harness.store.find_by_uuid("b1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_engagement_keeps_its_records() {
    let harness = Harness::new();
    seed_engagement_one(&harness).await;
    seed_store(&harness.store, &[artifact(Some("b1"), ENGAGEMENT_TWO, "Slides")])
        .await
        .unwrap();
    harness
        .repository
        .fail_project(
            PROJECT_TWO,
            RemoteError::Fatal {
                service: "repository".to_string(),
                status: Some(500),
                reason: "boom".to_string(),
            },
        )
        .await;

    let report = harness.state.refresh.refresh().await.unwrap();

    assert_eq!(report.failures.len(), 1);
    assert!(harness.store.find_by_uuid("b1").await.unwrap().is_some());
    assert_eq!(report.total, 4);
}

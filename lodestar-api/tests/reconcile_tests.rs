//! Reconciliation engine tests over in-memory collaborators.

mod support;

use lodestar_api::CommitOptions;
use lodestar_core::{snapshot, Artifact, ArtifactsConfig, LodestarError, ValidationError};
use lodestar_test_utils::fixtures::*;
use lodestar_test_utils::ArtifactStore;
use support::Harness;

fn video_and_demo() -> Vec<Artifact> {
    let mut demo = artifact(Some("uuidA"), "E1", "Demo day");
    demo.created = lodestar_core::timestamp::parse("2021-01-01T00:00:00Z");
    demo.modified = demo.created;
    let mut video = artifact(Some("uuidB"), "E1", "Walkthrough");
    video.artifact_type = "Video".to_string();
    video.created = demo.created;
    video.modified = demo.created;
    vec![demo, video]
}

async fn harness_with_e1() -> Harness {
    let harness = Harness::new();
    harness
        .directory
        .add(lodestar_core::Engagement::new("E1", 77))
        .await;
    seed_store(&harness.store, &video_and_demo()).await.unwrap();
    harness
}

#[tokio::test]
async fn test_targeted_update_creates_updates_and_deletes() {
    let harness = harness_with_e1().await;

    let mut updated = artifact(Some("uuidA"), "E1", "Demo day");
    updated.description = "UPDATED".to_string();
    let mut new_item = artifact(None, "", "New");
    new_item.artifact_type = "typeOne".to_string();

    let outcome = harness
        .state
        .reconcile
        .reconcile_engagement("E1", Some("na"), vec![updated, new_item], &CommitOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.artifacts.len(), 2);
    assert_eq!((outcome.created, outcome.updated, outcome.deleted), (1, 1, 1));
    assert!(outcome.committed);

    let a = outcome
        .artifacts
        .iter()
        .find(|a| a.uuid.as_deref() == Some("uuidA"))
        .unwrap();
    assert_eq!(a.description, "UPDATED");
    assert_eq!(a.created, lodestar_core::timestamp::parse("2021-01-01T00:00:00Z"));
    assert!(a.modified > a.created);

    let fresh = outcome
        .artifacts
        .iter()
        .find(|a| a.title == "New")
        .unwrap();
    assert!(fresh.uuid.as_deref().is_some_and(|u| !u.is_empty()));
    assert_eq!(fresh.engagement_uuid, "E1");
    assert!(fresh.created.is_some());
    assert_eq!(fresh.created, fresh.modified);

    assert!(harness.store.find_by_uuid("uuidB").await.unwrap().is_none());
}

#[tokio::test]
async fn test_snapshot_and_commit_message_follow_the_store() {
    let harness = harness_with_e1().await;

    let keep = video_and_demo().remove(0);
    harness
        .state
        .reconcile
        .reconcile_engagement(
            "E1",
            None,
            vec![keep],
            &CommitOptions {
                commit_message: Some("Trim artifacts".to_string()),
                author_name: Some("Jane".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let commits = harness.repository.commits().await;
    assert_eq!(commits.len(), 1);
    let (project_id, commit) = &commits[0];
    assert_eq!(*project_id, 77);
    assert_eq!(commit.author_name, "Jane");
    assert_eq!(commit.author_email, harness.config.default_author_email);
    assert!(commit.commit_message.starts_with("Trim artifacts\n\n"));
    assert!(commit.commit_message.contains("Deleted artifact uuidB (Walkthrough)"));

    let content = harness
        .repository
        .file(77, "master", &harness.config.artifacts_file)
        .await
        .unwrap();
    let written = snapshot::decode(&content).unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].uuid.as_deref(), Some("uuidA"));
}

#[tokio::test]
async fn test_resubmitting_stored_list_writes_nothing() {
    let harness = harness_with_e1().await;

    let outcome = harness
        .state
        .reconcile
        .reconcile_engagement("E1", None, video_and_demo(), &CommitOptions::default())
        .await
        .unwrap();

    assert!(!outcome.committed);
    assert_eq!(outcome.artifacts.len(), 2);
    assert!(harness.repository.commits().await.is_empty());
    assert_eq!(harness.directory.count_updates().await, 0);
}

#[tokio::test]
async fn test_region_only_change_is_written() {
    let harness = harness_with_e1().await;

    let mut items = video_and_demo();
    items[1].region = Some("emea".to_string());
    let outcome = harness
        .state
        .reconcile
        .reconcile_engagement("E1", None, items, &CommitOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.updated, 1);
    assert_eq!(harness.repository.commits().await.len(), 1);
}

#[tokio::test]
async fn test_missing_field_rejected_before_store_access() {
    let harness = harness_with_e1().await;

    let mut broken = artifact(None, "E1", "Broken");
    broken.link_address.clear();
    let err = harness
        .state
        .reconcile
        .reconcile_engagement("E1", None, vec![broken], &CommitOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, LodestarError::Validation(_)));
    assert_eq!(harness.store.len().await, 2);
    assert!(harness.repository.commits().await.is_empty());
}

#[tokio::test]
async fn test_count_change_is_reported() {
    let harness = harness_with_e1().await;

    let mut items = video_and_demo();
    items.push(artifact(None, "E1", "Third"));
    harness
        .state
        .reconcile
        .reconcile_engagement("E1", None, items, &CommitOptions::default())
        .await
        .unwrap();

    assert_eq!(harness.directory.reported_count("E1").await, Some(3));
}

#[tokio::test]
async fn test_failed_count_notification_is_not_an_error() {
    let harness = harness_with_e1().await;
    harness.directory.fail_count_updates().await;

    let result = harness
        .state
        .reconcile
        .reconcile_engagement("E1", None, vec![], &CommitOptions::default())
        .await;

    assert!(result.is_ok());
    assert_eq!(harness.store.len().await, 0);
}

#[tokio::test]
async fn test_legacy_document_mirrored_in_single_commit() {
    let harness = Harness::with_config(ArtifactsConfig::default());
    harness
        .repository
        .put_file(PROJECT_ONE, "master", "engagement.json", r#"{"zeta":1,"alpha":2}"#)
        .await;

    harness
        .state
        .reconcile
        .reconcile_engagement(
            ENGAGEMENT_ONE,
            None,
            engagement_one_artifacts(),
            &CommitOptions::default(),
        )
        .await
        .unwrap();

    let commits = harness.repository.commits().await;
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].1.actions.len(), 2);

    let legacy = harness
        .repository
        .file(PROJECT_ONE, "master", "engagement.json")
        .await
        .unwrap();
    let alpha = legacy.find("\"alpha\"").unwrap();
    let artifacts = legacy.find("\"artifacts\"").unwrap();
    let zeta = legacy.find("\"zeta\"").unwrap();
    assert!(alpha < artifacts && artifacts < zeta);
}

#[tokio::test]
async fn test_bulk_groups_fail_in_isolation() {
    let harness = Harness::new();
    harness.store.fail_engagement(ENGAGEMENT_TWO).await;

    let items = vec![
        artifact(Some("a1"), ENGAGEMENT_ONE, "One"),
        artifact(Some("b1"), ENGAGEMENT_TWO, "Two"),
    ];
    let groups = harness
        .state
        .reconcile
        .reconcile_bulk(items, &CommitOptions::default())
        .await
        .unwrap();

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].engagement_uuid, ENGAGEMENT_ONE);
    assert!(groups[0].result.is_ok());
    assert_eq!(groups[1].engagement_uuid, ENGAGEMENT_TWO);
    assert!(groups[1].result.is_err());

    assert!(harness.store.find_by_uuid("a1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_bulk_requires_engagement_on_every_item() {
    let harness = Harness::new();

    let items = vec![
        artifact(Some("a1"), ENGAGEMENT_ONE, "One"),
        artifact(Some("b1"), "", "Orphan"),
    ];
    let err = harness
        .state
        .reconcile
        .reconcile_bulk(items, &CommitOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, LodestarError::Validation(_)));
    assert!(harness.store.is_empty().await);
}

#[tokio::test]
async fn test_transient_repository_failure_is_retried() {
    let harness = Harness::new();
    harness
        .repository
        .fail_next(lodestar_core::RemoteError::Transient {
            service: "repository".to_string(),
            reason: "connection reset".to_string(),
        })
        .await;

    let outcome = harness
        .state
        .reconcile
        .reconcile_engagement(
            ENGAGEMENT_ONE,
            None,
            engagement_one_artifacts(),
            &CommitOptions::default(),
        )
        .await
        .unwrap();

    assert!(outcome.committed);
    assert_eq!(harness.repository.commits().await.len(), 1);
}

#[tokio::test]
async fn test_fatal_repository_failure_leaves_store_written() {
    let harness = Harness::new();
    harness
        .repository
        .fail_project(
            PROJECT_ONE,
            lodestar_core::RemoteError::Fatal {
                service: "repository".to_string(),
                status: Some(403),
                reason: "forbidden".to_string(),
            },
        )
        .await;

    let err = harness
        .state
        .reconcile
        .reconcile_engagement(
            ENGAGEMENT_ONE,
            None,
            engagement_one_artifacts(),
            &CommitOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, LodestarError::Remote(_)));
    assert_eq!(harness.store.len().await, 2);
}

#[tokio::test]
async fn test_uuid_owned_by_another_engagement_is_rejected() {
    let harness = Harness::new();
    seed_store(&harness.store, &engagement_one_artifacts())
        .await
        .unwrap();

    let mut claimed = engagement_one_artifacts().remove(0);
    claimed.engagement_uuid = ENGAGEMENT_TWO.to_string();
    let err = harness
        .state
        .reconcile
        .reconcile_engagement(ENGAGEMENT_TWO, None, vec![claimed], &CommitOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LodestarError::Validation(ValidationError::ForeignUuid { ref uuid, ref owner })
            if uuid == "a1" && owner == ENGAGEMENT_ONE
    ));

    let a1 = harness.store.find_by_uuid("a1").await.unwrap().unwrap();
    assert_eq!(a1.engagement_uuid, ENGAGEMENT_ONE);
    assert_eq!(
        a1.created,
        lodestar_core::timestamp::parse("2021-03-01T12:00:00Z")
    );
    assert_eq!(harness.store.len().await, 2);
    assert!(harness.repository.commits().await.is_empty());
    assert_eq!(harness.directory.count_updates().await, 0);
}

#[tokio::test]
async fn test_rejected_foreign_uuid_leaves_deletions_unapplied() {
    let harness = Harness::new();
    let mut items = engagement_one_artifacts();
    items.push(artifact(Some("b1"), ENGAGEMENT_TWO, "Slides"));
    seed_store(&harness.store, &items).await.unwrap();

    let err = harness
        .state
        .reconcile
        .reconcile_engagement(
            ENGAGEMENT_TWO,
            None,
            vec![artifact(Some("a2"), ENGAGEMENT_TWO, "Taken")],
            &CommitOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LodestarError::Validation(ValidationError::ForeignUuid { .. })
    ));
    assert!(harness.store.find_by_uuid("b1").await.unwrap().is_some());
    assert!(harness.repository.commits().await.is_empty());
}

#[tokio::test]
async fn test_bulk_rejects_uuid_owned_by_another_engagement() {
    let harness = Harness::new();
    seed_store(&harness.store, &engagement_one_artifacts())
        .await
        .unwrap();

    let items = vec![
        artifact(Some("x1"), ENGAGEMENT_ONE, "One"),
        artifact(Some("a1"), ENGAGEMENT_TWO, "Claimed"),
    ];
    let err = harness
        .state
        .reconcile
        .reconcile_bulk(items, &CommitOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LodestarError::Validation(ValidationError::ForeignUuid { .. })
    ));
    assert!(harness.store.find_by_uuid("x1").await.unwrap().is_none());
    assert!(harness.repository.commits().await.is_empty());
}

#[tokio::test]
async fn test_item_naming_another_engagement_is_rejected() {
    let harness = Harness::new();

    let err = harness
        .state
        .reconcile
        .reconcile_engagement(
            ENGAGEMENT_TWO,
            None,
            vec![artifact(Some("x1"), ENGAGEMENT_ONE, "Elsewhere")],
            &CommitOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LodestarError::Validation(ValidationError::InvalidValue { ref field, .. })
            if field == "engagementUuid"
    ));
    assert!(harness.store.is_empty().await);
    assert!(harness.repository.commits().await.is_empty());
}

fn stored_uuids(artifacts: &[Artifact]) -> Vec<String> {
    let mut uuids: Vec<String> = artifacts
        .iter()
        .filter_map(|a| a.uuid.clone())
        .collect();
    uuids.sort();
    uuids
}

async fn snapshot_uuids(harness: &Harness, project_id: i64) -> Vec<String> {
    let content = harness
        .repository
        .file(project_id, "master", &harness.config.artifacts_file)
        .await
        .unwrap();
    stored_uuids(&snapshot::decode(&content).unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_leave_store_and_snapshot_in_agreement() {
    let harness = Harness::new();

    let tasks: Vec<_> = ["x1", "x2"]
        .into_iter()
        .map(|uuid| {
            let reconcile = harness.state.reconcile.clone();
            tokio::spawn(async move {
                reconcile
                    .reconcile_engagement(
                        ENGAGEMENT_ONE,
                        None,
                        vec![artifact(Some(uuid), ENGAGEMENT_ONE, uuid)],
                        &CommitOptions::default(),
                    )
                    .await
            })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap().unwrap().committed);
    }

    let commits = harness.repository.commits().await;
    assert_eq!(commits.len(), 2);
    assert!(commits.iter().all(|(project_id, _)| *project_id == PROJECT_ONE));

    let stored = harness.store.list_by_engagement(ENGAGEMENT_ONE).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(
        stored_uuids(&stored),
        snapshot_uuids(&harness, PROJECT_ONE).await
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_update_racing_refresh_leaves_store_and_snapshot_in_agreement() {
    let harness = Harness::new();
    seed_snapshot(
        &harness.repository,
        &harness.config,
        PROJECT_ONE,
        &engagement_one_artifacts(),
    )
    .await
    .unwrap();

    let reconcile = harness.state.reconcile.clone();
    let update = tokio::spawn(async move {
        reconcile
            .reconcile_engagement(
                ENGAGEMENT_ONE,
                None,
                vec![artifact(Some("x1"), ENGAGEMENT_ONE, "Replacement")],
                &CommitOptions::default(),
            )
            .await
    });
    let refresh = harness.state.refresh.clone();
    let reload = tokio::spawn(async move { refresh.refresh().await });

    assert!(update.await.unwrap().unwrap().committed);
    assert!(reload.await.unwrap().unwrap().failures.is_empty());

    assert_eq!(harness.repository.commits().await.len(), 1);
    let stored = harness.store.list_by_engagement(ENGAGEMENT_ONE).await.unwrap();
    assert_eq!(stored_uuids(&stored), vec!["x1".to_string()]);
    assert_eq!(
        stored_uuids(&stored),
        snapshot_uuids(&harness, PROJECT_ONE).await
    );
}

//! Property-Based Tests for Change-Set Calculation
//!
//! **Property 1: Idempotence** - resubmitting the stored list, in any
//! order, yields an empty change-set.
//!
//! **Property 2: Completeness** - every submitted uuid is either created,
//! updated or unchanged; every stored uuid not submitted is deleted.
//!
//! **Property 3: Identity assignment** - generated uuids are non-empty and
//! unique, and supplied uuids are kept.

use std::collections::HashSet;

use lodestar_core::{snapshot, Artifact, ChangeSet};
use proptest::prelude::*;

// ============================================================================
// GENERATORS
// ============================================================================

fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,24}".prop_filter("non-blank", |s| !s.trim().is_empty())
}

fn arb_artifact(uuid: String) -> impl Strategy<Value = Artifact> {
    (
        arb_text(),
        arb_text(),
        prop::sample::select(vec!["Demo", "Multimedia", "Report"]),
        arb_text(),
        prop::option::of(prop::sample::select(vec!["na", "emea", "apac"])),
    )
        .prop_map(move |(title, description, t, link, region)| Artifact {
            uuid: Some(uuid.clone()),
            engagement_uuid: "1111".to_string(),
            title,
            description,
            artifact_type: t.to_string(),
            link_address: format!("https://example.com/{}", link.trim()),
            region: region.map(str::to_string),
            ..Default::default()
        })
}

/// A stored list with distinct uuids.
fn arb_stored_list() -> impl Strategy<Value = Vec<Artifact>> {
    prop::collection::hash_set("[a-f0-9]{8}", 0..12).prop_flat_map(|uuids| {
        uuids
            .into_iter()
            .map(arb_artifact)
            .collect::<Vec<_>>()
    })
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_resubmitting_stored_list_is_noop(
        stored in arb_stored_list(),
        seed in any::<u64>(),
    ) {
        let mut incoming = stored.clone();
        let len = incoming.len().max(1);
        incoming.rotate_left((seed as usize) % len);

        let change_set = ChangeSet::compute("1111", incoming, &stored)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert!(change_set.is_empty());
        prop_assert_eq!(change_set.unchanged, stored.len());
    }

    #[test]
    fn prop_every_uuid_is_accounted_for(
        stored in arb_stored_list(),
        keep in prop::collection::vec(any::<bool>(), 12),
        new_items in 0usize..4,
    ) {
        let mut incoming: Vec<Artifact> = stored
            .iter()
            .zip(keep.iter())
            .filter(|(_, keep)| **keep)
            .map(|(a, _)| a.clone())
            .collect();
        let kept: HashSet<String> = incoming.iter().filter_map(|a| a.uuid.clone()).collect();
        for i in 0..new_items {
            incoming.push(Artifact {
                uuid: None,
                title: format!("new {i}"),
                description: "d".to_string(),
                artifact_type: "Demo".to_string(),
                link_address: "l".to_string(),
                ..Default::default()
            });
        }

        let change_set = ChangeSet::compute("1111", incoming, &stored)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(change_set.created.len(), new_items);
        prop_assert_eq!(change_set.unchanged + change_set.updated.len(), kept.len());

        let deleted: HashSet<String> = change_set.deleted_uuids().into_iter().collect();
        for artifact in &stored {
            let uuid = artifact.uuid.clone().unwrap_or_default();
            prop_assert_eq!(deleted.contains(&uuid), !kept.contains(&uuid));
        }

        let created: HashSet<String> = change_set
            .created
            .iter()
            .filter_map(|a| a.uuid_str().map(str::to_string))
            .collect();
        prop_assert_eq!(created.len(), new_items);
        prop_assert!(created.is_disjoint(&kept));
    }

    #[test]
    fn prop_snapshot_round_trip(stored in arb_stored_list()) {
        let content = snapshot::encode(&stored)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let decoded = snapshot::decode(&content)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(decoded, stored);
    }
}

//! Change-set calculation
//!
//! Given the list a client submitted for an engagement and the list the
//! document store currently holds, work out which records must be created,
//! updated or deleted. Items are matched by uuid; timestamps and storage
//! keys never count as a difference.

use std::collections::{HashMap, HashSet};

use crate::artifact::Artifact;
use crate::error::ValidationError;

/// A single differing field between the stored and submitted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub old: String,
    pub new: String,
}

/// A matched pair whose content differs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactUpdate {
    pub incoming: Artifact,
    pub existing: Artifact,
    pub changes: Vec<FieldChange>,
}

/// Minimal set of mutations turning `existing` into `incoming`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub created: Vec<Artifact>,
    pub updated: Vec<ArtifactUpdate>,
    /// Stored records with no submitted counterpart.
    pub deleted: Vec<Artifact>,
    pub unchanged: usize,
}

/// Compare the content fields of two records.
pub fn field_changes(existing: &Artifact, incoming: &Artifact) -> Vec<FieldChange> {
    let region = |a: &Artifact| a.region.clone().unwrap_or_default();
    let pairs = [
        ("title", existing.title.clone(), incoming.title.clone()),
        (
            "description",
            existing.description.clone(),
            incoming.description.clone(),
        ),
        (
            "type",
            existing.artifact_type.clone(),
            incoming.artifact_type.clone(),
        ),
        (
            "linkAddress",
            existing.link_address.clone(),
            incoming.link_address.clone(),
        ),
        ("region", region(existing), region(incoming)),
        (
            "engagementUuid",
            existing.engagement_uuid.clone(),
            incoming.engagement_uuid.clone(),
        ),
    ];

    pairs
        .into_iter()
        .filter(|(_, old, new)| old != new)
        .map(|(field, old, new)| FieldChange { field, old, new })
        .collect()
}

impl ChangeSet {
    /// Diff a submitted list against the stored list for `engagement_uuid`.
    ///
    /// Items without a uuid get a generated one; blank engagement uuids are
    /// stamped with `engagement_uuid`. A uuid repeated within `incoming` is
    /// rejected.
    pub fn compute(
        engagement_uuid: &str,
        incoming: Vec<Artifact>,
        existing: &[Artifact],
    ) -> Result<Self, ValidationError> {
        let mut seen = HashSet::new();
        let mut prepared = Vec::with_capacity(incoming.len());
        for mut item in incoming {
            if item.engagement_uuid.trim().is_empty() {
                item.engagement_uuid = engagement_uuid.to_string();
            }
            let uuid = item.ensure_uuid().to_string();
            if !seen.insert(uuid.clone()) {
                return Err(ValidationError::DuplicateUuid { uuid });
            }
            prepared.push(item);
        }

        let stored: HashMap<&str, &Artifact> = existing
            .iter()
            .filter_map(|a| a.uuid_str().map(|u| (u, a)))
            .collect();

        let mut change_set = ChangeSet {
            deleted: existing
                .iter()
                .filter(|a| a.uuid_str().is_some_and(|u| !seen.contains(u)))
                .cloned()
                .collect(),
            ..Default::default()
        };

        for item in prepared {
            match item.uuid_str().and_then(|u| stored.get(u)) {
                None => change_set.created.push(item),
                Some(current) => {
                    let changes = field_changes(current, &item);
                    if changes.is_empty() {
                        change_set.unchanged += 1;
                    } else {
                        change_set.updated.push(ArtifactUpdate {
                            existing: (*current).clone(),
                            incoming: item,
                            changes,
                        });
                    }
                }
            }
        }

        change_set.sort();
        Ok(change_set)
    }

    /// True when the submitted list matches the stored one.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    pub fn deleted_uuids(&self) -> Vec<String> {
        self.deleted
            .iter()
            .filter_map(|a| a.uuid_str().map(str::to_string))
            .collect()
    }

    /// Human-readable description: deleted, then updated, then created, each by uuid.
    pub fn change_log(&self) -> Vec<String> {
        let label = |a: &Artifact| {
            format!(
                "{} ({})",
                a.uuid_str().unwrap_or_default(),
                a.title.trim()
            )
        };

        let deleted = self
            .deleted
            .iter()
            .map(|a| format!("Deleted artifact {}", label(a)));
        let updated = self.updated.iter().map(|u| {
            let fields: Vec<String> = u
                .changes
                .iter()
                .map(|c| format!("{}: '{}' -> '{}'", c.field, c.old, c.new))
                .collect();
            format!("Updated artifact {}: {}", label(&u.incoming), fields.join(", "))
        });
        let created = self
            .created
            .iter()
            .map(|a| format!("Created artifact {}", label(a)));

        deleted.chain(updated).chain(created).collect()
    }

    fn sort(&mut self) {
        self.created.sort_by(|a, b| a.uuid.cmp(&b.uuid));
        self.updated
            .sort_by(|a, b| a.incoming.uuid.cmp(&b.incoming.uuid));
        self.deleted.sort_by(|a, b| a.uuid.cmp(&b.uuid));
    }
}

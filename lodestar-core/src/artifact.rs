//! Artifact, count and engagement records
//!
//! These are the wire shapes shared by the document store, the snapshot
//! files in the repository and the HTTP API. The internal storage key is
//! carried alongside but never serialized.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::{new_artifact_uuid, Timestamp};

// ============================================================================
// ARTIFACT
// ============================================================================

/// A link or document attached to an engagement.
///
/// Required string fields deserialize to empty strings when absent so that
/// [`Artifact::validate`] can report them by item index instead of failing
/// the whole payload during decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Document store key. Preserved across updates.
    #[serde(skip)]
    pub id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    #[serde(default)]
    pub engagement_uuid: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "type", default)]
    pub artifact_type: String,

    #[serde(default)]
    pub link_address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(
        default,
        with = "crate::timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = DateTime))]
    pub created: Option<Timestamp>,

    #[serde(
        rename = "updated",
        default,
        with = "crate::timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = DateTime))]
    pub modified: Option<Timestamp>,
}

impl Artifact {
    /// The uuid, if present and non-blank.
    pub fn uuid_str(&self) -> Option<&str> {
        self.uuid.as_deref().filter(|u| !u.trim().is_empty())
    }

    /// Assign a fresh uuid when none (or a blank one) is present.
    ///
    /// Client supplied values are never replaced.
    pub fn ensure_uuid(&mut self) -> &str {
        if self.uuid_str().is_none() {
            self.uuid = Some(new_artifact_uuid());
        }
        self.uuid.as_deref().unwrap_or_default()
    }

    /// Last write time, falling back to creation time.
    pub fn last_modified(&self) -> Option<Timestamp> {
        self.modified.or(self.created)
    }

    /// Check the required fields. `index` is the item position in the request.
    pub fn validate(&self, index: usize) -> Result<(), ValidationError> {
        let required = [
            ("engagementUuid", &self.engagement_uuid),
            ("title", &self.title),
            ("description", &self.description),
            ("type", &self.artifact_type),
            ("linkAddress", &self.link_address),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::RequiredFieldMissing {
                    index,
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Validate every item of a submitted list, reporting the first failure.
pub fn validate_all(items: &[Artifact]) -> Result<(), ValidationError> {
    items
        .iter()
        .enumerate()
        .try_for_each(|(index, item)| item.validate(index))
}

// ============================================================================
// AGGREGATES
// ============================================================================

/// Result of a count query. `artifact_type` carries the group key for
/// per-type aggregates and is omitted for plain counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ArtifactCount {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
    pub count: u64,
}

impl ArtifactCount {
    pub fn total(count: u64) -> Self {
        Self {
            artifact_type: None,
            count,
        }
    }

    pub fn for_type(artifact_type: impl Into<String>, count: u64) -> Self {
        Self {
            artifact_type: Some(artifact_type.into()),
            count,
        }
    }
}

// ============================================================================
// ENGAGEMENT
// ============================================================================

/// Engagement as served by the engagement directory. Only the fields this
/// service needs are decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Engagement {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub project_id: Option<i64>,
}

impl Engagement {
    pub fn new(uuid: impl Into<String>, project_id: i64) -> Self {
        Self {
            uuid: Some(uuid.into()),
            project_id: Some(project_id),
        }
    }

    /// Repository project holding this engagement's files.
    pub fn require_project_id(&self) -> Result<i64, ValidationError> {
        self.project_id.ok_or_else(|| ValidationError::InvalidValue {
            field: "project_id".to_string(),
            reason: format!(
                "engagement {} has no repository project",
                self.uuid.as_deref().unwrap_or("<unknown>")
            ),
        })
    }
}

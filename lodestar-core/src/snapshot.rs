//! Snapshot file codec
//!
//! Each engagement's artifacts live in the repository as a pretty-printed
//! JSON array. Older engagements also keep an `engagement.json` document
//! whose `artifacts` key mirrors that array.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::artifact::Artifact;
use crate::error::SnapshotError;

/// Key in the legacy engagement document holding the artifact array.
pub const LEGACY_ARTIFACTS_KEY: &str = "artifacts";

/// Serialize an artifact list to snapshot file content.
pub fn encode(artifacts: &[Artifact]) -> Result<String, SnapshotError> {
    serde_json::to_string_pretty(artifacts).map_err(|e| SnapshotError::Serialize {
        reason: e.to_string(),
    })
}

/// Parse snapshot file content. Blank content decodes to an empty list.
pub fn decode(content: &str) -> Result<Vec<Artifact>, SnapshotError> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(content).map_err(|e| SnapshotError::Malformed {
        reason: e.to_string(),
    })
}

/// Replace the `artifacts` key of a legacy engagement document.
///
/// Top-level keys are re-emitted in sorted order regardless of how the
/// document was written.
pub fn merge_into_legacy(document: &str, artifacts: &[Artifact]) -> Result<String, SnapshotError> {
    let parsed: Value = if document.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(document).map_err(|e| SnapshotError::Malformed {
            reason: e.to_string(),
        })?
    };

    let Value::Object(fields) = parsed else {
        return Err(SnapshotError::Malformed {
            reason: "engagement document is not a JSON object".to_string(),
        });
    };

    let mut sorted: BTreeMap<String, Value> = fields.into_iter().collect();
    let array = serde_json::to_value(artifacts).map_err(|e| SnapshotError::Serialize {
        reason: e.to_string(),
    })?;
    sorted.insert(LEGACY_ARTIFACTS_KEY.to_string(), array);

    serde_json::to_string_pretty(&sorted).map_err(|e| SnapshotError::Serialize {
        reason: e.to_string(),
    })
}

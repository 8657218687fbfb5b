//! In-memory document store

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use ::async_trait::async_trait;
use lodestar_core::{
    Artifact, ArtifactCount, ArtifactFilter, LodestarResult, PageRequest, SortSpec, StorageError,
};
use tokio::sync::RwLock;

use crate::ArtifactStore;

#[derive(Debug, Default)]
struct StoreState {
    next_id: i64,
    artifacts: BTreeMap<String, Artifact>,
    /// Engagements whose writes are rejected. Test hook.
    failing: HashSet<String>,
}

impl StoreState {
    fn check_writable(&self, engagement_uuid: &str) -> LodestarResult<()> {
        if self.failing.contains(engagement_uuid) {
            return Err(StorageError::Backend {
                reason: format!("writes rejected for engagement {engagement_uuid}"),
            }
            .into());
        }
        Ok(())
    }
}

fn in_regions(artifact: &Artifact, regions: &[String]) -> bool {
    regions.is_empty()
        || artifact
            .region
            .as_ref()
            .is_some_and(|r| regions.contains(r))
}

/// In-memory [`ArtifactStore`] for tests and the `memory` backend.
#[derive(Debug, Default, Clone)]
pub struct InMemoryArtifactStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryArtifactStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored artifacts.
    pub async fn len(&self) -> usize {
        self.state.read().await.artifacts.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of every stored artifact, ordered by uuid.
    pub async fn all(&self) -> Vec<Artifact> {
        self.state.read().await.artifacts.values().cloned().collect()
    }

    /// Reject every write touching `engagement_uuid` with a backend error.
    pub async fn fail_engagement(&self, engagement_uuid: impl Into<String>) {
        self.state.write().await.failing.insert(engagement_uuid.into());
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn find_by_uuid(&self, uuid: &str) -> LodestarResult<Option<Artifact>> {
        Ok(self.state.read().await.artifacts.get(uuid).cloned())
    }

    async fn list_by_engagement(&self, engagement_uuid: &str) -> LodestarResult<Vec<Artifact>> {
        let state = self.state.read().await;
        let mut items: Vec<Artifact> = state
            .artifacts
            .values()
            .filter(|a| a.engagement_uuid == engagement_uuid)
            .cloned()
            .collect();
        SortSpec::newest_first().sort(&mut items);
        Ok(items)
    }

    async fn insert(&self, artifact: &Artifact) -> LodestarResult<Artifact> {
        let uuid = artifact
            .uuid_str()
            .ok_or_else(|| StorageError::Backend {
                reason: "artifact has no uuid".to_string(),
            })?
            .to_string();

        let mut state = self.state.write().await;
        state.check_writable(&artifact.engagement_uuid)?;
        if state.artifacts.contains_key(&uuid) {
            return Err(StorageError::DuplicateKey { uuid }.into());
        }

        state.next_id += 1;
        let mut stored = artifact.clone();
        stored.id = Some(state.next_id);
        state.artifacts.insert(uuid, stored.clone());
        Ok(stored)
    }

    async fn update(&self, artifact: &Artifact) -> LodestarResult<Artifact> {
        let uuid = artifact.uuid_str().unwrap_or_default().to_string();

        let mut state = self.state.write().await;
        state.check_writable(&artifact.engagement_uuid)?;
        let current = state
            .artifacts
            .get_mut(&uuid)
            .ok_or_else(|| StorageError::NotFound { uuid: uuid.clone() })?;

        let id = current.id;
        *current = artifact.clone();
        current.id = artifact.id.or(id);
        Ok(current.clone())
    }

    async fn delete_by_uuid(&self, uuid: &str) -> LodestarResult<u64> {
        let mut state = self.state.write().await;
        if let Some(engagement) = state.artifacts.get(uuid).map(|a| a.engagement_uuid.clone()) {
            state.check_writable(&engagement)?;
        }
        Ok(state.artifacts.remove(uuid).map_or(0, |_| 1))
    }

    async fn delete_all(&self) -> LodestarResult<u64> {
        let mut state = self.state.write().await;
        let removed = state.artifacts.len() as u64;
        state.artifacts.clear();
        Ok(removed)
    }

    async fn list(
        &self,
        filter: &ArtifactFilter,
        sort: &SortSpec,
        page: PageRequest,
    ) -> LodestarResult<Vec<Artifact>> {
        let state = self.state.read().await;
        let mut items: Vec<Artifact> = state
            .artifacts
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        sort.sort(&mut items);
        Ok(items
            .into_iter()
            .skip(page.offset())
            .take(page.page_size)
            .collect())
    }

    async fn count(&self, filter: &ArtifactFilter) -> LodestarResult<u64> {
        let state = self.state.read().await;
        Ok(state.artifacts.values().filter(|a| filter.matches(a)).count() as u64)
    }

    async fn count_by_type(&self, regions: &[String]) -> LodestarResult<Vec<ArtifactCount>> {
        let state = self.state.read().await;
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for artifact in state.artifacts.values().filter(|a| in_regions(a, regions)) {
            *counts.entry(artifact.artifact_type.as_str()).or_default() += 1;
        }

        let mut result: Vec<ArtifactCount> = counts
            .into_iter()
            .map(|(t, count)| ArtifactCount::for_type(t, count))
            .collect();
        result.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.artifact_type.cmp(&b.artifact_type))
        });
        Ok(result)
    }

    async fn count_by_engagement(&self) -> LodestarResult<BTreeMap<String, u64>> {
        let state = self.state.read().await;
        let mut counts = BTreeMap::new();
        for artifact in state.artifacts.values() {
            *counts.entry(artifact.engagement_uuid.clone()).or_default() += 1;
        }
        Ok(counts)
    }

    async fn distinct_types(&self, regions: &[String]) -> LodestarResult<BTreeSet<String>> {
        let state = self.state.read().await;
        Ok(state
            .artifacts
            .values()
            .filter(|a| in_regions(a, regions))
            .map(|a| a.artifact_type.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestar_core::{timestamp, LodestarError, SortField, SortKey};

    fn artifact(uuid: &str, engagement: &str, t: &str, region: Option<&str>) -> Artifact {
        Artifact {
            uuid: Some(uuid.to_string()),
            engagement_uuid: engagement.to_string(),
            title: format!("title {uuid}"),
            description: "description".to_string(),
            artifact_type: t.to_string(),
            link_address: "https://example.com".to_string(),
            region: region.map(str::to_string),
            created: timestamp::parse("2021-01-01T00:00:00Z"),
            modified: timestamp::parse("2021-01-01T00:00:00Z"),
            ..Default::default()
        }
    }

    async fn seeded() -> InMemoryArtifactStore {
        let store = InMemoryArtifactStore::new();
        for a in [
            artifact("a", "1111", "Demo", Some("na")),
            artifact("b", "1111", "Multimedia", Some("na")),
            artifact("c", "2222", "Demo", Some("emea")),
            artifact("d", "2222", "Demo", None),
        ] {
            store.insert(&a).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_insert_assigns_key_and_rejects_duplicates() {
        let store = InMemoryArtifactStore::new();
        let stored = store
            .insert(&artifact("a", "1111", "Demo", None))
            .await
            .unwrap();
        assert_eq!(stored.id, Some(1));

        let err = store
            .insert(&artifact("a", "1111", "Demo", None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LodestarError::Storage(StorageError::DuplicateKey { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_preserves_key() {
        let store = seeded().await;
        let mut changed = artifact("a", "1111", "Demo", Some("na"));
        changed.title = "renamed".to_string();

        let updated = store.update(&changed).await.unwrap();
        assert_eq!(updated.id, Some(1));
        assert_eq!(
            store.find_by_uuid("a").await.unwrap().unwrap().title,
            "renamed"
        );
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = InMemoryArtifactStore::new();
        let err = store
            .update(&artifact("zzz", "1111", "Demo", None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LodestarError::Storage(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_count_by_region_and_type() {
        let store = seeded().await;
        let filter = ArtifactFilter::RegionAndType {
            regions: vec!["na".to_string()],
            artifact_type: "Demo".to_string(),
        };
        assert_eq!(store.count(&filter).await.unwrap(), 1);
        assert_eq!(store.count(&ArtifactFilter::All).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_list_pages_in_sort_order() {
        let store = seeded().await;
        let sort = SortSpec::by([SortKey::desc(SortField::Uuid)]);
        let page = PageRequest {
            page: 1,
            page_size: 3,
        };
        let items = store.list(&ArtifactFilter::All, &sort, page).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].uuid.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_count_by_type_ordering() {
        let store = seeded().await;
        let counts = store.count_by_type(&[]).await.unwrap();
        assert_eq!(
            counts,
            vec![
                ArtifactCount::for_type("Demo", 3),
                ArtifactCount::for_type("Multimedia", 1),
            ]
        );

        let na = store.count_by_type(&["na".to_string()]).await.unwrap();
        assert_eq!(
            na,
            vec![
                ArtifactCount::for_type("Demo", 1),
                ArtifactCount::for_type("Multimedia", 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_engagement_counts_and_types() {
        let store = seeded().await;
        let counts = store.count_by_engagement().await.unwrap();
        assert_eq!(counts.get("1111"), Some(&2));
        assert_eq!(counts.get("2222"), Some(&2));

        let types = store.distinct_types(&["emea".to_string()]).await.unwrap();
        assert_eq!(types.into_iter().collect::<Vec<_>>(), vec!["Demo"]);
    }

    #[tokio::test]
    async fn test_delete_paths() {
        let store = seeded().await;
        assert_eq!(store.delete_by_uuid("a").await.unwrap(), 1);
        assert_eq!(store.delete_by_uuid("a").await.unwrap(), 0);
        assert_eq!(store.delete_all().await.unwrap(), 3);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_failing_engagement_rejects_writes() {
        let store = seeded().await;
        store.fail_engagement("2222").await;
        assert!(store.delete_by_uuid("c").await.is_err());
        assert!(store
            .insert(&artifact("e", "2222", "Demo", None))
            .await
            .is_err());
        assert_eq!(store.delete_by_uuid("a").await.unwrap(), 1);
    }
}

//! Engagement directory abstraction

use std::collections::HashMap;
use std::sync::Arc;

use ::async_trait::async_trait;
use lodestar_core::{Engagement, RemoteError};
use tokio::sync::RwLock;

/// Source of engagements and their repository projects.
#[async_trait]
pub trait EngagementDirectory: Send + Sync {
    async fn list_engagements(&self) -> Result<Vec<Engagement>, RemoteError>;

    /// Fails with `RemoteError::NotFound` for unknown engagements.
    async fn get_engagement(&self, engagement_uuid: &str) -> Result<Engagement, RemoteError>;

    /// Report the artifact total of an engagement.
    async fn update_artifact_count(
        &self,
        engagement_uuid: &str,
        count: usize,
    ) -> Result<(), RemoteError>;
}

#[derive(Debug, Default)]
struct DirectoryState {
    engagements: Vec<Engagement>,
    counts: HashMap<String, usize>,
    count_updates: usize,
    fail_counts: bool,
}

/// In-memory [`EngagementDirectory`].
#[derive(Debug, Default, Clone)]
pub struct InMemoryEngagementDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

impl InMemoryEngagementDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engagements(engagements: impl IntoIterator<Item = Engagement>) -> Self {
        Self {
            state: Arc::new(RwLock::new(DirectoryState {
                engagements: engagements.into_iter().collect(),
                ..Default::default()
            })),
        }
    }

    pub async fn add(&self, engagement: Engagement) {
        self.state.write().await.engagements.push(engagement);
    }

    /// Last count reported for an engagement.
    pub async fn reported_count(&self, engagement_uuid: &str) -> Option<usize> {
        self.state.read().await.counts.get(engagement_uuid).copied()
    }

    /// Number of count notifications received.
    pub async fn count_updates(&self) -> usize {
        self.state.read().await.count_updates
    }

    /// Make count notifications fail.
    pub async fn fail_count_updates(&self) {
        self.state.write().await.fail_counts = true;
    }
}

#[async_trait]
impl EngagementDirectory for InMemoryEngagementDirectory {
    async fn list_engagements(&self) -> Result<Vec<Engagement>, RemoteError> {
        Ok(self.state.read().await.engagements.clone())
    }

    async fn get_engagement(&self, engagement_uuid: &str) -> Result<Engagement, RemoteError> {
        self.state
            .read()
            .await
            .engagements
            .iter()
            .find(|e| e.uuid.as_deref() == Some(engagement_uuid))
            .cloned()
            .ok_or_else(|| RemoteError::NotFound {
                resource: format!("engagement {engagement_uuid}"),
            })
    }

    async fn update_artifact_count(
        &self,
        engagement_uuid: &str,
        count: usize,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.write().await;
        if state.fail_counts {
            return Err(RemoteError::Fatal {
                service: "engagements".to_string(),
                status: Some(500),
                reason: "count update rejected".to_string(),
            });
        }
        state.count_updates += 1;
        state.counts.insert(engagement_uuid.to_string(), count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_and_counts() {
        let directory = InMemoryEngagementDirectory::with_engagements([Engagement::new("1111", 91)]);
        assert_eq!(directory.get_engagement("1111").await.unwrap().project_id, Some(91));
        assert!(directory.get_engagement("nope").await.unwrap_err().is_not_found());

        directory.update_artifact_count("1111", 3).await.unwrap();
        assert_eq!(directory.reported_count("1111").await, Some(3));
        assert_eq!(directory.count_updates().await, 1);
    }
}

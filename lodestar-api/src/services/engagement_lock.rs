//! Per-engagement mutual exclusion
//!
//! Reconciliation and refresh of one engagement never interleave. Different
//! engagements proceed in parallel.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lazily created async mutex per engagement uuid.
#[derive(Debug, Default, Clone)]
pub struct EngagementLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl EngagementLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `engagement_uuid`.
    pub async fn acquire(&self, engagement_uuid: &str) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the map shard is not held across the await.
        let lock = self
            .locks
            .entry(engagement_uuid.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Number of engagements seen so far.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_engagement_serializes() {
        let locks = EngagementLocks::new();
        let guard = locks.acquire("1111").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("1111").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should acquire after release")
            .expect("task panicked");
    }

    #[tokio::test]
    async fn test_different_engagements_do_not_block() {
        let locks = EngagementLocks::new();
        let _first = locks.acquire("1111").await;
        let second = tokio::time::timeout(Duration::from_millis(100), locks.acquire("2222")).await;
        assert!(second.is_ok());
        assert_eq!(locks.len(), 2);
    }
}

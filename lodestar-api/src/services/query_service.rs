//! Query Service
//!
//! Read-side operations: filtered and paged listings plus aggregate counts.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use lodestar_core::{
    normalize_regions, Artifact, ArtifactCount, ArtifactsConfig, CountOptions, ListOptions,
    LodestarResult,
};
use lodestar_storage::ArtifactStore;

/// One page of a listing with the totals reported in response headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub items: Vec<Artifact>,
    pub page: usize,
    pub page_size: usize,
    pub total: u64,
    pub total_pages: u64,
}

pub struct QueryService {
    store: Arc<dyn ArtifactStore>,
    config: Arc<ArtifactsConfig>,
}

impl QueryService {
    pub fn new(store: Arc<dyn ArtifactStore>, config: Arc<ArtifactsConfig>) -> Self {
        Self { store, config }
    }

    pub async fn list(&self, options: &ListOptions) -> LodestarResult<Page> {
        let query = options.resolve(self.config.default_page_size)?;
        let total = self.store.count(&query.filter).await?;
        let items = self
            .store
            .list(&query.filter, &query.sort, query.page)
            .await?;
        Ok(Page {
            items,
            page: query.page.page,
            page_size: query.page.page_size,
            total,
            total_pages: query.page.total_pages(total),
        })
    }

    pub async fn count(&self, options: &CountOptions) -> LodestarResult<ArtifactCount> {
        let filter = options.to_filter()?;
        Ok(ArtifactCount::total(self.store.count(&filter).await?))
    }

    pub async fn types(&self, regions: &[String]) -> LodestarResult<BTreeSet<String>> {
        self.store.distinct_types(&normalize_regions(regions)).await
    }

    pub async fn type_counts(&self, regions: &[String]) -> LodestarResult<Vec<ArtifactCount>> {
        self.store.count_by_type(&normalize_regions(regions)).await
    }

    pub async fn engagement_counts(&self) -> LodestarResult<BTreeMap<String, u64>> {
        self.store.count_by_engagement().await
    }

    /// Every artifact of one engagement, newest first.
    pub async fn by_engagement(&self, engagement_uuid: &str) -> LodestarResult<Vec<Artifact>> {
        self.store.list_by_engagement(engagement_uuid).await
    }

    /// Reachability of the document store.
    pub async fn ping(&self) -> LodestarResult<()> {
        self.store.ping().await
    }
}

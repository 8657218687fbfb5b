//! List and count filter descriptors
//!
//! Query parameters arrive loosely typed: optional engagement/type, any
//! number of regions, signed paging values and a free-form sort string.
//! This module turns them into an [`ArtifactFilter`], a clamped
//! [`PageRequest`] and a whitelisted [`SortSpec`] that stores can execute.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::error::ValidationError;

/// Page size used when the caller sends none or a non-positive one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

// ============================================================================
// SORTING
// ============================================================================

/// Fields a client may sort on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Uuid,
    EngagementUuid,
    Title,
    Description,
    Type,
    LinkAddress,
    Region,
    Created,
    Modified,
}

impl SortField {
    /// Resolve a wire field name. `modified` is accepted as an alias of `updated`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "uuid" => Some(Self::Uuid),
            "engagementUuid" => Some(Self::EngagementUuid),
            "title" => Some(Self::Title),
            "description" => Some(Self::Description),
            "type" => Some(Self::Type),
            "linkAddress" => Some(Self::LinkAddress),
            "region" => Some(Self::Region),
            "created" => Some(Self::Created),
            "updated" | "modified" => Some(Self::Modified),
            _ => None,
        }
    }

    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Uuid => "uuid",
            Self::EngagementUuid => "engagementUuid",
            Self::Title => "title",
            Self::Description => "description",
            Self::Type => "type",
            Self::LinkAddress => "linkAddress",
            Self::Region => "region",
            Self::Created => "created",
            Self::Modified => "updated",
        }
    }

    /// Column name in the relational store.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Uuid => "uuid",
            Self::EngagementUuid => "engagement_uuid",
            Self::Title => "title",
            Self::Description => "description",
            Self::Type => "artifact_type",
            Self::LinkAddress => "link_address",
            Self::Region => "region",
            Self::Created => "created",
            Self::Modified => "modified",
        }
    }

    fn compare(&self, a: &Artifact, b: &Artifact) -> Ordering {
        match self {
            Self::Uuid => a.uuid.cmp(&b.uuid),
            Self::EngagementUuid => a.engagement_uuid.cmp(&b.engagement_uuid),
            Self::Title => a.title.cmp(&b.title),
            Self::Description => a.description.cmp(&b.description),
            Self::Type => a.artifact_type.cmp(&b.artifact_type),
            Self::LinkAddress => a.link_address.cmp(&b.link_address),
            Self::Region => a.region.cmp(&b.region),
            Self::Created => a.created.cmp(&b.created),
            Self::Modified => a.modified.cmp(&b.modified),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Only the exact text `DESC` selects descending order.
    pub fn parse(raw: &str) -> Self {
        if raw.trim() == "DESC" {
            Self::Desc
        } else {
            Self::Asc
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortKey {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Desc,
        }
    }
}

/// Ordered sort keys. Always ends with `uuid` so paging is deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl SortSpec {
    /// Build from explicit keys, appending the `uuid` tie-breaker if missing.
    pub fn by(keys: impl IntoIterator<Item = SortKey>) -> Self {
        let mut keys: Vec<SortKey> = keys.into_iter().collect();
        if !keys.iter().any(|k| k.field == SortField::Uuid) {
            keys.push(SortKey::asc(SortField::Uuid));
        }
        Self { keys }
    }

    /// Parse `field|DIR,field|DIR`. Unknown fields are rejected.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let mut keys = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let mut pieces = part.splitn(2, '|');
            let name = pieces.next().unwrap_or_default();
            let direction = pieces.next().map(SortDirection::parse).unwrap_or_default();
            let field = SortField::parse(name).ok_or_else(|| ValidationError::InvalidValue {
                field: "sort".to_string(),
                reason: format!("unknown sort field '{}'", name.trim()),
            })?;
            keys.push(SortKey { field, direction });
        }
        Ok(Self::by(keys))
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn compare(&self, a: &Artifact, b: &Artifact) -> Ordering {
        self.keys
            .iter()
            .map(|key| {
                let ord = key.field.compare(a, b);
                match key.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }

    pub fn sort(&self, items: &mut [Artifact]) {
        items.sort_by(|a, b| self.compare(a, b));
    }

    /// Newest first. Used for per-engagement listings.
    pub fn newest_first() -> Self {
        Self::by([SortKey::desc(SortField::Modified)])
    }
}

// ============================================================================
// PAGING
// ============================================================================

/// Zero-based page with a positive size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

impl PageRequest {
    /// Clamp raw values: negative pages become 0, sizes below 1 become `default_size`.
    pub fn clamped(page: Option<i64>, page_size: Option<i64>, default_size: usize) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(0) as usize;
        let page_size = page_size
            .filter(|s| *s > 0)
            .map(|s| s as usize)
            .unwrap_or_else(|| default_size.max(1));
        Self { page, page_size }
    }

    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.page_size)
    }

    /// Page count reported to clients for `total` matching records.
    pub fn total_pages(&self, total: u64) -> u64 {
        total / self.page_size as u64 + 1
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

// ============================================================================
// FILTERS
// ============================================================================

/// Store-level selection, resolved from the loose options below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactFilter {
    All,
    Engagement(String),
    Type(String),
    Region(Vec<String>),
    RegionAndType {
        regions: Vec<String>,
        artifact_type: String,
    },
}

impl ArtifactFilter {
    pub fn matches(&self, artifact: &Artifact) -> bool {
        let in_regions = |regions: &[String]| {
            artifact
                .region
                .as_ref()
                .is_some_and(|r| regions.iter().any(|wanted| wanted == r))
        };
        match self {
            Self::All => true,
            Self::Engagement(uuid) => &artifact.engagement_uuid == uuid,
            Self::Type(t) => &artifact.artifact_type == t,
            Self::Region(regions) => in_regions(regions),
            Self::RegionAndType {
                regions,
                artifact_type,
            } => &artifact.artifact_type == artifact_type && in_regions(regions),
        }
    }

    /// Ordering applied when the client asks for none.
    pub fn default_sort(&self) -> SortSpec {
        match self {
            Self::Engagement(_) => SortSpec::newest_first(),
            Self::All => SortSpec::by([
                SortKey::desc(SortField::Modified),
                SortKey::asc(SortField::EngagementUuid),
            ]),
            _ => SortSpec::by([]),
        }
    }
}

/// Filters shared by list and count queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountOptions {
    pub engagement_uuid: Option<String>,
    pub artifact_type: Option<String>,
    pub regions: Vec<String>,
}

impl CountOptions {
    /// Resolve to a store filter.
    ///
    /// Precedence: region+type, region, type, engagement, all. Type and
    /// engagement together are rejected.
    pub fn to_filter(&self) -> Result<ArtifactFilter, ValidationError> {
        let engagement = non_blank(&self.engagement_uuid);
        let artifact_type = non_blank(&self.artifact_type);
        let regions = normalize_regions(&self.regions);

        if engagement.is_some() && artifact_type.is_some() {
            return Err(ValidationError::MutuallyExclusive {
                first: "Type".to_string(),
                second: "engagement".to_string(),
            });
        }

        Ok(match (regions.is_empty(), artifact_type, engagement) {
            (false, Some(t), _) => ArtifactFilter::RegionAndType {
                regions,
                artifact_type: t,
            },
            (false, None, _) => ArtifactFilter::Region(regions),
            (true, Some(t), _) => ArtifactFilter::Type(t),
            (true, None, Some(e)) => ArtifactFilter::Engagement(e),
            (true, None, None) => ArtifactFilter::All,
        })
    }
}

/// Filters plus paging and sort for list queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub filter: CountOptions,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub sort: Option<String>,
}

/// A validated list query ready for a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedQuery {
    pub filter: ArtifactFilter,
    pub page: PageRequest,
    pub sort: SortSpec,
}

impl ListOptions {
    pub fn resolve(&self, default_page_size: usize) -> Result<ResolvedQuery, ValidationError> {
        let filter = self.filter.to_filter()?;
        let sort = match non_blank(&self.sort) {
            Some(raw) => SortSpec::parse(&raw)?,
            None => filter.default_sort(),
        };
        Ok(ResolvedQuery {
            page: PageRequest::clamped(self.page, self.page_size, default_page_size),
            filter,
            sort,
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Split comma-separated entries and drop blanks.
pub fn normalize_regions(raw: &[String]) -> Vec<String> {
    raw.iter()
        .flat_map(|r| r.split(','))
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

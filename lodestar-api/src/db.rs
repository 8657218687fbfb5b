//! Database Connection Pool and PostgreSQL Artifact Store
//!
//! Connection pooling via deadpool-postgres and an [`ArtifactStore`] backed
//! by a single `artifacts` table.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use lodestar_core::{
    Artifact, ArtifactCount, ArtifactFilter, LodestarResult, PageRequest, SortSpec, StorageError,
};
use lodestar_storage::ArtifactStore;
use tokio_postgres::{error::SqlState, types::ToSql, NoTls, Row};

use crate::error::{ApiError, ApiResult};

// ============================================================================
// DATABASE CONFIGURATION
// ============================================================================

/// Database connection configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "lodestar".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("LODESTAR_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("LODESTAR_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("LODESTAR_DB_NAME").unwrap_or_else(|_| "lodestar".to_string()),
            user: std::env::var("LODESTAR_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("LODESTAR_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("LODESTAR_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("LODESTAR_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.connect_timeout = Some(self.timeout);

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(deadpool_postgres::PoolConfig::new(self.max_size));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS artifacts (
    id              BIGSERIAL PRIMARY KEY,
    uuid            TEXT NOT NULL UNIQUE,
    engagement_uuid TEXT NOT NULL,
    title           TEXT NOT NULL,
    description     TEXT NOT NULL,
    artifact_type   TEXT NOT NULL,
    link_address    TEXT NOT NULL,
    region          TEXT,
    created         TIMESTAMPTZ,
    modified        TIMESTAMPTZ
);
CREATE INDEX IF NOT EXISTS artifacts_engagement_idx ON artifacts (engagement_uuid);
CREATE INDEX IF NOT EXISTS artifacts_type_idx ON artifacts (artifact_type);
CREATE INDEX IF NOT EXISTS artifacts_region_idx ON artifacts (region);
"#;

const COLUMNS: &str = "id, uuid, engagement_uuid, title, description, artifact_type, \
                       link_address, region, created, modified";

// ============================================================================
// QUERY BUILDING
// ============================================================================

type SqlParam<'a> = &'a (dyn ToSql + Sync);

/// WHERE clause and its parameters, numbered from `$1`.
fn where_clause(filter: &ArtifactFilter) -> (String, Vec<SqlParam<'_>>) {
    match filter {
        ArtifactFilter::All => (String::new(), Vec::new()),
        ArtifactFilter::Engagement(uuid) => (
            " WHERE engagement_uuid = $1".to_string(),
            vec![uuid as SqlParam<'_>],
        ),
        ArtifactFilter::Type(t) => (
            " WHERE artifact_type = $1".to_string(),
            vec![t as SqlParam<'_>],
        ),
        ArtifactFilter::Region(regions) => (
            " WHERE region = ANY($1)".to_string(),
            vec![regions as SqlParam<'_>],
        ),
        ArtifactFilter::RegionAndType {
            regions,
            artifact_type,
        } => (
            " WHERE region = ANY($1) AND artifact_type = $2".to_string(),
            vec![regions as SqlParam<'_>, artifact_type as SqlParam<'_>],
        ),
    }
}

/// ORDER BY built from whitelisted column names only.
fn order_clause(sort: &SortSpec) -> String {
    let keys: Vec<String> = sort
        .keys()
        .iter()
        .map(|k| format!("{} {}", k.field.column(), k.direction.as_sql()))
        .collect();
    format!(" ORDER BY {}", keys.join(", "))
}

fn regions_clause(regions: &[String]) -> &'static str {
    if regions.is_empty() {
        ""
    } else {
        " WHERE region = ANY($1)"
    }
}

fn backend(err: impl std::fmt::Display) -> StorageError {
    StorageError::Backend {
        reason: err.to_string(),
    }
}

fn row_to_artifact(row: &Row) -> Artifact {
    Artifact {
        id: Some(row.get("id")),
        uuid: Some(row.get("uuid")),
        engagement_uuid: row.get("engagement_uuid"),
        title: row.get("title"),
        description: row.get("description"),
        artifact_type: row.get("artifact_type"),
        link_address: row.get("link_address"),
        region: row.get("region"),
        created: row.get("created"),
        modified: row.get("modified"),
    }
}

fn required_uuid(artifact: &Artifact) -> Result<&str, StorageError> {
    artifact.uuid_str().ok_or_else(|| StorageError::Backend {
        reason: "artifact has no uuid".to_string(),
    })
}

// ============================================================================
// POSTGRES ARTIFACT STORE
// ============================================================================

/// [`ArtifactStore`] over a deadpool-postgres connection pool.
#[derive(Clone)]
pub struct PgArtifactStore {
    pool: Pool,
}

impl PgArtifactStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn get_conn(&self) -> Result<deadpool_postgres::Object, StorageError> {
        self.pool.get().await.map_err(backend)
    }

    /// Create the `artifacts` table and indexes if missing.
    pub async fn ensure_schema(&self) -> ApiResult<()> {
        let conn = self.pool.get().await?;
        conn.batch_execute(SCHEMA).await?;
        tracing::info!("Artifact schema ready");
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for PgArtifactStore {
    async fn find_by_uuid(&self, uuid: &str) -> LodestarResult<Option<Artifact>> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {} FROM artifacts WHERE uuid = $1", COLUMNS);
        let row = conn.query_opt(&sql, &[&uuid]).await.map_err(backend)?;
        Ok(row.as_ref().map(row_to_artifact))
    }

    async fn list_by_engagement(&self, engagement_uuid: &str) -> LodestarResult<Vec<Artifact>> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "SELECT {} FROM artifacts WHERE engagement_uuid = $1{}",
            COLUMNS,
            order_clause(&SortSpec::newest_first())
        );
        let rows = conn.query(&sql, &[&engagement_uuid]).await.map_err(backend)?;
        Ok(rows.iter().map(row_to_artifact).collect())
    }

    async fn insert(&self, artifact: &Artifact) -> LodestarResult<Artifact> {
        let uuid = required_uuid(artifact)?;
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                "INSERT INTO artifacts (uuid, engagement_uuid, title, description, artifact_type, \
                 link_address, region, created, modified) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
                &[
                    &uuid,
                    &artifact.engagement_uuid,
                    &artifact.title,
                    &artifact.description,
                    &artifact.artifact_type,
                    &artifact.link_address,
                    &artifact.region,
                    &artifact.created,
                    &artifact.modified,
                ],
            )
            .await
            .map_err(|e| {
                if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    StorageError::DuplicateKey {
                        uuid: uuid.to_string(),
                    }
                } else {
                    backend(e)
                }
            })?;

        let mut stored = artifact.clone();
        stored.id = Some(row.get(0));
        Ok(stored)
    }

    async fn update(&self, artifact: &Artifact) -> LodestarResult<Artifact> {
        let uuid = required_uuid(artifact)?;
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                "UPDATE artifacts SET engagement_uuid = $2, title = $3, description = $4, \
                 artifact_type = $5, link_address = $6, region = $7, created = $8, modified = $9 \
                 WHERE uuid = $1 RETURNING id",
                &[
                    &uuid,
                    &artifact.engagement_uuid,
                    &artifact.title,
                    &artifact.description,
                    &artifact.artifact_type,
                    &artifact.link_address,
                    &artifact.region,
                    &artifact.created,
                    &artifact.modified,
                ],
            )
            .await
            .map_err(backend)?;

        match row {
            Some(row) => {
                let mut stored = artifact.clone();
                stored.id = Some(row.get(0));
                Ok(stored)
            }
            None => Err(StorageError::NotFound {
                uuid: uuid.to_string(),
            }
            .into()),
        }
    }

    async fn delete_by_uuid(&self, uuid: &str) -> LodestarResult<u64> {
        let conn = self.get_conn().await?;
        Ok(conn
            .execute("DELETE FROM artifacts WHERE uuid = $1", &[&uuid])
            .await
            .map_err(backend)?)
    }

    async fn delete_all(&self) -> LodestarResult<u64> {
        let conn = self.get_conn().await?;
        Ok(conn
            .execute("DELETE FROM artifacts", &[])
            .await
            .map_err(backend)?)
    }

    async fn list(
        &self,
        filter: &ArtifactFilter,
        sort: &SortSpec,
        page: PageRequest,
    ) -> LodestarResult<Vec<Artifact>> {
        let limit = page.page_size as i64;
        let offset = page.offset() as i64;
        let (clause, mut params) = where_clause(filter);
        let sql = format!(
            "SELECT {} FROM artifacts{}{} LIMIT ${} OFFSET ${}",
            COLUMNS,
            clause,
            order_clause(sort),
            params.len() + 1,
            params.len() + 2
        );
        params.push(&limit);
        params.push(&offset);

        let conn = self.get_conn().await?;
        let rows = conn.query(&sql, &params).await.map_err(backend)?;
        Ok(rows.iter().map(row_to_artifact).collect())
    }

    async fn count(&self, filter: &ArtifactFilter) -> LodestarResult<u64> {
        let (clause, params) = where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM artifacts{}", clause);
        let conn = self.get_conn().await?;
        let row = conn.query_one(&sql, &params).await.map_err(backend)?;
        let count: i64 = row.get(0);
        Ok(count.max(0) as u64)
    }

    async fn count_by_type(&self, regions: &[String]) -> LodestarResult<Vec<ArtifactCount>> {
        let regions = regions.to_vec();
        let sql = format!(
            "SELECT artifact_type, COUNT(*) FROM artifacts{} \
             GROUP BY artifact_type ORDER BY COUNT(*) DESC, artifact_type ASC",
            regions_clause(&regions)
        );
        let conn = self.get_conn().await?;
        let rows = if regions.is_empty() {
            conn.query(&sql, &[]).await
        } else {
            conn.query(&sql, &[&regions]).await
        }
        .map_err(backend)?;

        Ok(rows
            .iter()
            .map(|row| {
                let count: i64 = row.get(1);
                ArtifactCount::for_type(row.get::<_, String>(0), count.max(0) as u64)
            })
            .collect())
    }

    async fn count_by_engagement(&self) -> LodestarResult<BTreeMap<String, u64>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                "SELECT engagement_uuid, COUNT(*) FROM artifacts GROUP BY engagement_uuid",
                &[],
            )
            .await
            .map_err(backend)?;
        Ok(rows
            .iter()
            .map(|row| {
                let count: i64 = row.get(1);
                (row.get::<_, String>(0), count.max(0) as u64)
            })
            .collect())
    }

    async fn distinct_types(&self, regions: &[String]) -> LodestarResult<BTreeSet<String>> {
        let regions = regions.to_vec();
        let sql = format!(
            "SELECT DISTINCT artifact_type FROM artifacts{}",
            regions_clause(&regions)
        );
        let conn = self.get_conn().await?;
        let rows = if regions.is_empty() {
            conn.query(&sql, &[]).await
        } else {
            conn.query(&sql, &[&regions]).await
        }
        .map_err(backend)?;
        Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
    }

    async fn ping(&self) -> LodestarResult<()> {
        let conn = self.get_conn().await?;
        conn.query_one("SELECT 1", &[]).await.map_err(backend)?;
        Ok(())
    }
}

//! Snapshot Writer
//!
//! Mirrors an engagement's artifact list into its repository project as a
//! JSON file, optionally folding the same list into the legacy engagement
//! document within one commit.

use std::sync::Arc;

use lodestar_core::{snapshot, Artifact, ArtifactsConfig, LodestarResult};
use lodestar_storage::{
    Commit, CommitAction, CommitActionKind, EngagementDirectory, FileWrite, RepositoryBackend,
};
use serde::Deserialize;

use crate::clients::RetryPolicy;
use crate::telemetry::metrics::with_metrics;

/// Commit author and message overrides. Blank values fall back to the
/// configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitOptions {
    pub author_email: Option<String>,
    pub author_name: Option<String>,
    pub commit_message: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl CommitOptions {
    pub fn author_email<'a>(&'a self, config: &'a ArtifactsConfig) -> &'a str {
        non_blank(&self.author_email).unwrap_or(&config.default_author_email)
    }

    pub fn author_name<'a>(&'a self, config: &'a ArtifactsConfig) -> &'a str {
        non_blank(&self.author_name).unwrap_or(&config.default_author_name)
    }

    pub fn commit_message<'a>(&'a self, config: &'a ArtifactsConfig) -> &'a str {
        non_blank(&self.commit_message).unwrap_or(&config.default_commit_message)
    }
}

/// How a snapshot reached the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStrategy {
    /// Snapshot file created or updated on its own.
    File,
    /// Snapshot and legacy document in a single commit.
    Commit,
}

impl WriteStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Commit => "commit",
        }
    }
}

/// Writes and reads per-engagement snapshot files.
pub struct SnapshotWriter {
    repository: Arc<dyn RepositoryBackend>,
    directory: Arc<dyn EngagementDirectory>,
    config: Arc<ArtifactsConfig>,
    retry: RetryPolicy,
}

impl SnapshotWriter {
    pub fn new(
        repository: Arc<dyn RepositoryBackend>,
        directory: Arc<dyn EngagementDirectory>,
        config: Arc<ArtifactsConfig>,
    ) -> Self {
        let retry = RetryPolicy::from_config(&config);
        Self {
            repository,
            directory,
            config,
            retry,
        }
    }

    /// Repository project of `engagement_uuid`.
    pub async fn project_id(&self, engagement_uuid: &str) -> LodestarResult<i64> {
        let directory = &self.directory;
        let engagement = self
            .retry
            .run("get_engagement", || directory.get_engagement(engagement_uuid))
            .await?;
        Ok(engagement.require_project_id()?)
    }

    /// Decoded snapshot of `project_id`. `None` when the file does not exist.
    pub async fn fetch(&self, project_id: i64) -> LodestarResult<Option<Vec<Artifact>>> {
        let repository = &self.repository;
        let path = self.config.artifacts_file.as_str();
        let branch = self.config.default_branch.as_str();
        let file = self
            .retry
            .run("get_file", || repository.get_file(project_id, path, branch))
            .await?;

        match file {
            None => Ok(None),
            Some(file) => {
                if file.content.trim().is_empty() {
                    tracing::warn!(project_id, file_path = path, "Snapshot file is empty");
                }
                Ok(Some(snapshot::decode(&file.content)?))
            }
        }
    }

    /// Replace the snapshot of `engagement_uuid` with `artifacts`.
    pub async fn write(
        &self,
        engagement_uuid: &str,
        artifacts: &[Artifact],
        options: &CommitOptions,
    ) -> LodestarResult<WriteStrategy> {
        let project_id = self.project_id(engagement_uuid).await?;
        let result = self.write_to_project(project_id, artifacts, options).await;

        match &result {
            Ok(strategy) => {
                with_metrics(|m| m.record_snapshot_write(strategy.as_str(), true));
                tracing::info!(
                    engagement_uuid,
                    project_id,
                    strategy = strategy.as_str(),
                    artifacts = artifacts.len(),
                    "Snapshot written"
                );
            }
            Err(e) => {
                with_metrics(|m| m.record_snapshot_write("unknown", false));
                tracing::error!(engagement_uuid, project_id, error = %e, "Snapshot write failed");
            }
        }
        result
    }

    async fn write_to_project(
        &self,
        project_id: i64,
        artifacts: &[Artifact],
        options: &CommitOptions,
    ) -> LodestarResult<WriteStrategy> {
        let config = &self.config;
        let repository = &self.repository;
        let branch = config.default_branch.as_str();
        let content = snapshot::encode(artifacts)?;

        let existing = self
            .retry
            .run("get_file", || {
                repository.get_file(project_id, &config.artifacts_file, branch)
            })
            .await?;
        let kind = if existing.is_some() {
            CommitActionKind::Update
        } else {
            CommitActionKind::Create
        };

        let legacy = if config.legacy_mirror {
            self.retry
                .run("get_file", || {
                    repository.get_file(project_id, &config.legacy_file, branch)
                })
                .await?
        } else {
            None
        };

        match legacy {
            Some(document) => {
                let merged = snapshot::merge_into_legacy(&document.content, artifacts)?;
                let commit = Commit {
                    branch: branch.to_string(),
                    commit_message: options.commit_message(config).to_string(),
                    author_name: options.author_name(config).to_string(),
                    author_email: options.author_email(config).to_string(),
                    actions: vec![
                        CommitAction {
                            action: kind,
                            file_path: config.artifacts_file.clone(),
                            content,
                        },
                        CommitAction {
                            action: CommitActionKind::Update,
                            file_path: config.legacy_file.clone(),
                            content: merged,
                        },
                    ],
                };
                self.retry
                    .run("commit", || repository.commit(project_id, &commit))
                    .await?;
                Ok(WriteStrategy::Commit)
            }
            None => {
                let write = FileWrite {
                    file_path: config.artifacts_file.clone(),
                    branch: branch.to_string(),
                    content,
                    author_name: options.author_name(config).to_string(),
                    author_email: options.author_email(config).to_string(),
                    commit_message: options.commit_message(config).to_string(),
                };
                match kind {
                    CommitActionKind::Update => {
                        self.retry
                            .run("update_file", || repository.update_file(project_id, &write))
                            .await?
                    }
                    CommitActionKind::Create => {
                        self.retry
                            .run("create_file", || repository.create_file(project_id, &write))
                            .await?
                    }
                }
                Ok(WriteStrategy::File)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestar_core::Engagement;
    use lodestar_storage::{InMemoryEngagementDirectory, InMemoryRepository};

    fn artifact(uuid: &str) -> Artifact {
        Artifact {
            uuid: Some(uuid.to_string()),
            engagement_uuid: "1111".to_string(),
            title: format!("title {uuid}"),
            description: "desc".to_string(),
            artifact_type: "Demo".to_string(),
            link_address: "https://example.com".to_string(),
            ..Default::default()
        }
    }

    fn writer(repo: &InMemoryRepository, config: ArtifactsConfig) -> SnapshotWriter {
        let directory =
            InMemoryEngagementDirectory::with_engagements([Engagement::new("1111", 91)]);
        SnapshotWriter::new(Arc::new(repo.clone()), Arc::new(directory), Arc::new(config))
    }

    #[test]
    fn test_commit_options_defaults() {
        let config = ArtifactsConfig::default();
        let options = CommitOptions {
            author_email: Some("  ".to_string()),
            author_name: Some("Jane".to_string()),
            commit_message: None,
        };
        assert_eq!(options.author_email(&config), "lodestar-artifacts@bot.com");
        assert_eq!(options.author_name(&config), "Jane");
        assert_eq!(options.commit_message(&config), "Artifacts updated");
    }

    #[tokio::test]
    async fn test_creates_then_updates_snapshot() {
        let repo = InMemoryRepository::new();
        let config = ArtifactsConfig {
            legacy_mirror: false,
            ..Default::default()
        };
        let writer = writer(&repo, config);

        let first = writer
            .write("1111", &[artifact("a1")], &CommitOptions::default())
            .await
            .unwrap();
        assert_eq!(first, WriteStrategy::File);

        writer
            .write("1111", &[artifact("a1"), artifact("a2")], &CommitOptions::default())
            .await
            .unwrap();

        let commits = repo.commits().await;
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].1.actions[0].action, CommitActionKind::Create);
        assert_eq!(commits[1].1.actions[0].action, CommitActionKind::Update);

        let stored = writer.fetch(91).await.unwrap().unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn test_legacy_document_is_mirrored_in_one_commit() {
        let repo = InMemoryRepository::new();
        repo.put_file(91, "master", "engagement.json", r#"{"name":"Acme","artifacts":[]}"#)
            .await;
        let writer = writer(&repo, ArtifactsConfig::default());

        let strategy = writer
            .write("1111", &[artifact("a1")], &CommitOptions::default())
            .await
            .unwrap();
        assert_eq!(strategy, WriteStrategy::Commit);

        let commits = repo.commits().await;
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].1.actions.len(), 2);

        let legacy = repo.file(91, "master", "engagement.json").await.unwrap();
        let doc: serde_json::Value = serde_json::from_str(&legacy).unwrap();
        assert_eq!(doc["artifacts"][0]["uuid"], "a1");
        assert_eq!(doc["name"], "Acme");
    }

    #[tokio::test]
    async fn test_fetch_missing_is_none() {
        let repo = InMemoryRepository::new();
        let writer = writer(&repo, ArtifactsConfig::default());
        assert!(writer.fetch(91).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_engagement_fails() {
        let repo = InMemoryRepository::new();
        let writer = writer(&repo, ArtifactsConfig::default());
        let result = writer.write("9999", &[], &CommitOptions::default()).await;
        assert!(result.is_err());
        assert!(repo.commits().await.is_empty());
    }
}

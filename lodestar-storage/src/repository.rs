//! Repository host abstraction
//!
//! Files are exchanged decoded. Transport encodings (base64 bodies,
//! URL-encoded paths) belong to the concrete client.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use ::async_trait::async_trait;
use lodestar_core::RemoteError;
use tokio::sync::{Mutex, RwLock};

const SERVICE: &str = "repository";

/// A file read from a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryFile {
    pub file_path: String,
    pub branch: String,
    pub content: String,
}

/// A single-file create or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWrite {
    pub file_path: String,
    pub branch: String,
    pub content: String,
    pub author_name: String,
    pub author_email: String,
    pub commit_message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitActionKind {
    Create,
    Update,
}

impl CommitActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitAction {
    pub action: CommitActionKind,
    pub file_path: String,
    pub content: String,
}

/// Several file actions applied atomically on one branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub branch: String,
    pub commit_message: String,
    pub author_name: String,
    pub author_email: String,
    pub actions: Vec<CommitAction>,
}

impl Commit {
    /// Wrap a single-file write as a one-action commit.
    pub fn single(kind: CommitActionKind, write: &FileWrite) -> Self {
        Self {
            branch: write.branch.clone(),
            commit_message: write.commit_message.clone(),
            author_name: write.author_name.clone(),
            author_email: write.author_email.clone(),
            actions: vec![CommitAction {
                action: kind,
                file_path: write.file_path.clone(),
                content: write.content.clone(),
            }],
        }
    }
}

/// Version-controlled file storage, addressed by numeric project id.
#[async_trait]
pub trait RepositoryBackend: Send + Sync {
    /// Read a file at `git_ref`. `Ok(None)` when the file does not exist.
    async fn get_file(
        &self,
        project_id: i64,
        file_path: &str,
        git_ref: &str,
    ) -> Result<Option<RepositoryFile>, RemoteError>;

    async fn create_file(&self, project_id: i64, write: &FileWrite) -> Result<(), RemoteError>;

    async fn update_file(&self, project_id: i64, write: &FileWrite) -> Result<(), RemoteError>;

    /// Apply all actions in one commit.
    async fn commit(&self, project_id: i64, commit: &Commit) -> Result<(), RemoteError>;
}

// ============================================================================
// IN-MEMORY REPOSITORY
// ============================================================================

type FileKey = (i64, String, String);

#[derive(Debug, Default)]
struct RepositoryState {
    files: HashMap<FileKey, String>,
    commits: Vec<(i64, Commit)>,
    reads: usize,
}

#[derive(Debug, Default)]
struct FailurePlan {
    /// Errors returned, one per call, before calls succeed again.
    queued: VecDeque<RemoteError>,
    /// Projects whose every call fails.
    projects: HashMap<i64, RemoteError>,
}

/// In-memory [`RepositoryBackend`] recording every write.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRepository {
    state: Arc<RwLock<RepositoryState>>,
    failures: Arc<Mutex<FailurePlan>>,
}

fn fatal(reason: impl Into<String>) -> RemoteError {
    RemoteError::Fatal {
        service: SERVICE.to_string(),
        status: Some(400),
        reason: reason.into(),
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a file directly, bypassing the commit log.
    pub async fn put_file(
        &self,
        project_id: i64,
        branch: &str,
        file_path: &str,
        content: impl Into<String>,
    ) {
        self.state.write().await.files.insert(
            (project_id, branch.to_string(), file_path.to_string()),
            content.into(),
        );
    }

    pub async fn file(&self, project_id: i64, branch: &str, file_path: &str) -> Option<String> {
        self.state
            .read()
            .await
            .files
            .get(&(project_id, branch.to_string(), file_path.to_string()))
            .cloned()
    }

    /// Every commit applied so far, single-file writes included.
    pub async fn commits(&self) -> Vec<(i64, Commit)> {
        self.state.read().await.commits.clone()
    }

    pub async fn read_count(&self) -> usize {
        self.state.read().await.reads
    }

    /// Fail the next call with `error`. Calls queue up in order.
    pub async fn fail_next(&self, error: RemoteError) {
        self.failures.lock().await.queued.push_back(error);
    }

    /// Fail every call for `project_id` with `error`.
    pub async fn fail_project(&self, project_id: i64, error: RemoteError) {
        self.failures.lock().await.projects.insert(project_id, error);
    }

    async fn check(&self, project_id: i64) -> Result<(), RemoteError> {
        let mut failures = self.failures.lock().await;
        if let Some(err) = failures.projects.get(&project_id) {
            return Err(err.clone());
        }
        match failures.queued.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn apply(state: &mut RepositoryState, project_id: i64, commit: &Commit) -> Result<(), RemoteError> {
        for action in &commit.actions {
            let key = (project_id, commit.branch.clone(), action.file_path.clone());
            let exists = state.files.contains_key(&key);
            match action.action {
                CommitActionKind::Create if exists => {
                    return Err(fatal(format!("A file with this name already exists: {}", action.file_path)));
                }
                CommitActionKind::Update if !exists => {
                    return Err(fatal(format!("A file with this name doesn't exist: {}", action.file_path)));
                }
                _ => {}
            }
        }
        for action in &commit.actions {
            state.files.insert(
                (project_id, commit.branch.clone(), action.file_path.clone()),
                action.content.clone(),
            );
        }
        state.commits.push((project_id, commit.clone()));
        Ok(())
    }
}

#[async_trait]
impl RepositoryBackend for InMemoryRepository {
    async fn get_file(
        &self,
        project_id: i64,
        file_path: &str,
        git_ref: &str,
    ) -> Result<Option<RepositoryFile>, RemoteError> {
        self.check(project_id).await?;
        let mut state = self.state.write().await;
        state.reads += 1;
        Ok(state
            .files
            .get(&(project_id, git_ref.to_string(), file_path.to_string()))
            .map(|content| RepositoryFile {
                file_path: file_path.to_string(),
                branch: git_ref.to_string(),
                content: content.clone(),
            }))
    }

    async fn create_file(&self, project_id: i64, write: &FileWrite) -> Result<(), RemoteError> {
        self.check(project_id).await?;
        let mut state = self.state.write().await;
        Self::apply(&mut state, project_id, &Commit::single(CommitActionKind::Create, write))
    }

    async fn update_file(&self, project_id: i64, write: &FileWrite) -> Result<(), RemoteError> {
        self.check(project_id).await?;
        let mut state = self.state.write().await;
        Self::apply(&mut state, project_id, &Commit::single(CommitActionKind::Update, write))
    }

    async fn commit(&self, project_id: i64, commit: &Commit) -> Result<(), RemoteError> {
        self.check(project_id).await?;
        let mut state = self.state.write().await;
        Self::apply(&mut state, project_id, commit)
    }
}

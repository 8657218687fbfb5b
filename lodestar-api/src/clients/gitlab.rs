//! GitLab repository client
//!
//! Implements [`RepositoryBackend`] over the GitLab v4 REST API. File content
//! travels base64-encoded and file paths are URL-encoded into the request
//! path; both transformations stay inside this module.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use lodestar_core::RemoteError;
use lodestar_storage::{Commit, FileWrite, RepositoryBackend, RepositoryFile};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::GitlabConfig;
use crate::error::{ApiError, ApiResult};

const SERVICE: &str = "gitlab";

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Deserialize)]
struct FileResponse {
    file_path: String,
    #[serde(rename = "ref", default)]
    git_ref: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
    content: String,
}

#[derive(Debug, Serialize)]
struct FileRequest<'a> {
    branch: &'a str,
    content: String,
    encoding: &'static str,
    author_email: &'a str,
    author_name: &'a str,
    commit_message: &'a str,
}

#[derive(Debug, Serialize)]
struct CommitActionRequest<'a> {
    action: &'static str,
    file_path: &'a str,
    content: String,
    encoding: &'static str,
}

#[derive(Debug, Serialize)]
struct CommitRequest<'a> {
    branch: &'a str,
    commit_message: &'a str,
    author_name: &'a str,
    author_email: &'a str,
    actions: Vec<CommitActionRequest<'a>>,
}

// ============================================================================
// HELPERS
// ============================================================================

fn files_url(base_url: &str, project_id: i64, file_path: &str) -> String {
    format!(
        "{}/api/v4/projects/{}/repository/files/{}",
        base_url.trim_end_matches('/'),
        project_id,
        urlencoding::encode(file_path)
    )
}

fn commits_url(base_url: &str, project_id: i64) -> String {
    format!(
        "{}/api/v4/projects/{}/repository/commits",
        base_url.trim_end_matches('/'),
        project_id
    )
}

fn encode_content(content: &str) -> String {
    STANDARD.encode(content.as_bytes())
}

/// GitLab wraps long base64 payloads across lines.
fn decode_content(encoded: &str) -> Result<String, RemoteError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(compact).map_err(|e| fatal(None, e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| fatal(None, e.to_string()))
}

fn fatal(status: Option<u16>, reason: impl Into<String>) -> RemoteError {
    RemoteError::Fatal {
        service: SERVICE.to_string(),
        status,
        reason: reason.into(),
    }
}

/// Connection-level failures are retryable; anything else is not.
fn transport_error(err: reqwest::Error) -> RemoteError {
    if err.is_connect() || err.is_timeout() {
        RemoteError::Transient {
            service: SERVICE.to_string(),
            reason: err.to_string(),
        }
    } else {
        fatal(err.status().map(|s| s.as_u16()), err.to_string())
    }
}

async fn status_error(response: Response) -> RemoteError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    fatal(
        Some(status.as_u16()),
        format!("{} {}", status, body.trim()),
    )
}

// ============================================================================
// CLIENT
// ============================================================================

/// GitLab v4 API client authenticated with a private token.
#[derive(Debug, Clone)]
pub struct GitlabClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl GitlabClient {
    pub fn new(config: &GitlabConfig) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::internal_error(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            token: config.token.clone(),
        })
    }

    async fn write_file(
        &self,
        method: reqwest::Method,
        project_id: i64,
        write: &FileWrite,
    ) -> Result<(), RemoteError> {
        let body = FileRequest {
            branch: &write.branch,
            content: encode_content(&write.content),
            encoding: "base64",
            author_email: &write.author_email,
            author_name: &write.author_name,
            commit_message: &write.commit_message,
        };
        let response = self
            .http
            .request(method, files_url(&self.base_url, project_id, &write.file_path))
            .header("PRIVATE-TOKEN", &self.token)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(response).await)
        }
    }
}

#[async_trait]
impl RepositoryBackend for GitlabClient {
    async fn get_file(
        &self,
        project_id: i64,
        file_path: &str,
        git_ref: &str,
    ) -> Result<Option<RepositoryFile>, RemoteError> {
        let response = self
            .http
            .get(files_url(&self.base_url, project_id, file_path))
            .query(&[("ref", git_ref)])
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(project_id, file_path, git_ref, "Repository file not found");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let file: FileResponse = response.json().await.map_err(transport_error)?;
        let content = match file.encoding.as_deref() {
            Some("base64") | None => decode_content(&file.content)?,
            Some(_) => file.content,
        };
        Ok(Some(RepositoryFile {
            file_path: file.file_path,
            branch: file.git_ref.unwrap_or_else(|| git_ref.to_string()),
            content,
        }))
    }

    async fn create_file(&self, project_id: i64, write: &FileWrite) -> Result<(), RemoteError> {
        self.write_file(reqwest::Method::POST, project_id, write).await
    }

    async fn update_file(&self, project_id: i64, write: &FileWrite) -> Result<(), RemoteError> {
        self.write_file(reqwest::Method::PUT, project_id, write).await
    }

    async fn commit(&self, project_id: i64, commit: &Commit) -> Result<(), RemoteError> {
        let body = CommitRequest {
            branch: &commit.branch,
            commit_message: &commit.commit_message,
            author_name: &commit.author_name,
            author_email: &commit.author_email,
            actions: commit
                .actions
                .iter()
                .map(|a| CommitActionRequest {
                    action: a.action.as_str(),
                    file_path: &a.file_path,
                    content: encode_content(&a.content),
                    encoding: "base64",
                })
                .collect(),
        };
        let response = self
            .http
            .post(commits_url(&self.base_url, project_id))
            .header("PRIVATE-TOKEN", &self.token)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(response).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_url_encodes_path() {
        assert_eq!(
            files_url("https://gitlab.example.com/", 91, "engagement/artifacts.json"),
            "https://gitlab.example.com/api/v4/projects/91/repository/files/engagement%2Fartifacts.json"
        );
    }

    #[test]
    fn test_commits_url() {
        assert_eq!(
            commits_url("https://gitlab.example.com", 92),
            "https://gitlab.example.com/api/v4/projects/92/repository/commits"
        );
    }

    #[test]
    fn test_content_encoding() {
        let encoded = encode_content("[ ]");
        assert_eq!(encoded, "WyBd");
        assert_eq!(decode_content(&encoded).unwrap(), "[ ]");
    }

    #[test]
    fn test_decode_tolerates_line_breaks() {
        let encoded = encode_content("{\"artifacts\": []}");
        let (head, tail) = encoded.split_at(8);
        let wrapped = format!("{}\n{}\n", head, tail);
        assert_eq!(decode_content(&wrapped).unwrap(), "{\"artifacts\": []}");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_content("***").unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_commit_request_shape() {
        let body = CommitRequest {
            branch: "master",
            commit_message: "Artifacts updated",
            author_name: "Lodestar Artifacts",
            author_email: "lodestar-artifacts@bot.com",
            actions: vec![CommitActionRequest {
                action: "update",
                file_path: "engagement.json",
                content: encode_content("{}"),
                encoding: "base64",
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["actions"][0]["action"], "update");
        assert_eq!(json["actions"][0]["content"], "e30=");
        assert_eq!(json["branch"], "master");
    }
}

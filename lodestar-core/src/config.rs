//! Reconciliation defaults
//!
//! Everything the engine would otherwise hard-code: file locations in the
//! repository, the branch snapshots are written to, default commit author
//! and message, paging defaults, fan-out limits and the retry policy for
//! remote calls. Loaded from `LODESTAR_*` environment variables.

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::filter::DEFAULT_PAGE_SIZE;

/// Settings consumed by the reconciliation, snapshot and refresh services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactsConfig {
    /// Path of the per-engagement snapshot file.
    pub artifacts_file: String,
    /// Path of the legacy engagement document.
    pub legacy_file: String,
    /// Mirror the artifact array into the legacy document when it exists.
    pub legacy_mirror: bool,
    pub default_branch: String,
    pub default_commit_message: String,
    pub default_author_name: String,
    pub default_author_email: String,
    pub default_page_size: usize,
    /// Engagements fetched concurrently during a refresh.
    pub refresh_concurrency: usize,
    /// Engagement groups reconciled concurrently in a bulk update.
    pub bulk_concurrency: usize,
    /// Total attempts for a remote call failing with a transient error.
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            artifacts_file: "engagement/artifacts.json".to_string(),
            legacy_file: "engagement.json".to_string(),
            legacy_mirror: true,
            default_branch: "master".to_string(),
            default_commit_message: "Artifacts updated".to_string(),
            default_author_name: "Lodestar Artifacts".to_string(),
            default_author_email: "lodestar-artifacts@bot.com".to_string(),
            default_page_size: DEFAULT_PAGE_SIZE,
            refresh_concurrency: 8,
            bulk_concurrency: 8,
            retry_attempts: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl ArtifactsConfig {
    /// Create ArtifactsConfig from environment variables.
    ///
    /// Environment variables:
    /// - `LODESTAR_ARTIFACTS_FILE` (default: engagement/artifacts.json)
    /// - `LODESTAR_LEGACY_FILE` (default: engagement.json)
    /// - `LODESTAR_LEGACY_MIRROR`: "true" or "false" (default: true)
    /// - `LODESTAR_DEFAULT_BRANCH` (default: master)
    /// - `LODESTAR_COMMIT_MESSAGE`, `LODESTAR_AUTHOR_NAME`, `LODESTAR_AUTHOR_EMAIL`
    /// - `LODESTAR_DEFAULT_PAGE_SIZE` (default: 20)
    /// - `LODESTAR_REFRESH_CONCURRENCY`, `LODESTAR_BULK_CONCURRENCY` (default: 8)
    /// - `LODESTAR_RETRY_ATTEMPTS` (default: 3)
    /// - `LODESTAR_RETRY_DELAY_MS` (default: 500)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            artifacts_file: env_string("LODESTAR_ARTIFACTS_FILE", defaults.artifacts_file),
            legacy_file: env_string("LODESTAR_LEGACY_FILE", defaults.legacy_file),
            legacy_mirror: std::env::var("LODESTAR_LEGACY_MIRROR")
                .ok()
                .map(|s| s.to_lowercase() != "false")
                .unwrap_or(defaults.legacy_mirror),
            default_branch: env_string("LODESTAR_DEFAULT_BRANCH", defaults.default_branch),
            default_commit_message: env_string(
                "LODESTAR_COMMIT_MESSAGE",
                defaults.default_commit_message,
            ),
            default_author_name: env_string("LODESTAR_AUTHOR_NAME", defaults.default_author_name),
            default_author_email: env_string(
                "LODESTAR_AUTHOR_EMAIL",
                defaults.default_author_email,
            ),
            default_page_size: env_parse("LODESTAR_DEFAULT_PAGE_SIZE", defaults.default_page_size),
            refresh_concurrency: env_parse(
                "LODESTAR_REFRESH_CONCURRENCY",
                defaults.refresh_concurrency,
            ),
            bulk_concurrency: env_parse("LODESTAR_BULK_CONCURRENCY", defaults.bulk_concurrency),
            retry_attempts: env_parse("LODESTAR_RETRY_ATTEMPTS", defaults.retry_attempts),
            retry_delay: Duration::from_millis(env_parse(
                "LODESTAR_RETRY_DELAY_MS",
                defaults.retry_delay.as_millis() as u64,
            )),
        }
    }

    /// Reject settings the services cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let names = [
            ("artifacts_file", &self.artifacts_file),
            ("legacy_file", &self.legacy_file),
            ("default_branch", &self.default_branch),
            ("default_commit_message", &self.default_commit_message),
            ("default_author_name", &self.default_author_name),
            ("default_author_email", &self.default_author_email),
        ];
        if let Some((field, _)) = names.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(ConfigError::MissingRequired {
                field: field.to_string(),
            });
        }

        let limits = [
            ("default_page_size", self.default_page_size),
            ("refresh_concurrency", self.refresh_concurrency),
            ("bulk_concurrency", self.bulk_concurrency),
            ("retry_attempts", self.retry_attempts as usize),
        ];
        if let Some((field, value)) = limits.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                value: value.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ArtifactsConfig::default();
        assert_eq!(config.artifacts_file, "engagement/artifacts.json");
        assert_eq!(config.default_branch, "master");
        assert_eq!(config.default_page_size, 20);
        assert!(config.legacy_mirror);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = ArtifactsConfig {
            refresh_concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "refresh_concurrency"
        ));
    }

    #[test]
    fn test_validate_rejects_blank_branch() {
        let config = ArtifactsConfig {
            default_branch: " ".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingRequired {
                field: "default_branch".to_string()
            })
        );
    }
}

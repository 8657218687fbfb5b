//! Retry policy for upstream calls
//!
//! Only connection-level failures ([`RemoteError::Transient`]) are repeated.
//! Application-level failures surface on the first attempt.

use std::future::Future;
use std::time::Duration;

use lodestar_core::{ArtifactsConfig, RemoteError};

use crate::telemetry::metrics::with_metrics;

/// Fixed-delay retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first call included. Never below 1.
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &ArtifactsConfig) -> Self {
        Self::new(config.retry_attempts, config.retry_delay)
    }

    /// Run `call` until it succeeds, fails non-transiently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.attempts => {
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts = self.attempts,
                        error = %err,
                        "Upstream call failed, retrying"
                    );
                    with_metrics(|m| m.record_remote_retry(operation));
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ArtifactsConfig::default())
    }
}

//! Upstream clients: repository host, engagement directory and the retry policy.

pub mod engagement;
pub mod gitlab;
pub mod retry;

pub use engagement::EngagementApiClient;
pub use gitlab::GitlabClient;
pub use retry::RetryPolicy;

use std::time::Duration;

use crate::retry::{BASE_DELAY_MS, MAX_RETRIES};
use crate::url::DEFAULT_API_BASE_URL;

/// Transport configuration for backend HTTP requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OmniApiConfig {
    pub base_url: String,
    /// Optional per-request timeout. Inference endpoints can be slow, so none by default.
    pub timeout: Option<Duration>,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub user_agent: Option<String>,
}

impl Default for OmniApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: None,
            max_retries: MAX_RETRIES,
            retry_base_delay: Duration::from_millis(BASE_DELAY_MS),
            user_agent: None,
        }
    }
}

impl OmniApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

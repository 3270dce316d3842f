//! Environment configuration.

use std::env;
use std::time::Duration;

use crate::core::fence::DEFAULT_FENCE_MARKER;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_BRAIN: &str = "None";
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    #[default]
    WebSocket,
    Mock,
}

impl TransportKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ws" | "websocket" => Some(Self::WebSocket),
            "mock" => Some(Self::Mock),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub api_url: String,
    /// Explicit streaming endpoint; derived from `api_url` when unset.
    pub ws_url: Option<String>,
    pub brain: String,
    pub idle_timeout: Duration,
    pub fence_marker: String,
    pub transport: TransportKind,
    pub log_filter: Option<String>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: None,
            brain: DEFAULT_BRAIN.to_string(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            fence_marker: DEFAULT_FENCE_MARKER.to_string(),
            transport: TransportKind::default(),
            log_filter: None,
        }
    }
}

impl EnvConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_url: env_string_opt("OMNI_API_URL").unwrap_or(defaults.api_url),
            ws_url: env_string_opt("OMNI_WS_URL"),
            brain: env_string_opt("OMNI_BRAIN").unwrap_or(defaults.brain),
            idle_timeout: env_secs_opt("OMNI_IDLE_TIMEOUT_SEC").unwrap_or(defaults.idle_timeout),
            fence_marker: env_string_opt("OMNI_FENCE_MARKER").unwrap_or(defaults.fence_marker),
            transport: env_string_opt("OMNI_TRANSPORT")
                .and_then(|value| TransportKind::parse(&value))
                .unwrap_or(defaults.transport),
            log_filter: env_string_opt("OMNI_LOG"),
        }
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value.trim().to_string())
        }
    })
}

fn env_secs_opt(key: &str) -> Option<Duration> {
    env_string_opt(key)
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

//! Runtime construction parameters.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use auth_storage::StorageAdapter;

/// Everything [`AuthRuntime`](crate::AuthRuntime) needs at construction.
///
/// The storage adapter is the sole platform-specific seam: the platform
/// layer supplies it, the runtime never picks a medium on its own.
#[derive(Clone)]
pub struct RuntimeConfig {
    /// Base URL of the remote auth API
    pub base_url: Url,
    /// Durable key/value store supplied by the platform layer
    pub storage: Arc<dyn StorageAdapter>,
    /// Overrides the OS-derived device descriptor on session records
    pub device_label: Option<String>,
    /// Lifetime of a newly minted session
    pub session_ttl: chrono::Duration,
    /// How often the session heartbeat refreshes `lastActive`
    pub heartbeat_interval: Duration,
    /// Per-request transport deadline
    pub request_timeout: Duration,
}

impl RuntimeConfig {
    pub fn new(base_url: Url, storage: Arc<dyn StorageAdapter>) -> Self {
        Self {
            base_url,
            storage,
            device_label: None,
            session_ttl: chrono::Duration::days(30),
            heartbeat_interval: Duration::from_secs(60),
            request_timeout: auth_transport::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_device_label(mut self, label: impl Into<String>) -> Self {
        self.device_label = Some(label.into());
        self
    }

    pub fn with_session_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Free-text identification string stored on session records.
    pub(crate) fn device_descriptor(&self) -> String {
        match &self.device_label {
            Some(label) => label.clone(),
            None => default_device_descriptor(),
        }
    }
}

fn default_device_descriptor() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string());
    format!("{host} ({})", std::env::consts::OS)
}

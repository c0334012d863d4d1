//! Session records and aggregate state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One logged-in device's lifetime record.
///
/// Persisted under the `sessionInfo` key in camelCase, the shape the
/// platform layers read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Client-generated opaque id
    pub id: String,
    /// Free-text device identification
    pub device: String,
    pub last_active: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_current_session: bool,
}

impl SessionInfo {
    /// Builds the record for this device: fresh id, timestamps of now,
    /// expiry `ttl` from now, marked current.
    pub fn new_current(device: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            device: device.into(),
            last_active: now,
            created_at: now,
            expires_at: now + ttl,
            is_current_session: true,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Aggregate session state broadcast to subscribers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub current_session: Option<SessionInfo>,
    pub active_sessions: Vec<SessionInfo>,
    pub loading: bool,
    pub error: Option<String>,
}

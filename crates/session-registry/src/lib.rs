//! Device session tracking for the client auth runtime.
//!
//! One session record exists per logged-in device. The registry owns the
//! current device's record plus the (locally approximated) list of active
//! sessions, persists the current record across restarts, and keeps its
//! `lastActive` timestamp fresh with a periodic heartbeat.
//!
//! # Lifecycle
//!
//! ```text
//! auth success -> create_session -> heartbeat (60s) -> clear_session
//!                      ^                                   |
//!                      |        restore on construct       |
//!                      +--------- (sessionInfo key) <------+
//! ```
//!
//! The heartbeat starts when a session is created or restored and stops
//! when the session is cleared. A session past its expiry horizon is
//! invalidated instead of kept alive.

mod registry;
mod types;

pub use registry::{SessionConfig, SessionRegistry};
pub use types::{SessionInfo, SessionState};

use thiserror::Error;

/// Error type for session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Underlying storage failure
    #[error("Storage error: {0}")]
    Storage(#[from] auth_storage::StorageError),

    /// Session record could not be serialized
    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

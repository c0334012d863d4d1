//! Runtime error type.

use thiserror::Error;

use auth_storage::StorageError;
use auth_transport::ApiError;
use session_registry::SessionError;

/// Error type for authentication operations.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The remote auth API rejected or failed the call
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Durable storage failed underneath the runtime
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The session registry failed to record the device session
    #[error(transparent)]
    Session(#[from] SessionError),

    /// An operation that needs stored credentials ran without any
    #[error("Not authenticated")]
    NotAuthenticated,
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

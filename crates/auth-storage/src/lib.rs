//! Durable key/value persistence for the client auth runtime.
//!
//! The auth and session services never touch a concrete storage medium.
//! They hold a [`StorageAdapter`] injected by the platform layer: browser
//! storage on web, the secure store on mobile, a local file on desktop.
//! This crate defines that capability plus the two backends the core
//! ships with:
//! - **MemoryStorage**: process-lifetime map, also the test backend
//! - **FileStorage**: single JSON document with atomic writes

mod adapter;
mod file;
mod keys;
mod memory;

pub use adapter::StorageAdapter;
pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific storage error
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

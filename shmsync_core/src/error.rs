//! Error types shared by every SHMSYNC crate.
//!
//! Contention on the shared buffer is never an error: a busy buffer yields
//! [`Outcome::Missed`](crate::consistency::Outcome::Missed) and a torn
//! snapshot is counted by the reader. The variants here cover conditions
//! that stop a component from running at all.

use crate::consistency::Role;
use std::sync::PoisonError;
use thiserror::Error;

/// Result alias used throughout SHMSYNC.
pub type ShmSyncResult<T> = Result<T, ShmSyncError>;

#[derive(Debug, Error)]
pub enum ShmSyncError {
    /// The shared buffer could not be obtained. Fatal to initialization.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// A region is missing or not initialized yet. Worth retrying.
    #[error("shared region not ready: {0}")]
    Layout(String),

    /// An initialized region was set up with another version, algorithm or
    /// size. Retrying cannot help.
    #[error("incompatible shared buffer: {0}")]
    Incompatible(String),

    /// A region file is still mapped by a live process.
    #[error("shared region in use: {0}")]
    InUse(String),

    /// A second writer or reader tried to attach to the same buffer.
    #[error("{0} role is already attached to this buffer")]
    RoleTaken(Role),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("unsupported on this platform: {0}")]
    Unsupported(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ShmSyncError {
    pub fn config(msg: impl Into<String>) -> Self {
        ShmSyncError::Config(msg.into())
    }

    pub fn layout(msg: impl Into<String>) -> Self {
        ShmSyncError::Layout(msg.into())
    }

    pub fn incompatible(msg: impl Into<String>) -> Self {
        ShmSyncError::Incompatible(msg.into())
    }

    pub fn resource_exhausted(msg: impl Into<String>) -> Self {
        ShmSyncError::ResourceExhausted(msg.into())
    }

    /// True for the startup failure that must abort the whole core.
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, ShmSyncError::ResourceExhausted(_))
    }

    /// True while a peer may still create or initialize the region
    pub fn is_not_ready(&self) -> bool {
        matches!(self, ShmSyncError::Layout(_))
    }
}

impl From<serde_json::Error> for ShmSyncError {
    fn from(err: serde_json::Error) -> Self {
        ShmSyncError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for ShmSyncError {
    fn from(err: serde_yaml::Error) -> Self {
        ShmSyncError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for ShmSyncError {
    fn from(err: toml::de::Error) -> Self {
        ShmSyncError::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for ShmSyncError {
    fn from(err: toml::ser::Error) -> Self {
        ShmSyncError::Serialization(err.to_string())
    }
}

impl<T> From<PoisonError<T>> for ShmSyncError {
    fn from(err: PoisonError<T>) -> Self {
        ShmSyncError::Internal(format!("lock poisoned: {}", err))
    }
}

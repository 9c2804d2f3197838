//! Error types for the context cache

use thiserror::Error;

/// Result type alias for context cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Main error type for the context cache
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Payload serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Payload compression/decompression errors
    #[error("Compression error: {0}")]
    Compression(String),

    /// Remote store errors (connection, protocol)
    #[error("Remote store error: {0}")]
    Remote(String),

    /// Remote store call exceeded its deadline
    #[error("Remote store timed out after {millis} ms")]
    RemoteTimeout { millis: u64 },

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

impl CacheError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a new compression error
    pub fn compression(message: impl Into<String>) -> Self {
        Self::Compression(message.into())
    }

    /// Create a new remote store error
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote(message.into())
    }

    /// Create a new remote timeout error
    pub const fn remote_timeout(millis: u64) -> Self {
        Self::RemoteTimeout { millis }
    }
}

impl From<anyhow::Error> for CacheError {
    fn from(error: anyhow::Error) -> Self {
        Self::Other(error.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<std::io::Error> for CacheError {
    fn from(error: std::io::Error) -> Self {
        Self::Compression(error.to_string())
    }
}

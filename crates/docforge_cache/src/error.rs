//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur during cache operations.
///
/// Reads of persisted buckets are fail-safe: a blob that fails header or
/// checksum validation is logged and treated as a cache miss, so the
/// header-related variants rarely escape the crate. Storage, synthesis and
/// settings errors always propagate to the caller.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The durable store rejected a read or write.
    #[error("cache storage error for '{key}': {reason}")]
    Storage {
        /// The durable key being accessed.
        key: String,
        /// Description of the backend failure.
        reason: String,
    },

    /// A bucket blob has an invalid or missing header.
    #[error("invalid bucket header for '{key}': {reason}")]
    InvalidHeader {
        /// The durable key of the blob.
        key: String,
        /// Description of the header problem.
        reason: String,
    },

    /// The stored checksum does not match the computed checksum of the payload.
    #[error("checksum mismatch for '{key}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The durable key of the blob.
        key: String,
        /// The expected checksum from the header.
        expected: String,
        /// The actual checksum computed from the payload.
        actual: String,
    },

    /// The blob layout version does not match the current layout.
    #[error("blob layout mismatch for '{key}': expected {expected}, got {actual}")]
    VersionMismatch {
        /// The durable key of the blob.
        key: String,
        /// The expected layout version.
        expected: u32,
        /// The layout version found in the blob.
        actual: u32,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// A caching proxy could not be built for a wrapper name.
    #[error("cannot build caching proxy '{wrapper}': {reason}")]
    Synthesis {
        /// The wrapper name being built.
        wrapper: String,
        /// Why the base type or its method specs were rejected.
        reason: String,
    },

    /// An entity's dependency fingerprint could not be computed.
    #[error("cannot resolve dependencies of '{entity}': {reason}")]
    Dependency {
        /// Identity of the entity.
        entity: String,
        /// Description of the resolution failure.
        reason: String,
    },

    /// The cache settings are missing or malformed.
    #[error("invalid cache settings: {reason}")]
    InvalidSettings {
        /// Description of the problem.
        reason: String,
    },

    /// A sweep was cancelled before the durable store was flushed.
    #[error("cache sweep cancelled")]
    Cancelled,
}

impl From<docforge_config::ConfigError> for CacheError {
    fn from(err: docforge_config::ConfigError) -> Self {
        Self::InvalidSettings {
            reason: err.to_string(),
        }
    }
}

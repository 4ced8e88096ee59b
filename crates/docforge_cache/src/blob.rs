//! Binary blob layout for persisted cache buckets.
//!
//! Every bucket is written to the durable store as one blob: a length-prefixed
//! header carrying magic bytes, the blob layout version, the versioned key the
//! blob was written for and a checksum of the payload, followed by the
//! bincode-encoded [`CacheBucket`].

use docforge_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::bucket::CacheBucket;
use crate::error::CacheError;

/// Magic bytes identifying a docforge bucket blob.
const BLOB_MAGIC: [u8; 4] = *b"DFCB";

/// Current blob layout version. Increment on breaking changes to the header
/// or payload layout. This is independent of the cache format version, which
/// lives in the key.
const BLOB_LAYOUT_VERSION: u32 = 1;

/// Header prepended to every bucket blob for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobHeader {
    /// Magic bytes: must be `b"DFCB"`.
    pub magic: [u8; 4],

    /// Blob layout version.
    pub layout_version: u32,

    /// Versioned key the blob was written under.
    pub key: String,

    /// Content hash of the payload bytes.
    pub checksum: ContentHash,
}

/// Encodes a bucket into a self-validating blob.
pub fn encode_bucket(key: &str, bucket: &CacheBucket) -> Result<Vec<u8>, CacheError> {
    let payload =
        bincode::serde::encode_to_vec(bucket, bincode::config::standard()).map_err(|e| {
            CacheError::Serialization {
                reason: e.to_string(),
            }
        })?;

    let header = BlobHeader {
        magic: BLOB_MAGIC,
        layout_version: BLOB_LAYOUT_VERSION,
        key: key.to_string(),
        checksum: ContentHash::from_bytes(&payload),
    };
    let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
        .map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;

    // 4-byte header length (little-endian) + header + payload
    let header_len = header_bytes.len() as u32;
    let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    output.extend_from_slice(&header_len.to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(&payload);
    Ok(output)
}

/// Decodes and validates a blob written by [`encode_bucket`].
///
/// Fails if the header is truncated or foreign, the layout version differs,
/// the blob was written for another key, or the checksum does not verify.
/// Callers treat every failure as a cache miss.
pub fn decode_bucket(key: &str, raw: &[u8]) -> Result<CacheBucket, CacheError> {
    let invalid = |reason: &str| CacheError::InvalidHeader {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if raw.len() < 4 {
        return Err(invalid("blob shorter than header length prefix"));
    }
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&raw[..4]);
    let header_len = u32::from_le_bytes(len_bytes) as usize;
    if raw.len() < 4 + header_len {
        return Err(invalid("truncated header"));
    }

    let (header, _): (BlobHeader, usize) =
        bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
            .map_err(|e| invalid(&e.to_string()))?;

    if header.magic != BLOB_MAGIC {
        return Err(invalid("bad magic bytes"));
    }
    if header.layout_version != BLOB_LAYOUT_VERSION {
        return Err(CacheError::VersionMismatch {
            key: key.to_string(),
            expected: BLOB_LAYOUT_VERSION,
            actual: header.layout_version,
        });
    }
    if header.key != key {
        return Err(invalid(&format!("blob belongs to '{}'", header.key)));
    }

    let payload = &raw[4 + header_len..];
    let actual = ContentHash::from_bytes(payload);
    if actual != header.checksum {
        return Err(CacheError::ChecksumMismatch {
            key: key.to_string(),
            expected: header.checksum.to_string(),
            actual: actual.to_string(),
        });
    }

    let (bucket, _): (CacheBucket, usize) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard()).map_err(|e| {
            CacheError::Serialization {
                reason: e.to_string(),
            }
        })?;
    Ok(bucket)
}

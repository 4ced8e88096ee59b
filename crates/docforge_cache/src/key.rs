//! Cache key derivation for memoized entity methods.
//!
//! A key is derived from a namespace (`{wrapper}_{method}`), the stable
//! identity of the entity the method is called on, and the ordered call
//! arguments. Keys never depend on instance addresses, so they stay valid
//! across process restarts.

use std::fmt;
use std::sync::Arc;

use docforge_common::ContentHash;
use serde_json::Value;

/// A deterministic cache key derivation strategy.
///
/// Implementations must be pure: identical inputs always yield the identical
/// key, and argument order is significant.
pub trait KeyGenerator: Send + Sync {
    /// Derives the key for a call of a method in `namespace` on `subject`.
    fn generate_key(&self, namespace: &str, subject: &str, args: &[Value]) -> String;
}

/// Canonical JSON text of an argument list.
///
/// `serde_json` maps are ordered, so objects serialize the same way every time.
fn args_json(args: &[Value]) -> String {
    Value::Array(args.to_vec()).to_string()
}

/// Hashes the subject and arguments into a fixed-width key.
///
/// Produces `{namespace}_{xxh3}`; compact regardless of argument size.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArgumentHashKey;

impl KeyGenerator for ArgumentHashKey {
    fn generate_key(&self, namespace: &str, subject: &str, args: &[Value]) -> String {
        let args = args_json(args);
        let hash = ContentHash::from_parts([subject.as_bytes(), args.as_bytes()]);
        format!("{namespace}_{hash}")
    }
}

/// Concatenates the subject and the JSON of the arguments into a readable key.
///
/// Produces `{namespace}_{subject}_{json args}`. The JSON array keeps the key
/// unambiguous for any argument shape, at the price of long keys for large
/// arguments.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArgumentConcatKey;

impl KeyGenerator for ArgumentConcatKey {
    fn generate_key(&self, namespace: &str, subject: &str, args: &[Value]) -> String {
        format!("{namespace}_{subject}_{}", args_json(args))
    }
}

/// The key generator selected for one cacheable method.
#[derive(Clone, Default)]
pub enum KeyStrategy {
    /// [`ArgumentHashKey`].
    #[default]
    ArgumentHash,
    /// [`ArgumentConcatKey`].
    ArgumentConcat,
    /// A caller-supplied generator.
    Custom(Arc<dyn KeyGenerator>),
}

impl KeyStrategy {
    /// Derives a key using the selected generator.
    pub fn generate_key(&self, namespace: &str, subject: &str, args: &[Value]) -> String {
        match self {
            Self::ArgumentHash => ArgumentHashKey.generate_key(namespace, subject, args),
            Self::ArgumentConcat => ArgumentConcatKey.generate_key(namespace, subject, args),
            Self::Custom(generator) => generator.generate_key(namespace, subject, args),
        }
    }
}

impl fmt::Debug for KeyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArgumentHash => f.write_str("ArgumentHash"),
            Self::ArgumentConcat => f.write_str("ArgumentConcat"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

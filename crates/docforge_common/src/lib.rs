//! Shared foundational types used across the docforge workspace.
//!
//! This crate provides content hashing for cache keys and fingerprints, and a
//! clock abstraction so that TTL handling can be driven deterministically.

#![warn(missing_docs)]

pub mod clock;
pub mod hash;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use hash::ContentHash;

//! Cryptographic primitives for Chunkline.
//!
//! Provides domain-separated BLAKE3 hashing for object identifiers and the two
//! incremental payload hashes every stored object carries: SHA-256 and the
//! Tillich-Zémor homomorphic hash.
//!
//! All crypto operations wrap established libraries except the Tillich-Zémor
//! construction, which has no maintained Rust crate.

pub mod hasher;
pub mod payload;
pub mod tz;

pub use hasher::{ContentHasher, HasherError};
pub use payload::{new_hasher, sha256, Sha256Hasher, StreamHasher};
pub use tz::{tz_hash, TzError, TzHasher};

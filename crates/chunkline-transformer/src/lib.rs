//! Payload splitting for Chunkline.
//!
//! [`PayloadSizeLimiter`] turns one logical object of any size into physical
//! objects of at most `max_object_size` payload bytes. Every chunk carries a
//! SHA-256 and a Tillich-Zémor checksum of its own bytes. When more than one
//! chunk is produced, a header-only parent object (checksums of the whole
//! payload) and a linking object (ordered chunk ids) are emitted as well.
//!
//! [`ChainReader`] walks such a split-chain back out of an object store and
//! reassembles or verifies it.
//!
//! # Emission order
//!
//! ```text
//! chunk 0, chunk 1, ..., chunk n-2, parent, chunk n-1, linking
//! ```
//!
//! The parent precedes the last chunk because the last chunk embeds the
//! parent's header and id.

pub mod assemble;
mod checksum;
pub mod config;
pub mod error;
pub mod limiter;

pub use assemble::{assemble, verify_chain, ChainReader, ChainSummary};
pub use config::SplitterConfig;
pub use error::{Phase, ReleaseStep, TransformError, TransformResult};
pub use limiter::{LimiterBuilder, PayloadSizeLimiter};

//! ETag conditional caching
//!
//! The store is the only state paywire persists. It is cleared as a whole,
//! never entry by entry.

pub mod manager;
pub mod store;

pub use manager::{ConditionalCache, ETAG_RESPONSE_HEADER, IF_NONE_MATCH};
pub use store::{EtagEntry, EtagStore, FileEtagStore, MemoryEtagStore};

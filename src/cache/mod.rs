//! Cache Module
//!
//! In-process TTL cache shielding the upstream provider from repeated
//! lookups of the same college.

mod entry;
mod key;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use key::normalize_key;
pub use stats::CacheStats;
pub use store::TtlCache;

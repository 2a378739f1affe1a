//! Versioned cache storage for an offline application shell
//!
//! Stores request/response snapshots in named cache generations. Each
//! generation lives in its own directory with a JSON index, so caches
//! survive restarts and stale generations can be deleted wholesale.

mod cache;
pub mod error;
mod storage;
mod types;

pub use cache::Cache;
pub use error::{CacheError, Result};
pub use storage::CacheStorage;
pub use types::{CacheEntry, CacheIndex, CacheStats, GenerationStats, ResponseSnapshot};

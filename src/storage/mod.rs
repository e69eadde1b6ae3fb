//! Storage module for cached map state.

mod format;
mod key;

pub use format::{CachedMap, MapStore, LOSS_FILE, WEIGHTS_FILE};
pub use key::{geometry_digest, signature, CacheKey};

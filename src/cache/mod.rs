//! Page cache and background rasterization pipeline

mod key;
mod request;
mod service;
mod store;
mod worker;

pub use key::{CacheKey, Focus};
pub use request::{ProduceRequest, ProduceResponse, RequestId};
pub use service::{CacheConfig, Lookup, PageCache};
pub use store::ResidentSet;

/// Default maximum number of resident bitmaps
pub const DEFAULT_MAX_RESIDENT: usize = 24;
/// Default number of pages on each side of the focus to prefetch
pub const DEFAULT_PREFETCH_RADIUS: usize = 2;
/// Default worker thread count
pub const DEFAULT_WORKERS: usize = 2;

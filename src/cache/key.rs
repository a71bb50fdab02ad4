//! Cache keys and eviction focus

use crate::deck::Resolution;

/// Cache key for a rasterized page
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub page: usize,
    pub resolution: Resolution,
}

impl CacheKey {
    #[must_use]
    pub const fn new(page: usize, resolution: Resolution) -> Self {
        Self { page, resolution }
    }
}

/// Where the show currently is, as far as eviction is concerned.
///
/// Entries for a pinned page at an active resolution are never evicted.
/// The current slide and the one after it are always pinned.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Focus {
    pub current: usize,
    pub pinned: Vec<usize>,
    pub active: Vec<Resolution>,
}

impl Focus {
    #[must_use]
    pub fn new(current: usize, active: Vec<Resolution>) -> Self {
        Self {
            current,
            pinned: vec![current, current + 1],
            active,
        }
    }

    /// Pin additional pages, e.g. the ones visible in a running dissolve
    #[must_use]
    pub fn with_pinned(mut self, pages: impl IntoIterator<Item = usize>) -> Self {
        for page in pages {
            if !self.pinned.contains(&page) {
                self.pinned.push(page);
            }
        }
        self
    }

    #[must_use]
    pub fn protects(&self, key: &CacheKey) -> bool {
        self.pinned.contains(&key.page) && self.active.contains(&key.resolution)
    }

    /// Distance in page order from the focus page
    #[must_use]
    pub fn distance(&self, page: usize) -> usize {
        page.abs_diff(self.current)
    }
}

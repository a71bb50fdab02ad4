//! Page cache service - owns the bitmaps and the worker pool

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};

use super::key::{CacheKey, Focus};
use super::request::{ProduceRequest, ProduceResponse, RequestId};
use super::store::ResidentSet;
use super::worker::production_worker;
use super::{DEFAULT_MAX_RESIDENT, DEFAULT_PREFETCH_RADIUS, DEFAULT_WORKERS};
use crate::deck::{DeckSource, Rasterization, Resolution};
use crate::error::ShowError;

/// Cache sizing and worker pool configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    pub max_resident: usize,
    pub prefetch_radius: usize,
    pub workers: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_resident: DEFAULT_MAX_RESIDENT,
            prefetch_radius: DEFAULT_PREFETCH_RADIUS,
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Result of asking the cache for a bitmap
#[derive(Clone, Debug)]
pub enum Lookup {
    Ready(Arc<Rasterization>),
    /// Production has been requested and is not finished yet
    Pending,
    /// Rasterization failed; not retried automatically
    Unavailable,
}

impl Lookup {
    #[must_use]
    pub fn raster(&self) -> Option<&Arc<Rasterization>> {
        match self {
            Self::Ready(raster) => Some(raster),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Priority {
    Demand,
    Prefetch,
}

#[derive(Debug)]
struct InFlight {
    id: RequestId,
    priority: Priority,
}

/// Owns rasterized pages and schedules their production.
///
/// Only this type writes into the resident set. Productions run on worker
/// threads; results are collected by [`PageCache::poll`] on the caller's
/// thread, so [`PageCache::ensure`] never blocks.
pub struct PageCache {
    store: ResidentSet,
    request_tx: Sender<ProduceRequest>,
    response_rx: Receiver<ProduceResponse>,
    next_request_id: u64,
    in_flight: HashMap<CacheKey, InFlight>,
    prefetch_queue: VecDeque<CacheKey>,
    failed: HashSet<CacheKey>,
    superseded: HashSet<Resolution>,
    /// Keys pushed out by the budget since the focus last moved. Prefetch
    /// skips them, otherwise a tight budget produces and evicts forever.
    evicted: HashSet<CacheKey>,
    focus: Focus,
    page_count: usize,
    config: CacheConfig,
    num_workers: usize,
}

impl PageCache {
    /// Start the worker pool for a document with `page_count` pages
    #[must_use]
    pub fn spawn(source: Arc<dyn DeckSource>, page_count: usize, config: CacheConfig) -> Self {
        // flume gives us MPMC: every worker pulls from the same request queue.
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        let num_workers = config.workers.max(1);
        for worker_id in 0..num_workers {
            let source = Arc::clone(&source);
            let rx = request_rx.clone();
            let tx = response_tx.clone();

            std::thread::spawn(move || {
                production_worker(worker_id, source, rx, tx);
            });
        }

        Self {
            store: ResidentSet::new(config.max_resident),
            request_tx,
            response_rx,
            next_request_id: 1,
            in_flight: HashMap::new(),
            prefetch_queue: VecDeque::new(),
            failed: HashSet::new(),
            superseded: HashSet::new(),
            evicted: HashSet::new(),
            focus: Focus::default(),
            page_count,
            config,
            num_workers,
        }
    }

    /// Return the bitmap if resident, otherwise make sure it is being produced.
    ///
    /// Repeated calls for a key that is already in flight do not start a
    /// second production.
    pub fn ensure(&mut self, page: usize, resolution: Resolution) -> Lookup {
        if page >= self.page_count || resolution.is_empty() {
            return Lookup::Unavailable;
        }
        self.superseded.remove(&resolution);

        let key = CacheKey::new(page, resolution);
        if let Some(raster) = self.store.get(&key) {
            return Lookup::Ready(raster);
        }
        if self.failed.contains(&key) {
            return Lookup::Unavailable;
        }
        if let Some(in_flight) = self.in_flight.get_mut(&key) {
            in_flight.priority = Priority::Demand;
            return Lookup::Pending;
        }

        self.prefetch_queue.retain(|k| *k != key);
        self.dispatch(key, Priority::Demand);
        Lookup::Pending
    }

    /// Queue background production without blocking.
    ///
    /// Results land in the cache and are picked up through [`PageCache::ensure`].
    /// Pages the budget already evicted are not queued again until the
    /// focus moves.
    pub fn prefetch(&mut self, pages: impl IntoIterator<Item = usize>, resolution: Resolution) {
        if resolution.is_empty() {
            return;
        }
        for page in pages {
            if page >= self.page_count {
                continue;
            }
            let key = CacheKey::new(page, resolution);
            if self.store.contains(&key)
                || self.in_flight.contains_key(&key)
                || self.failed.contains(&key)
                || self.evicted.contains(&key)
                || self.prefetch_queue.contains(&key)
            {
                continue;
            }
            self.prefetch_queue.push_back(key);
        }
        self.pump();
    }

    /// Move the eviction focus. Queued prefetches that drifted out of range
    /// are dropped; dispatched productions are left to finish.
    pub fn set_focus(&mut self, focus: Focus) {
        if focus == self.focus {
            return;
        }
        // One extra page of slack: the presenter prefetches after the next slide.
        let reach = self.config.prefetch_radius + 1;
        let before = self.prefetch_queue.len();
        self.prefetch_queue
            .retain(|key| focus.distance(key.page) <= reach);
        if self.prefetch_queue.len() != before {
            debug!(
                "Dropped {} queued prefetches after focus moved to {}",
                before - self.prefetch_queue.len(),
                focus.current
            );
        }

        // Nearest first.
        self.prefetch_queue
            .make_contiguous()
            .sort_by_key(|key| focus.distance(key.page));

        self.focus = focus;
        self.evicted.clear();
        for key in self.store.enforce_budget(&self.focus) {
            debug!("Evicted page {} at {}", key.page, key.resolution);
            self.evicted.insert(key);
        }
    }

    /// Drain finished productions. Returns how many became resident.
    pub fn poll(&mut self) -> usize {
        let mut ready = 0;
        while let Ok(response) = self.response_rx.try_recv() {
            if self.accept(response) {
                ready += 1;
            }
        }
        self.pump();
        ready
    }

    /// Block until nothing is in flight or queued, or the timeout passes
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.poll();
            if !self.is_busy() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(response) => {
                    self.accept(response);
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                    return !self.is_busy();
                }
            }
        }
    }

    /// Forget everything produced at `resolution`.
    ///
    /// Productions already running for it are allowed to finish but their
    /// results are discarded, unless the resolution is requested again first.
    pub fn invalidate_resolution(&mut self, resolution: Resolution) -> usize {
        let removed = self.store.invalidate_resolution(resolution);
        self.failed.retain(|key| key.resolution != resolution);
        self.evicted.retain(|key| key.resolution != resolution);
        self.prefetch_queue.retain(|key| key.resolution != resolution);
        if self.in_flight.keys().any(|key| key.resolution == resolution) {
            self.superseded.insert(resolution);
        }
        debug!("Invalidated {removed} bitmaps at {resolution}");
        removed
    }

    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.store.contains(key)
    }

    #[must_use]
    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.in_flight.contains_key(key)
    }

    #[must_use]
    pub fn is_failed(&self, key: &CacheKey) -> bool {
        self.failed.contains(key)
    }

    /// True while productions are running or prefetches are queued
    #[must_use]
    pub fn is_busy(&self) -> bool {
        !self.in_flight.is_empty() || !self.prefetch_queue.is_empty()
    }

    #[must_use]
    pub fn resident_keys(&self) -> Vec<CacheKey> {
        self.store.keys()
    }

    #[must_use]
    pub fn resident_len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn queued_prefetches(&self) -> usize {
        self.prefetch_queue.len()
    }

    #[must_use]
    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Shutdown all workers
    pub fn shutdown(&self) {
        for _ in 0..self.num_workers {
            let _ = self.request_tx.send(ProduceRequest::Shutdown);
        }
    }

    fn accept(&mut self, response: ProduceResponse) -> bool {
        let key = response.key();
        match self.in_flight.get(&key) {
            Some(in_flight) if in_flight.id == response.id() => {
                self.in_flight.remove(&key);
            }
            _ => {
                debug!("Ignoring stale response for page {} at {}", key.page, key.resolution);
                return false;
            }
        }

        if self.superseded.contains(&key.resolution) {
            let race = ShowError::ResizeRace {
                index: key.page,
                resolution: key.resolution,
            };
            debug!("{race}");
            if !self.in_flight.keys().any(|k| k.resolution == key.resolution) {
                self.superseded.remove(&key.resolution);
            }
            return false;
        }

        match response {
            ProduceResponse::Produced { raster, .. } => {
                let (_, evicted) = self.store.insert(key, raster, &self.focus);
                for victim in evicted {
                    debug!("Evicted page {} at {}", victim.page, victim.resolution);
                    self.evicted.insert(victim);
                }
                true
            }
            ProduceResponse::Failed { error, .. } => {
                let failure = ShowError::RasterizationFailure {
                    index: key.page,
                    resolution: key.resolution,
                    detail: error.to_string(),
                };
                warn!("{failure}");
                self.failed.insert(key);
                false
            }
        }
    }

    fn pump(&mut self) {
        let limit = self.num_workers;
        while self.prefetches_in_flight() < limit {
            let Some(key) = self.prefetch_queue.pop_front() else {
                break;
            };
            if self.store.contains(&key) || self.in_flight.contains_key(&key) {
                continue;
            }
            self.dispatch(key, Priority::Prefetch);
        }
    }

    fn prefetches_in_flight(&self) -> usize {
        self.in_flight
            .values()
            .filter(|f| f.priority == Priority::Prefetch)
            .count()
    }

    fn dispatch(&mut self, key: CacheKey, priority: Priority) {
        let id = self.next_id();
        if self
            .request_tx
            .send(ProduceRequest::Produce { id, key })
            .is_err()
        {
            warn!("No production workers left; page {} unavailable", key.page);
            self.failed.insert(key);
            return;
        }
        self.in_flight.insert(key, InFlight { id, priority });
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }
}

impl Drop for PageCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}

//! Row Source
//!
//! Windowed, server-backed row data for tables too large to hold in memory.
//! Rows are fetched in fixed-size blocks through a [`RowFetcher`], cached with
//! LRU eviction, and served synchronously for any `[start, end)` range: loaded
//! rows where available, `None` gaps otherwise. Observers are told when new
//! data lands so the table can re-read its window.
//!
//! ## Data flow
//!
//! ```text
//! get_rows_in_range(start, end)
//!       │  queue missing/stale blocks, touch LRU, copy known rows
//!       ▼
//! RequestCoordinator ──► RowFetcher::get_rows (tokio task)
//!                                │
//!                                ▼ completion (epoch checked)
//!                       BlockCache::put / mark_error
//!                                │
//!                                ▼
//!                      ObserverHub::notify → caller re-reads
//! ```
//!
//! All state sits behind one mutex. Fetchers and listeners are always called
//! with the lock released, so a listener may read from the source it observes.
//!
//! A provider that never resolves keeps its request slot; timing out such
//! calls is the fetcher's responsibility.

use crate::cache::BlockCache;
use crate::domain::{Block, BlockStatus, FilterModel, RowResponse, SortModel, SourceConfig};
use crate::error::{Error, Result};
use crate::services::{
    ObserverHub, PendingRequest, RequestCoordinator, RowFetcher, SourceEvent, Subscription,
    fetch_handle,
};
use crate::state::epoch::ModelEpoch;
use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;
use tokio::time::Instant;

/// Point-in-time view of the cache and request pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub resident_blocks: usize,
    pub loaded_blocks: usize,
    pub loading_blocks: usize,
    pub error_blocks: usize,
    pub active_requests: usize,
    pub queued_requests: usize,
    pub epoch: u64,
    pub total_rows: Option<usize>,
}

/// Builder for [`RowSource`]
pub struct RowSourceBuilder<R> {
    config: SourceConfig,
    fetcher: Option<Arc<dyn RowFetcher<R>>>,
    runtime: Option<Handle>,
}

impl<R: Clone + Send + Sync + 'static> RowSourceBuilder<R> {
    /// Set the block provider (required)
    pub fn fetcher(mut self, fetcher: impl RowFetcher<R>) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    /// Set a provider shared with other sources
    pub fn shared_fetcher(mut self, fetcher: Arc<dyn RowFetcher<R>>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Runtime that runs block fetches
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Validate the configuration and create the source
    pub fn build(self) -> Result<RowSource<R>> {
        let fetcher = self.fetcher.ok_or(Error::MissingFetcher)?;
        self.config.validate()?;

        let config = self.config;
        let inner = Inner {
            cache: BlockCache::new(
                config.block_size,
                config.cache_block_count,
                config.cache_timeout(),
            ),
            coordinator: RequestCoordinator::new(config.max_concurrent_requests),
            epoch: ModelEpoch::new(),
            sort_model: Arc::new(SortModel::default()),
            filter_model: Arc::new(FilterModel::default()),
            group_keys: Arc::from(Vec::<String>::new()),
            destroyed: false,
        };

        tracing::debug!(
            "Created row source (block_size={}, max_concurrent={}, cache_blocks={})",
            config.block_size,
            config.max_concurrent_requests,
            config.cache_block_count
        );

        Ok(RowSource {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                fetcher,
                hub: ObserverHub::new(),
                runtime: self.runtime.unwrap_or_else(fetch_handle),
                config,
            }),
        })
    }
}

/// Mutable state, only touched under the lock
struct Inner<R> {
    cache: BlockCache<R>,
    coordinator: RequestCoordinator,
    epoch: ModelEpoch,
    sort_model: Arc<SortModel>,
    filter_model: Arc<FilterModel>,
    group_keys: Arc<[String]>,
    destroyed: bool,
}

impl<R> Inner<R> {
    /// Request for `index` under the current criteria
    fn pending_request(&self, index: usize) -> PendingRequest {
        let (start_row, end_row) =
            Block::<R>::bounds(index, self.cache.block_size(), self.cache.total_rows());
        PendingRequest {
            block_index: index,
            start_row,
            end_row,
            sort_model: self.sort_model.clone(),
            filter_model: self.filter_model.clone(),
            group_keys: self.group_keys.clone(),
            epoch: self.epoch.current(),
        }
    }

    /// Bump the epoch and drop everything cached or queued
    fn invalidate(&mut self) -> SourceEvent {
        let epoch = self.epoch.bump();
        let dropped = self.coordinator.drop_queued();
        self.cache.clear();
        tracing::debug!(
            "Invalidated row cache at epoch {} ({} queued requests dropped)",
            epoch,
            dropped
        );
        SourceEvent::Invalidated { epoch }
    }
}

struct Shared<R> {
    inner: Mutex<Inner<R>>,
    fetcher: Arc<dyn RowFetcher<R>>,
    hub: ObserverHub,
    runtime: Handle,
    config: SourceConfig,
}

impl<R: Clone + Send + Sync + 'static> Shared<R> {
    fn lock(&self) -> MutexGuard<'_, Inner<R>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock, failing if the source was destroyed
    fn live(&self) -> Result<MutexGuard<'_, Inner<R>>> {
        let guard = self.lock();
        if guard.destroyed {
            tracing::warn!("Row source used after destroy");
            return Err(Error::Destroyed);
        }
        Ok(guard)
    }

    /// Hand dispatched requests to the fetcher; must be called without the lock
    fn dispatch(self: &Arc<Self>, ready: Vec<PendingRequest>) {
        for request in ready {
            tracing::debug!(
                "Fetching block {} (rows {}..{}, epoch {})",
                request.block_index,
                request.start_row,
                request.end_row,
                request.epoch
            );
            let fetch = self.fetcher.get_rows(request.to_row_request());
            let shared = Arc::downgrade(self);
            self.runtime.spawn(async move {
                let result = fetch.await;
                if let Some(shared) = shared.upgrade() {
                    shared.complete(request, result);
                }
            });
        }
    }

    /// Apply a settled fetch, refill free slots, then notify
    fn complete(self: &Arc<Self>, request: PendingRequest, result: Result<RowResponse<R>>) {
        let now = Instant::now();
        let mut guard = self.lock();
        if guard.destroyed {
            return;
        }
        let inner = &mut *guard;
        inner.coordinator.settle();

        let index = request.block_index;
        let mut events = Vec::new();
        if !inner.epoch.is_current(request.epoch) {
            tracing::debug!(
                "Discarding block {} from epoch {} (current {})",
                index,
                request.epoch,
                inner.epoch.current()
            );
        } else {
            match result {
                Ok(response) => {
                    let total = response.reported_total(request.start_row, request.len());
                    let outcome = inner.cache.put(index, response.rows, total, now);
                    events.push(SourceEvent::BlockLoaded { index });
                    if outcome.total_changed {
                        events.push(SourceEvent::TotalRowsChanged {
                            total: inner.cache.total_rows(),
                        });
                    }
                    if !outcome.evicted.is_empty() {
                        tracing::trace!("Evicted blocks {:?}", outcome.evicted);
                    }
                }
                Err(err) => {
                    tracing::warn!("Block {} fetch failed: {}", index, err);
                    if inner.cache.mark_error(index) {
                        events.push(SourceEvent::BlockFailed {
                            index,
                            message: err.to_string().into(),
                        });
                    }
                }
            }
        }

        let ready = inner.coordinator.take_ready();
        drop(guard);
        self.dispatch(ready);
        self.hub.notify_all(&events);
    }

    /// Apply a criteria change under the lock, then notify
    fn invalidate_with(&self, update: impl FnOnce(&mut Inner<R>)) -> Result<()> {
        let event = {
            let mut inner = self.live()?;
            update(&mut *inner);
            inner.invalidate()
        };
        self.hub.notify(&event);
        Ok(())
    }
}

/// Block-cached, lazily fetched row data source.
///
/// Cheap to clone; all clones share the same cache.
pub struct RowSource<R> {
    shared: Arc<Shared<R>>,
}

impl<R> Clone for RowSource<R> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

/// Non-owning handle to a [`RowSource`], for listeners that read back from
/// the source they observe
pub struct WeakRowSource<R> {
    shared: Weak<Shared<R>>,
}

impl<R> Clone for WeakRowSource<R> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<R> WeakRowSource<R> {
    /// The source, if any strong handle is still alive
    pub fn upgrade(&self) -> Option<RowSource<R>> {
        self.shared.upgrade().map(|shared| RowSource { shared })
    }
}

impl<R: Clone + Send + Sync + 'static> RowSource<R> {
    /// Start building a source with the given configuration
    pub fn builder(config: SourceConfig) -> RowSourceBuilder<R> {
        RowSourceBuilder {
            config,
            fetcher: None,
            runtime: None,
        }
    }

    /// Register a listener for data changes.
    ///
    /// The source owns its listeners, so a listener holding a clone of the
    /// source keeps it alive until [`RowSource::destroy`]. Capture
    /// [`RowSource::downgrade`] instead.
    pub fn subscribe<F>(&self, listener: F) -> Result<Subscription>
    where
        F: Fn(&SourceEvent) + Send + Sync + 'static,
    {
        drop(self.shared.live()?);
        Ok(self.shared.hub.subscribe(listener))
    }

    /// Handle that does not keep the source alive
    pub fn downgrade(&self) -> WeakRowSource<R> {
        WeakRowSource {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Rows `[start, end)` as currently known; never waits on a fetch.
    ///
    /// Missing, failed and stale blocks are queued for fetching. Stale blocks
    /// still return their previous rows while they revalidate.
    pub fn get_rows_in_range(&self, start: usize, end: usize) -> Result<Vec<Option<R>>> {
        let mut guard = self.shared.live()?;
        if end <= start {
            return Ok(Vec::new());
        }

        let now = Instant::now();
        let inner = &mut *guard;
        let block_size = inner.cache.block_size();
        let first_block = start / block_size;
        let last_block = (end - 1) / block_size;

        for index in first_block..=last_block {
            if inner.cache.needs_fetch(index, now) {
                let request = inner.pending_request(index);
                inner
                    .coordinator
                    .queue_block_request(&mut inner.cache, request, now);
            }
            inner.cache.touch(index, now);
        }

        let ready = inner.coordinator.take_ready();
        let rows = (start..end).map(|row| inner.cache.row(row).cloned()).collect();
        drop(guard);

        self.shared.dispatch(ready);
        Ok(rows)
    }

    /// Single row; fetches its block if needed
    pub fn get_row(&self, index: usize) -> Result<Option<R>> {
        let mut rows = self.get_rows_in_range(index, index.saturating_add(1))?;
        Ok(rows.pop().flatten())
    }

    /// Cached row without fetching or refreshing its access time
    pub fn peek_row(&self, index: usize) -> Result<Option<R>> {
        Ok(self.shared.live()?.cache.row(index).cloned())
    }

    /// Total row count, unknown until the first successful response
    pub fn get_total_rows(&self) -> Result<Option<usize>> {
        Ok(self.shared.live()?.cache.total_rows())
    }

    /// Whether the block is queued or in flight
    pub fn is_block_loading(&self, index: usize) -> Result<bool> {
        Ok(self
            .shared
            .live()?
            .cache
            .get(index)
            .is_some_and(|block| block.is_loading()))
    }

    pub fn block_status(&self, index: usize) -> Result<Option<BlockStatus>> {
        Ok(self.shared.live()?.cache.get(index).map(|block| block.status))
    }

    /// Resident block indices, ascending
    pub fn resident_blocks(&self) -> Result<Vec<usize>> {
        Ok(self.shared.live()?.cache.indices())
    }

    /// Whether every block covering `range` is loaded; blocks past a known
    /// end count as loaded
    pub fn is_range_loaded(&self, range: Range<usize>) -> Result<bool> {
        let inner = self.shared.live()?;
        if range.is_empty() {
            return Ok(true);
        }
        let block_size = inner.cache.block_size();
        let first_block = range.start / block_size;
        let last_block = (range.end - 1) / block_size;
        Ok((first_block..=last_block).all(|index| {
            inner.cache.is_past_end(index)
                || inner.cache.get(index).is_some_and(|block| block.is_loaded())
        }))
    }

    /// Replace the sort criteria and invalidate all cached data
    pub fn set_sort_model(&self, model: SortModel) -> Result<()> {
        self.shared
            .invalidate_with(|inner| inner.sort_model = Arc::new(model))
    }

    /// Replace the filter criteria and invalidate all cached data
    pub fn set_filter_model(&self, model: FilterModel) -> Result<()> {
        self.shared
            .invalidate_with(|inner| inner.filter_model = Arc::new(model))
    }

    /// Replace the group path and invalidate all cached data
    pub fn set_group_keys(&self, keys: Vec<String>) -> Result<()> {
        self.shared
            .invalidate_with(|inner| inner.group_keys = Arc::from(keys))
    }

    /// Invalidate all cached data under the same criteria
    pub fn refresh(&self) -> Result<()> {
        self.shared.invalidate_with(|_| {})
    }

    /// Drop one block so its next read refetches.
    ///
    /// Blocks in flight are left alone; their fetch lands fresh rows anyway.
    /// Returns whether a block was removed.
    pub fn purge_block(&self, index: usize) -> Result<bool> {
        let removed = {
            let mut inner = self.shared.live()?;
            match inner.cache.get(index).map(|block| block.status) {
                Some(BlockStatus::Loading) => {
                    tracing::debug!("Block {} is in flight, not purged", index);
                    false
                }
                Some(_) => inner.cache.remove(index).is_some(),
                None => false,
            }
        };
        if removed {
            self.shared.hub.notify(&SourceEvent::BlockPurged { index });
        }
        Ok(removed)
    }

    /// Drop all listeners and cached data; every later call fails with
    /// [`Error::Destroyed`]
    pub fn destroy(&self) -> Result<()> {
        {
            let mut inner = self.shared.live()?;
            inner.destroyed = true;
            inner.coordinator.drop_queued();
            inner.cache.clear();
        }
        self.shared.hub.clear();
        tracing::debug!("Row source destroyed");
        Ok(())
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let inner = self.shared.live()?;
        Ok(CacheStats {
            resident_blocks: inner.cache.len(),
            loaded_blocks: inner.cache.count_with_status(BlockStatus::Loaded),
            loading_blocks: inner.cache.count_with_status(BlockStatus::Loading),
            error_blocks: inner.cache.count_with_status(BlockStatus::Error),
            active_requests: inner.coordinator.active_requests(),
            queued_requests: inner.coordinator.queued_requests(),
            epoch: inner.epoch.current(),
            total_rows: inner.cache.total_rows(),
        })
    }

    /// Current model epoch
    pub fn epoch(&self) -> Result<u64> {
        Ok(self.shared.live()?.epoch.current())
    }

    pub fn sort_model(&self) -> Result<SortModel> {
        Ok((*self.shared.live()?.sort_model).clone())
    }

    pub fn filter_model(&self) -> Result<FilterModel> {
        Ok((*self.shared.live()?.filter_model).clone())
    }

    pub fn group_keys(&self) -> Result<Vec<String>> {
        Ok(self.shared.live()?.group_keys.to_vec())
    }

    /// Configuration the source was built with
    pub fn config(&self) -> &SourceConfig {
        &self.shared.config
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.lock().destroyed
    }
}

impl<R: Clone + Send + Sync + 'static> std::fmt::Debug for RowSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("RowSource")
            .field("cache", &inner.cache)
            .field("coordinator", &inner.coordinator)
            .field("epoch", &inner.epoch.current())
            .field("destroyed", &inner.destroyed)
            .finish()
    }
}

//! Request Coordinator
//!
//! Turns "block N is needed" into an outbound fetch. Requests are deduplicated
//! against blocks that are already loading or fresh, queued FIFO, and released
//! only while fewer than `max_concurrent` fetches are outstanding.

use crate::cache::BlockCache;
use crate::domain::{FilterModel, RowRequest, SortModel};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::time::Instant;

/// A block fetch waiting for a free slot
#[derive(Clone, Debug)]
pub struct PendingRequest {
    pub block_index: usize,
    pub start_row: usize,
    pub end_row: usize,
    pub sort_model: Arc<SortModel>,
    pub filter_model: Arc<FilterModel>,
    pub group_keys: Arc<[String]>,
    /// Model epoch when the request was queued
    pub epoch: u64,
}

impl PendingRequest {
    /// Provider-facing request
    pub fn to_row_request(&self) -> RowRequest {
        RowRequest {
            start_row: self.start_row,
            end_row: self.end_row,
            sort_model: (*self.sort_model).clone(),
            filter_model: (*self.filter_model).clone(),
            group_keys: self.group_keys.to_vec(),
        }
    }

    /// Rows asked for
    pub fn len(&self) -> usize {
        self.end_row.saturating_sub(self.start_row)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounded-concurrency FIFO dispatcher
#[derive(Debug)]
pub struct RequestCoordinator {
    queue: VecDeque<PendingRequest>,
    active: usize,
    max_concurrent: usize,
}

impl RequestCoordinator {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            active: 0,
            max_concurrent,
        }
    }

    /// Queue a block fetch unless the block is already loading or fresh.
    ///
    /// The block is marked loading immediately so a second read in the same
    /// scroll tick does not queue it again. Returns whether it was queued.
    pub fn queue_block_request<R>(
        &mut self,
        cache: &mut BlockCache<R>,
        request: PendingRequest,
        now: Instant,
    ) -> bool {
        if !cache.needs_fetch(request.block_index, now) {
            return false;
        }
        cache.mark_loading(request.block_index, request.epoch, now);
        tracing::trace!(
            "Queued block {} (rows {}..{}, epoch {})",
            request.block_index,
            request.start_row,
            request.end_row,
            request.epoch
        );
        self.queue.push_back(request);
        true
    }

    /// Pop queued requests into free slots.
    ///
    /// Each returned request occupies a slot until `settle` is called for it.
    pub fn take_ready(&mut self) -> Vec<PendingRequest> {
        let mut ready = Vec::new();
        while self.active < self.max_concurrent {
            let Some(request) = self.queue.pop_front() else {
                break;
            };
            self.active += 1;
            ready.push(request);
        }
        ready
    }

    /// Release the slot of a finished fetch
    pub fn settle(&mut self) {
        self.active = self.active.saturating_sub(1);
    }

    /// Forget queued requests that were never dispatched
    pub fn drop_queued(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }

    /// Fetches currently outstanding
    pub fn active_requests(&self) -> usize {
        self.active
    }

    /// Requests waiting for a slot
    pub fn queued_requests(&self) -> usize {
        self.queue.len()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BlockStatus;

    fn request(block_index: usize, epoch: u64) -> PendingRequest {
        PendingRequest {
            block_index,
            start_row: block_index * 10,
            end_row: (block_index + 1) * 10,
            sort_model: Arc::new(SortModel::default()),
            filter_model: Arc::new(FilterModel::default()),
            group_keys: Arc::from(Vec::<String>::new()),
            epoch,
        }
    }

    #[test]
    fn test_dedup_same_block() {
        let now = Instant::now();
        let mut cache = BlockCache::<u32>::new(10, 8, None);
        let mut coordinator = RequestCoordinator::new(4);

        assert!(coordinator.queue_block_request(&mut cache, request(3, 0), now));
        assert!(!coordinator.queue_block_request(&mut cache, request(3, 0), now));
        assert_eq!(coordinator.queued_requests(), 1);
        assert_eq!(cache.get(3).map(|b| b.status), Some(BlockStatus::Loading));
    }

    #[test]
    fn test_fresh_block_not_requeued() {
        let now = Instant::now();
        let mut cache = BlockCache::new(10, 8, None);
        let mut coordinator = RequestCoordinator::new(4);
        cache.put(0, vec![0u32; 10], None, now);

        assert!(!coordinator.queue_block_request(&mut cache, request(0, 0), now));
    }

    #[test]
    fn test_bounded_dispatch_is_fifo() {
        let now = Instant::now();
        let mut cache = BlockCache::<u32>::new(10, 8, None);
        let mut coordinator = RequestCoordinator::new(2);
        for index in [4, 1, 7, 2] {
            coordinator.queue_block_request(&mut cache, request(index, 0), now);
        }

        let first: Vec<usize> = coordinator
            .take_ready()
            .iter()
            .map(|r| r.block_index)
            .collect();
        assert_eq!(first, vec![4, 1]);
        assert!(coordinator.take_ready().is_empty());
        assert_eq!(coordinator.active_requests(), 2);

        coordinator.settle();
        let next: Vec<usize> = coordinator
            .take_ready()
            .iter()
            .map(|r| r.block_index)
            .collect();
        assert_eq!(next, vec![7]);
        assert_eq!(coordinator.active_requests(), 2);
        assert_eq!(coordinator.queued_requests(), 1);
    }

    #[test]
    fn test_drop_queued_keeps_active() {
        let now = Instant::now();
        let mut cache = BlockCache::<u32>::new(10, 8, None);
        let mut coordinator = RequestCoordinator::new(1);
        coordinator.queue_block_request(&mut cache, request(0, 0), now);
        coordinator.queue_block_request(&mut cache, request(1, 0), now);
        coordinator.take_ready();

        assert_eq!(coordinator.drop_queued(), 1);
        assert_eq!(coordinator.active_requests(), 1);
        coordinator.settle();
        coordinator.settle();
        assert_eq!(coordinator.active_requests(), 0);
    }

    #[test]
    fn test_row_request_snapshot() {
        let mut pending = request(2, 5);
        pending.group_keys = Arc::from(vec!["north".to_string()]);
        let row_request = pending.to_row_request();
        assert_eq!(row_request.start_row, 20);
        assert_eq!(row_request.end_row, 30);
        assert_eq!(row_request.group_keys, vec!["north".to_string()]);
        assert_eq!(pending.len(), 10);
    }
}

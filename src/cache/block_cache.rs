//! Block cache (LRU by access time)
//!
//! Blocks are kept in a linked hash map ordered from least to most recently
//! accessed: every touch and every load moves a block to the back, so the
//! front is always the eviction candidate. Blocks in flight are never evicted,
//! and neither is a block that was just stored; an over-capacity cache of
//! loading blocks temporarily exceeds its bound.

use crate::domain::{Block, BlockStatus};
use ahash::RandomState;
use hashlink::LinkedHashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Result of storing a loaded block
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PutOutcome {
    /// The reported total differed from the known one
    pub total_changed: bool,
    /// Blocks dropped to get back under capacity
    pub evicted: Vec<usize>,
}

/// Keyed store of blocks with bounded residency and age-based staleness
pub struct BlockCache<R> {
    blocks: LinkedHashMap<usize, Block<R>, RandomState>,
    block_size: usize,
    capacity: usize,
    timeout: Option<Duration>,
    total_rows: Option<usize>,
}

impl<R> BlockCache<R> {
    /// Create an empty cache
    pub fn new(block_size: usize, capacity: usize, timeout: Option<Duration>) -> Self {
        Self {
            blocks: LinkedHashMap::with_hasher(RandomState::new()),
            block_size,
            capacity,
            timeout,
            total_rows: None,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total row count, unknown until a provider reports it
    pub fn total_rows(&self) -> Option<usize> {
        self.total_rows
    }

    /// Update the known total; returns whether it changed
    pub fn set_total_rows(&mut self, total_rows: Option<usize>) -> bool {
        if self.total_rows == total_rows {
            return false;
        }
        self.total_rows = total_rows;
        let block_size = self.block_size;
        for block in self.blocks.values_mut() {
            block.rebound(block_size, total_rows);
        }
        true
    }

    pub fn get(&self, index: usize) -> Option<&Block<R>> {
        self.blocks.get(&index)
    }

    /// Number of resident blocks, in any status
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Resident block indices in ascending order
    pub fn indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.blocks.keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    pub fn count_with_status(&self, status: BlockStatus) -> usize {
        self.blocks.values().filter(|b| b.status == status).count()
    }

    /// Row at an absolute index, whatever the status of its block
    pub fn row(&self, row_index: usize) -> Option<&R> {
        if self.total_rows.is_some_and(|total| row_index >= total) {
            return None;
        }
        self.blocks
            .get(&(row_index / self.block_size))
            .and_then(|block| block.row(row_index))
    }

    /// Whether the block lies wholly past the known end of the data
    pub fn is_past_end(&self, index: usize) -> bool {
        self.total_rows
            .is_some_and(|total| index.saturating_mul(self.block_size) >= total)
    }

    /// Whether a read of this block should queue a fetch
    pub fn needs_fetch(&self, index: usize, now: Instant) -> bool {
        if self.is_past_end(index) {
            return false;
        }
        match self.blocks.get(&index).map(|b| b.status) {
            None | Some(BlockStatus::Idle) | Some(BlockStatus::Error) => true,
            Some(BlockStatus::Loading) => false,
            Some(BlockStatus::Loaded) => self.is_stale(index, now),
        }
    }

    /// Loaded and untouched for longer than the timeout
    pub fn is_stale(&self, index: usize, now: Instant) -> bool {
        let Some(timeout) = self.timeout else {
            return false;
        };
        self.blocks.get(&index).is_some_and(|block| {
            block.is_loaded() && now.saturating_duration_since(block.last_access) > timeout
        })
    }

    /// Refresh the access time and move the block to the most-recent end
    pub fn touch(&mut self, index: usize, now: Instant) {
        if let Some(block) = self.blocks.to_back(&index) {
            block.last_access = now;
        }
    }

    /// Mark a block as queued/in flight, creating it if needed.
    ///
    /// Previously loaded rows stay readable until the new fetch settles.
    pub fn mark_loading(&mut self, index: usize, epoch: u64, now: Instant) {
        let block_size = self.block_size;
        let total_rows = self.total_rows;
        let block = self
            .blocks
            .entry(index)
            .or_insert_with(|| Block::new(index, block_size, total_rows, now));
        block.status = BlockStatus::Loading;
        block.request_epoch = epoch;
    }

    /// Mark a block as failed; returns false if it is not resident
    pub fn mark_error(&mut self, index: usize) -> bool {
        match self.blocks.get_mut(&index) {
            Some(block) => {
                block.fail();
                true
            }
            None => false,
        }
    }

    /// Store fetched rows as loaded, update the total, then evict
    pub fn put(
        &mut self,
        index: usize,
        mut rows: Vec<R>,
        total_rows: Option<usize>,
        now: Instant,
    ) -> PutOutcome {
        if rows.len() > self.block_size {
            tracing::warn!(
                "Block {} returned {} rows, truncating to block size {}",
                index,
                rows.len(),
                self.block_size
            );
            rows.truncate(self.block_size);
        }

        let total_changed = match total_rows {
            Some(total) => self.set_total_rows(Some(total)),
            None => false,
        };

        let block_size = self.block_size;
        let known_total = self.total_rows;
        let block = self
            .blocks
            .entry(index)
            .or_insert_with(|| Block::new(index, block_size, known_total, now));
        block.fill(rows, now);
        self.blocks.to_back(&index);

        PutOutcome {
            total_changed,
            evicted: self.evict_except(Some(index)),
        }
    }

    /// Drop least-recently-accessed settled blocks until within capacity
    pub fn evict_if_needed(&mut self) -> Vec<usize> {
        self.evict_except(None)
    }

    fn evict_except(&mut self, keep: Option<usize>) -> Vec<usize> {
        let mut evicted = Vec::new();
        while self.blocks.len() > self.capacity {
            let victim = self
                .blocks
                .iter()
                .find(|(index, block)| !block.is_loading() && keep != Some(**index))
                .map(|(index, _)| *index);

            match victim {
                Some(index) => {
                    self.blocks.remove(&index);
                    tracing::trace!("Evicted block {}", index);
                    evicted.push(index);
                }
                None => break,
            }
        }
        evicted
    }

    /// Remove a single block
    pub fn remove(&mut self, index: usize) -> Option<Block<R>> {
        self.blocks.remove(&index)
    }

    /// Drop every block and forget the total
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.total_rows = None;
    }
}

impl<R> std::fmt::Debug for BlockCache<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockCache")
            .field("block_size", &self.block_size)
            .field("capacity", &self.capacity)
            .field("resident", &self.blocks.len())
            .field("total_rows", &self.total_rows)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(index: usize, block_size: usize) -> Vec<usize> {
        (index * block_size..(index + 1) * block_size).collect()
    }

    #[test]
    fn test_put_and_read() {
        let now = Instant::now();
        let mut cache = BlockCache::new(10, 4, None);
        cache.mark_loading(1, 0, now);
        let outcome = cache.put(1, rows(1, 10), Some(95), now);

        assert!(outcome.total_changed);
        assert!(outcome.evicted.is_empty());
        assert_eq!(cache.total_rows(), Some(95));
        assert_eq!(cache.row(15), Some(&15));
        assert_eq!(cache.row(5), None);
        assert_eq!(cache.get(1).map(|b| b.status), Some(BlockStatus::Loaded));
    }

    #[test]
    fn test_same_total_is_not_a_change() {
        let now = Instant::now();
        let mut cache = BlockCache::new(10, 4, None);
        assert!(cache.put(0, rows(0, 10), Some(100), now).total_changed);
        assert!(!cache.put(1, rows(1, 10), Some(100), now).total_changed);
        assert!(cache.put(2, rows(2, 10), Some(80), now).total_changed);
    }

    #[test]
    fn test_evicts_least_recently_accessed() {
        let now = Instant::now();
        let mut cache = BlockCache::new(10, 2, None);
        cache.put(0, rows(0, 10), None, now);
        cache.put(1, rows(1, 10), None, now);
        // Reading block 0 makes block 1 the oldest
        cache.touch(0, now);
        let outcome = cache.put(2, rows(2, 10), None, now);

        assert_eq!(outcome.evicted, vec![1]);
        assert_eq!(cache.indices(), vec![0, 2]);
    }

    #[test]
    fn test_never_evicts_loading_blocks() {
        let now = Instant::now();
        let mut cache = BlockCache::<usize>::new(10, 1, None);
        cache.mark_loading(0, 0, now);
        cache.mark_loading(1, 0, now);
        cache.mark_loading(2, 0, now);
        assert!(cache.evict_if_needed().is_empty());
        assert_eq!(cache.len(), 3);

        // The freshly stored block stays even though the cache is over capacity
        let outcome = cache.put(1, rows(1, 10), None, now);
        assert!(outcome.evicted.is_empty());
        assert_eq!(cache.indices(), vec![0, 1, 2]);
        assert_eq!(cache.count_with_status(BlockStatus::Loading), 2);

        assert_eq!(cache.put(0, rows(0, 10), None, now).evicted, vec![1]);
        assert_eq!(cache.put(2, rows(2, 10), None, now).evicted, vec![0]);
        assert_eq!(cache.indices(), vec![2]);
    }

    #[test]
    fn test_row_index_near_usize_max() {
        let now = Instant::now();
        let mut cache = BlockCache::<usize>::new(100, 4, None);
        let last = usize::MAX / 100;
        assert!(cache.needs_fetch(last, now));
        cache.mark_loading(last, 0, now);
        assert_eq!(cache.get(last).map(|b| b.end_row), Some(usize::MAX));

        cache.set_total_rows(Some(1_000));
        assert!(cache.is_past_end(last));
        assert!(!cache.needs_fetch(last, now));
        assert_eq!(cache.row(usize::MAX - 1), None);
    }

    #[test]
    fn test_error_blocks_are_evictable() {
        let now = Instant::now();
        let mut cache = BlockCache::new(10, 1, None);
        cache.mark_loading(0, 0, now);
        assert!(cache.mark_error(0));
        cache.put(1, rows(1, 10), None, now);
        assert_eq!(cache.indices(), vec![1]);
        assert!(!cache.mark_error(7));
    }

    #[test]
    fn test_staleness() {
        let t0 = Instant::now();
        let mut cache = BlockCache::new(10, 4, Some(Duration::from_millis(100)));
        cache.put(0, rows(0, 10), None, t0);

        assert!(!cache.is_stale(0, t0 + Duration::from_millis(100)));
        assert!(cache.is_stale(0, t0 + Duration::from_millis(101)));
        assert!(cache.needs_fetch(0, t0 + Duration::from_millis(101)));

        cache.touch(0, t0 + Duration::from_millis(101));
        assert!(!cache.is_stale(0, t0 + Duration::from_millis(150)));
    }

    #[test]
    fn test_no_timeout_never_stale() {
        let t0 = Instant::now();
        let mut cache = BlockCache::new(10, 4, None);
        cache.put(0, rows(0, 10), None, t0);
        assert!(!cache.is_stale(0, t0 + Duration::from_secs(86_400)));
    }

    #[test]
    fn test_needs_fetch_by_status() {
        let now = Instant::now();
        let mut cache = BlockCache::new(10, 4, None);
        assert!(cache.needs_fetch(0, now));
        cache.mark_loading(0, 0, now);
        assert!(!cache.needs_fetch(0, now));
        cache.put(0, rows(0, 10), Some(25), now);
        assert!(!cache.needs_fetch(0, now));
        cache.mark_error(0);
        assert!(cache.needs_fetch(0, now));
        // Block 3 starts at row 30, past the end
        assert!(!cache.needs_fetch(3, now));
    }

    #[test]
    fn test_revalidation_keeps_rows() {
        let now = Instant::now();
        let mut cache = BlockCache::new(10, 4, None);
        cache.put(0, rows(0, 10), None, now);
        cache.mark_loading(0, 1, now);
        assert_eq!(cache.row(3), Some(&3));
        assert!(cache.get(0).is_some_and(|b| b.is_loading()));
    }

    #[test]
    fn test_truncates_oversized_block() {
        let now = Instant::now();
        let mut cache = BlockCache::new(10, 4, None);
        cache.put(0, (0..25).collect::<Vec<usize>>(), None, now);
        assert_eq!(cache.get(0).map(|b| b.rows().len()), Some(10));
        assert_eq!(cache.row(12), None);
    }

    #[test]
    fn test_rows_past_total_are_gaps() {
        let now = Instant::now();
        let mut cache = BlockCache::new(10, 4, None);
        cache.put(0, rows(0, 10), None, now);
        cache.set_total_rows(Some(5));
        assert_eq!(cache.row(4), Some(&4));
        assert_eq!(cache.row(5), None);
        assert_eq!(cache.get(0).map(|b| b.end_row), Some(5));
    }

    #[test]
    fn test_clear() {
        let now = Instant::now();
        let mut cache = BlockCache::new(10, 4, None);
        cache.put(0, rows(0, 10), Some(10), now);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.total_rows(), None);
    }
}

//! Block - Unit of Fetch, Cache and Eviction

use tokio::time::Instant;

/// Block lifecycle status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BlockStatus {
    /// Known but not requested
    #[default]
    Idle,
    /// Queued or in flight
    Loading,
    /// Rows available
    Loaded,
    /// Last fetch failed
    Error,
}

/// A fixed-size slice of consecutive rows plus lifecycle metadata
#[derive(Debug, Clone)]
pub struct Block<R> {
    /// `row / block_size`
    pub index: usize,
    /// First row (inclusive)
    pub start_row: usize,
    /// Last row (exclusive), clipped to the total when known
    pub end_row: usize,
    /// Current status
    pub status: BlockStatus,
    /// Last read or load completion
    pub last_access: Instant,
    /// Model epoch of the most recent fetch
    pub request_epoch: u64,
    /// Loaded rows; kept while a stale block is revalidated
    rows: Vec<R>,
}

impl<R> Block<R> {
    /// Create an idle block covering `index`
    pub fn new(index: usize, block_size: usize, total_rows: Option<usize>, now: Instant) -> Self {
        let (start_row, end_row) = Self::bounds(index, block_size, total_rows);
        Self {
            index,
            start_row,
            end_row,
            status: BlockStatus::Idle,
            last_access: now,
            request_epoch: 0,
            rows: Vec::new(),
        }
    }

    /// Row bounds of block `index`
    pub fn bounds(index: usize, block_size: usize, total_rows: Option<usize>) -> (usize, usize) {
        let start = index.saturating_mul(block_size);
        let end = start.saturating_add(block_size);
        match total_rows {
            Some(total) => (start, end.min(total).max(start)),
            None => (start, end),
        }
    }

    /// Row at an absolute index, if this block holds it
    pub fn row(&self, row_index: usize) -> Option<&R> {
        row_index
            .checked_sub(self.start_row)
            .and_then(|offset| self.rows.get(offset))
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn has_rows(&self) -> bool {
        !self.rows.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.status == BlockStatus::Loading
    }

    pub fn is_loaded(&self) -> bool {
        self.status == BlockStatus::Loaded
    }

    /// Store fetched rows
    pub(crate) fn fill(&mut self, rows: Vec<R>, now: Instant) {
        self.rows = rows;
        self.status = BlockStatus::Loaded;
        self.last_access = now;
    }

    /// Failed fetches read as gaps
    pub(crate) fn fail(&mut self) {
        self.rows.clear();
        self.status = BlockStatus::Error;
    }

    pub(crate) fn rebound(&mut self, block_size: usize, total_rows: Option<usize>) {
        (self.start_row, self.end_row) = Self::bounds(self.index, block_size, total_rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert_eq!(Block::<u32>::bounds(0, 100, None), (0, 100));
        assert_eq!(Block::<u32>::bounds(3, 100, Some(350)), (300, 350));
        assert_eq!(Block::<u32>::bounds(5, 100, Some(350)), (500, 500));
    }

    #[test]
    fn test_bounds_saturate_at_usize_max() {
        let last = usize::MAX / 100;
        let (start, end) = Block::<u32>::bounds(last, 100, None);
        assert_eq!(start, last * 100);
        assert_eq!(end, usize::MAX);
        assert_eq!(Block::<u32>::bounds(usize::MAX, 100, None), (usize::MAX, usize::MAX));
    }

    #[test]
    fn test_row_lookup() {
        let now = Instant::now();
        let mut block = Block::new(2, 10, None, now);
        assert!(block.row(20).is_none());

        block.fill((20..30).collect::<Vec<u32>>(), now);
        assert_eq!(block.row(20), Some(&20));
        assert_eq!(block.row(29), Some(&29));
        assert!(block.row(19).is_none());
        assert!(block.row(30).is_none());
        assert!(block.is_loaded());
    }

    #[test]
    fn test_fail_drops_rows() {
        let now = Instant::now();
        let mut block = Block::new(0, 10, None, now);
        block.fill(vec![1, 2, 3], now);
        block.fail();
        assert_eq!(block.status, BlockStatus::Error);
        assert!(!block.has_rows());
    }
}

//! PagedDataProvider Trait
//!
//! The seam a data table renders through when rows are loaded lazily.

use crate::state::RowSource;
use std::ops::Range;

/// Paged data provider for lazy loading
pub trait PagedDataProvider: Send + Sync + 'static {
    type Row: Clone + Send + Sync + 'static;

    /// Get the total number of rows (0 while unknown)
    fn len(&self) -> usize;

    /// Check if empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get a cached row by index (returns None if not yet loaded)
    fn cached_row(&self, index: usize) -> Option<Self::Row>;

    /// Request a range of rows to be loaded
    fn request_range(&self, range: Range<usize>);

    /// Check if a range is loaded
    fn is_range_loaded(&self, range: Range<usize>) -> bool;
}

impl<R: Clone + Send + Sync + 'static> PagedDataProvider for RowSource<R> {
    type Row = R;

    fn len(&self) -> usize {
        self.get_total_rows().ok().flatten().unwrap_or(0)
    }

    fn cached_row(&self, index: usize) -> Option<R> {
        self.peek_row(index).ok().flatten()
    }

    fn request_range(&self, range: Range<usize>) {
        if let Err(e) = self.get_rows_in_range(range.start, range.end) {
            tracing::warn!("Range {:?} not requested: {}", range, e);
        }
    }

    fn is_range_loaded(&self, range: Range<usize>) -> bool {
        RowSource::is_range_loaded(self, range).unwrap_or(false)
    }
}

//! Scroll Window
//!
//! Turns a scroll position into the row range to request: the visible rows
//! plus a prefetch margin on both sides, clipped to the known total. The
//! range follows the viewport and never accumulates; bounded memory comes
//! from the block cache.

use std::ops::Range;

/// Visible rows plus prefetch margin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollWindow {
    /// First visible row
    pub top: usize,
    /// Rows that fit in the viewport
    pub visible_rows: usize,
    /// Extra rows fetched above and below
    pub prefetch_rows: usize,
}

impl ScrollWindow {
    pub fn new(visible_rows: usize, prefetch_rows: usize) -> Self {
        Self {
            top: 0,
            visible_rows,
            prefetch_rows,
        }
    }

    /// Move the viewport, clamping to the last full page when the total is known
    pub fn scroll_to(&mut self, top: usize, total_rows: Option<usize>) {
        self.top = match total_rows {
            Some(total) => top.min(total.saturating_sub(self.visible_rows)),
            None => top,
        };
    }

    /// Rows currently on screen
    pub fn visible_range(&self, total_rows: Option<usize>) -> Range<usize> {
        self.clip(self.top, self.top.saturating_add(self.visible_rows), total_rows)
    }

    /// Rows to request from the data source
    pub fn fetch_range(&self, total_rows: Option<usize>) -> Range<usize> {
        let start = self.top.saturating_sub(self.prefetch_rows);
        let end = self
            .top
            .saturating_add(self.visible_rows)
            .saturating_add(self.prefetch_rows);
        self.clip(start, end, total_rows)
    }

    fn clip(&self, start: usize, end: usize, total_rows: Option<usize>) -> Range<usize> {
        match total_rows {
            Some(total) => start.min(total)..end.min(total),
            None => start..end,
        }
    }
}

//! Data Source Constants
//!
//! Centralized defaults for block caching and the demo viewport.

/// Rows per block
pub const DEFAULT_BLOCK_SIZE: usize = 100;

/// Provider calls allowed in flight at once
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;

/// Resident block cap
pub const DEFAULT_CACHE_BLOCK_COUNT: usize = 50;

/// Idle time after which a loaded block is revalidated
pub const DEFAULT_CACHE_TIMEOUT_MS: u64 = 300_000;

/// Demo dataset size
pub const DEMO_ROW_COUNT: usize = 200_000;

/// Demo viewport height in rows
pub const DEMO_VIEWPORT_ROWS: usize = 40;

/// Rows fetched above and below the demo viewport
pub const DEMO_PREFETCH_ROWS: usize = 120;

/// Simulated provider latency for the demo
pub const DEMO_FETCH_LATENCY_MS: u64 = 15;

/// How long the demo waits for a window to settle
pub const DEMO_SETTLE_TIMEOUT_MS: u64 = 2_000;

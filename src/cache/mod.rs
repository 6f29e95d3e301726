//! Block Cache
//!
//! Resident storage for fetched row blocks.

mod block_cache;

pub use block_cache::*;

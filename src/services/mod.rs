//! Service Layer
//!
//! Request coordination, the provider seam, observer broadcast and the tokio
//! bridge that runs block fetches.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        RowSource                             │
//! │  ┌──────────────┐  ┌─────────────────────┐  ┌────────────┐  │
//! │  │  BlockCache  │  │ RequestCoordinator  │  │ModelEpoch  │  │
//! │  │ (LRU, stale) │  │ (dedup, bounded)    │  │ (discard)  │  │
//! │  └──────────────┘  └─────────────────────┘  └────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!            │ RowRequest                     ▲ SourceEvent
//!            ▼                                │
//!   RowFetcher (tokio task)              ObserverHub → UI re-read
//! ```

mod coordinator;
mod fetcher;
mod observer;
mod runtime;

pub use coordinator::*;
pub use fetcher::*;
pub use observer::*;
pub use runtime::*;

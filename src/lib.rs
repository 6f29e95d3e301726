//! DFC Grid Source Library
//!
//! Windowed, server-backed row data for the DFC data tables. Datasets far too
//! large to hold in memory are fetched lazily in fixed-size blocks from a
//! remote provider, cached locally, and served for arbitrary row ranges as the
//! viewport scrolls.
//!
//! ```ignore
//! let source = RowSource::builder(SourceConfig::default())
//!     .fetcher(VecFetcher::new(rows))
//!     .build()?;
//! let _sub = source.subscribe(|event| tracing::debug!("{:?}", event))?;
//! let window = source.get_rows_in_range(0, 140)?; // gaps until blocks land
//! ```

pub mod cache;
pub mod constants;
pub mod domain;
pub mod error;
pub mod services;
pub mod state;
pub mod table;

pub use domain::{
    Block, BlockStatus, FilterModel, RowRequest, RowResponse, SortColumn, SortDirection,
    SortModel, SourceConfig,
};
pub use error::{Error, Result};
pub use services::{RowFetcher, SourceEvent, Subscription, VecFetcher};
pub use state::{CacheStats, RowSource, RowSourceBuilder, WeakRowSource};
pub use table::{PagedDataProvider, ScrollWindow};

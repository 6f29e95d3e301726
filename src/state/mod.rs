//! State - Row Source and Model Epoch
//!
//! The row source owns every piece of mutable state behind a single lock:
//! the block cache, the request queue and the model epoch.

pub mod epoch;
pub mod row_source;

pub use epoch::ModelEpoch;
pub use row_source::{CacheStats, RowSource, RowSourceBuilder, WeakRowSource};

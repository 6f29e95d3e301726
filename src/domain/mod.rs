//! Domain - Pure Data Structures and Protocol Types
//!
//! These types don't depend on the runtime and represent the data source domain.

pub mod block;
pub mod config;
pub mod request;

pub use block::{Block, BlockStatus};
pub use config::SourceConfig;
pub use request::{
    FilterModel, RowRequest, RowResponse, SortColumn, SortDirection, SortModel,
};

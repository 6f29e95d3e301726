//! Table Integration
//!
//! What a virtualized data table needs from a row source: the paged provider
//! seam and the scroll-to-range policy.

pub mod data_provider;
pub mod window;

pub use data_provider::PagedDataProvider;
pub use window::ScrollWindow;

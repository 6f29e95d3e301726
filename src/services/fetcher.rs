//! Row Fetcher
//!
//! The only collaborator a row source needs: an asynchronous call that returns
//! one block of rows. Transport is up to the implementor (HTTP, RPC, in-process).

use crate::domain::{RowRequest, RowResponse};
use crate::error::Result;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Provider of row blocks
pub trait RowFetcher<R>: Send + Sync + 'static {
    /// Fetch rows `[request.start_row, request.end_row)` under the request's
    /// sort/filter criteria
    fn get_rows(&self, request: RowRequest) -> BoxFuture<'static, Result<RowResponse<R>>>;
}

impl<R, F, Fut> RowFetcher<R> for F
where
    F: Fn(RowRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<RowResponse<R>>> + Send + 'static,
{
    fn get_rows(&self, request: RowRequest) -> BoxFuture<'static, Result<RowResponse<R>>> {
        (self)(request).boxed()
    }
}

/// In-process provider over a fixed row set
///
/// Criteria are not interpreted: rows come back in stored order.
pub struct VecFetcher<R> {
    rows: Arc<Vec<R>>,
    latency: Option<Duration>,
}

impl<R: Clone + Send + Sync + 'static> VecFetcher<R> {
    /// Create a new VecFetcher
    pub fn new(rows: Vec<R>) -> Self {
        Self {
            rows: Arc::new(rows),
            latency: None,
        }
    }

    /// Create from a shared reference
    pub fn from_arc(rows: Arc<Vec<R>>) -> Self {
        Self {
            rows,
            latency: None,
        }
    }

    /// Delay every response, simulating a remote provider
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<R: Clone + Send + Sync + 'static> RowFetcher<R> for VecFetcher<R> {
    fn get_rows(&self, request: RowRequest) -> BoxFuture<'static, Result<RowResponse<R>>> {
        let rows = self.rows.clone();
        let latency = self.latency;

        async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            let total = rows.len();
            let start = request.start_row.min(total);
            let end = request.end_row.min(total).max(start);
            Ok(RowResponse::new(rows[start..end].to_vec()).with_total_rows(total))
        }
        .boxed()
    }
}

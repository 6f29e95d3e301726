//! Tokio Runtime Bridge
//!
//! Block fetches are spawned onto a tokio runtime. A host that already runs
//! tokio passes its handle (or is picked up as the ambient runtime); hosts
//! with another executor, like GPUI, fall back to a lazily created global
//! runtime.
//!
//! ## Pattern
//!
//! ```text
//! UI thread: get_rows_in_range()
//!       │
//!       ▼
//! fetch_handle().spawn(fetch)
//!       │
//!       ▼
//! completion re-enters the row source, observers notified
//! ```

use std::future::Future;
use std::sync::OnceLock;
use tokio::runtime::{Handle, Runtime};

/// Global tokio runtime instance
static TOKIO_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Get or initialize the global tokio runtime
fn get_runtime() -> &'static Runtime {
    TOKIO_RUNTIME.get_or_init(|| Runtime::new().expect("Failed to create tokio runtime"))
}

/// Handle used for block fetches when none is configured: the ambient
/// runtime if called from inside one, otherwise the global runtime
pub fn fetch_handle() -> Handle {
    Handle::try_current().unwrap_or_else(|_| runtime_handle())
}

/// Get a handle to the global tokio runtime
pub fn runtime_handle() -> Handle {
    get_runtime().handle().clone()
}

/// Block on a future synchronously (use sparingly, mainly for demos and startup)
///
/// **Warning**: This blocks the current thread and must not be called from
/// inside a runtime.
pub fn block_on<F, T>(future: F) -> T
where
    F: Future<Output = T>,
{
    get_runtime().block_on(future)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_fetch_handle_outside_runtime() {
        let flag = Arc::new(AtomicBool::new(false));
        let flag_clone = flag.clone();

        let task = fetch_handle().spawn(async move {
            flag_clone.store(true, Ordering::SeqCst);
        });

        block_on(task).expect("task");
        assert!(flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_fetch_handle_uses_ambient_runtime() {
        // A current-thread test runtime only makes progress on spawned tasks
        // if they land on it
        let value = fetch_handle().spawn(async { 7 }).await.expect("task");
        assert_eq!(value, 7);
    }
}

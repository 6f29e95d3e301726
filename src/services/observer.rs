//! Observer Hub
//!
//! Broadcasts data source events to registered listeners. Listeners run
//! synchronously in registration order over a snapshot of the listener list,
//! so a listener may subscribe or unsubscribe while being notified. A panicking
//! listener is logged and does not stop the others.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Events emitted after cache mutations
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceEvent {
    /// A block's rows are now readable
    BlockLoaded { index: usize },

    /// A block fetch failed; the block reads as a gap until re-requested
    BlockFailed { index: usize, message: Arc<str> },

    /// The total row count was learned or changed
    TotalRowsChanged { total: Option<usize> },

    /// Sort/filter/group criteria changed or a refresh was requested;
    /// every block was dropped
    Invalidated { epoch: u64 },

    /// A single block was purged
    BlockPurged { index: usize },
}

type Listener = Arc<dyn Fn(&SourceEvent) + Send + Sync>;
type ListenerList = Mutex<Vec<(u64, Listener)>>;

/// Publish/subscribe broadcast for [`SourceEvent`]s
pub struct ObserverHub {
    listeners: Arc<ListenerList>,
    next_id: AtomicU64,
}

impl ObserverHub {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a listener; it stays registered while the returned
    /// subscription is alive
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SourceEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let listener: Listener = Arc::new(listener);
        self.lock().push((id, listener));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
            detached: false,
        }
    }

    /// Invoke every listener with `event`
    pub fn notify(&self, event: &SourceEvent) {
        let snapshot: Vec<Listener> = self.lock().iter().map(|(_, l)| l.clone()).collect();
        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::error!("Listener panicked while handling {:?}", event);
            }
        }
    }

    /// Notify each event in order
    pub fn notify_all(&self, events: &[SourceEvent]) {
        for event in events {
            self.notify(event);
        }
    }

    /// Drop every listener
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(u64, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ObserverHub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ObserverHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverHub")
            .field("listeners", &self.len())
            .finish()
    }
}

/// Handle to a registered listener.
///
/// Dropping it unsubscribes; call [`Subscription::detach`] to keep the
/// listener for the lifetime of the hub.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    listeners: Weak<ListenerList>,
    detached: bool,
}

impl Subscription {
    /// Remove the listener now
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Keep the listener registered without holding the handle
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        if let Some(listeners) = self.listeners.upgrade() {
            listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("detached", &self.detached)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type BoxedListener = Box<dyn Fn(&SourceEvent) + Send + Sync>;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> BoxedListener) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let make = move |name: &str| -> BoxedListener {
            let log = log_clone.clone();
            let name = name.to_string();
            Box::new(move |_event: &SourceEvent| {
                log.lock().expect("log").push(name.clone());
            })
        };
        (log, make)
    }

    #[test]
    fn test_notify_in_registration_order() {
        let hub = ObserverHub::new();
        let (log, make) = recorder();
        let a = hub.subscribe(make("a"));
        let b = hub.subscribe(make("b"));
        let c = hub.subscribe(make("c"));

        hub.notify(&SourceEvent::BlockLoaded { index: 0 });
        assert_eq!(*log.lock().expect("log"), vec!["a", "b", "c"]);
        drop((a, b, c));
    }

    #[test]
    fn test_panicking_listener_does_not_stop_others() {
        let hub = ObserverHub::new();
        let (log, make) = recorder();
        let _first = hub.subscribe(|_event: &SourceEvent| panic!("listener failure"));
        let _second = hub.subscribe(make("second"));

        hub.notify(&SourceEvent::Invalidated { epoch: 1 });
        assert_eq!(*log.lock().expect("log"), vec!["second"]);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let hub = ObserverHub::new();
        let (log, make) = recorder();
        let sub = hub.subscribe(make("a"));
        assert_eq!(hub.len(), 1);

        sub.unsubscribe();
        assert!(hub.is_empty());
        hub.notify(&SourceEvent::BlockPurged { index: 2 });
        assert!(log.lock().expect("log").is_empty());
    }

    #[test]
    fn test_detach_keeps_listener() {
        let hub = ObserverHub::new();
        let (log, make) = recorder();
        hub.subscribe(make("a")).detach();

        hub.notify(&SourceEvent::BlockLoaded { index: 1 });
        assert_eq!(log.lock().expect("log").len(), 1);
    }

    #[test]
    fn test_unsubscribe_during_notify() {
        let hub = ObserverHub::new();
        let (log, make) = recorder();
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let victim_clone = victim.clone();
        let _killer = hub.subscribe(move |_event: &SourceEvent| {
            victim_clone.lock().expect("victim").take();
        });
        *victim.lock().expect("victim") = Some(hub.subscribe(make("victim")));

        // The snapshot still includes the victim for this round
        hub.notify(&SourceEvent::BlockLoaded { index: 0 });
        assert_eq!(log.lock().expect("log").len(), 1);

        hub.notify(&SourceEvent::BlockLoaded { index: 1 });
        assert_eq!(log.lock().expect("log").len(), 1);
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn test_clear() {
        let hub = ObserverHub::new();
        let (log, make) = recorder();
        let _sub = hub.subscribe(make("a"));
        hub.clear();
        hub.notify(&SourceEvent::BlockLoaded { index: 0 });
        assert!(log.lock().expect("log").is_empty());
    }
}

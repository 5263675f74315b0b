//! Subscriber registry and fan-out.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard, RwLock};

use beacon_core::LoadingTransition;

pub(crate) type Callback = Arc<dyn Fn(&LoadingTransition) + Send + Sync + 'static>;

/// Identifier handed out to each registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registered callbacks plus the lock that serializes deliveries.
///
/// `delivery` is held for the whole of a fan-out, by `reset()`, and by
/// `unsubscribe()`. It is reentrant so a callback may reset or unsubscribe
/// from inside a notification on the same thread.
pub(crate) struct SubscriberRegistry {
    next_id: AtomicU64,
    callbacks: RwLock<BTreeMap<SubscriberId, Callback>>,
    delivery: ReentrantMutex<()>,
}

impl SubscriberRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            callbacks: RwLock::new(BTreeMap::new()),
            delivery: ReentrantMutex::new(()),
        }
    }

    pub(crate) fn serialize(&self) -> ReentrantMutexGuard<'_, ()> {
        self.delivery.lock()
    }

    pub(crate) fn insert(&self, callback: Callback) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks.write().insert(id, callback);
        id
    }

    fn remove(&self, id: SubscriberId) -> bool {
        let _serial = self.serialize();
        self.callbacks.write().remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Invoke every registered callback with `transition`.
    ///
    /// Callers must hold the delivery lock. A panicking callback is logged
    /// and skipped; the rest are still called. Returns how many callbacks
    /// completed normally.
    pub(crate) fn notify(&self, transition: &LoadingTransition) -> usize {
        let snapshot: Vec<(SubscriberId, Callback)> = self
            .callbacks
            .read()
            .iter()
            .map(|(id, cb)| (*id, cb.clone()))
            .collect();

        let mut delivered = 0;
        for (id, callback) in snapshot {
            // An earlier callback may have unsubscribed this one.
            if !self.callbacks.read().contains_key(&id) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| callback(transition))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    tracing::error!(
                        subscriber = %id,
                        state = %transition.state,
                        panic = %panic_message(payload.as_ref()),
                        "Loading subscriber panicked"
                    );
                }
            }
        }
        delivered
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Handle returned by `subscribe`. Dropping it keeps the callback registered;
/// call [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    registry: Weak<SubscriberRegistry>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriberId, registry: &Arc<SubscriberRegistry>) -> Self {
        Self {
            id,
            registry: Arc::downgrade(registry),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove the callback. Once this returns the callback is never invoked
    /// again; a delivery already running on another thread is waited for.
    ///
    /// Returns `false` if the manager is gone or the id was already removed.
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.id),
            None => false,
        }
    }
}

//! The loading-state aggregator.
//!
//! A counter of in-flight operations guarded by one mutex, a dispatcher task
//! that drains a notification queue, and two cancellable timers:
//!
//! - the *busy* timer, only used when a busy delay is configured, defers the
//!   "loading" notification of a cycle;
//! - the *idle* timer holds back the "idle" notification until the counter
//!   has stayed at zero for the debounce window.
//!
//! Every notification carries the reset epoch and the cycle it belongs to.
//! Stale ones are dropped at delivery, so what subscribers see always
//! reflects the counter when the notification fires, not when it was queued.

use std::future::Future;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use beacon_core::{LoadingState, LoadingTransition};

use crate::error::{LoadingError, Result};
use crate::guard::LoadingGuard;
use crate::subscription::{SubscriberRegistry, Subscription};
use crate::LoadingConfig;

#[derive(Debug, Clone, Copy)]
struct Notice {
    state: LoadingState,
    epoch: u64,
    cycle: u64,
}

#[derive(Default)]
struct Counter {
    active: usize,
    /// Bumped on every 0 -> 1 transition and on reset.
    cycle: u64,
    /// Bumped on reset.
    epoch: u64,
    /// Last state handed to subscribers.
    delivered: LoadingState,
    idle_timer: Option<JoinHandle<()>>,
    busy_timer: Option<JoinHandle<()>>,
}

impl Counter {
    fn cancel_idle_timer(&mut self) -> bool {
        match self.idle_timer.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    fn cancel_busy_timer(&mut self) {
        if let Some(handle) = self.busy_timer.take() {
            handle.abort();
        }
    }

    fn notice(&self, state: LoadingState) -> Notice {
        Notice {
            state,
            epoch: self.epoch,
            cycle: self.cycle,
        }
    }
}

struct Shared {
    config: LoadingConfig,
    counter: Mutex<Counter>,
    subscribers: Arc<SubscriberRegistry>,
    queue: mpsc::UnboundedSender<Notice>,
    watch_tx: watch::Sender<bool>,
    runtime: Handle,
}

impl Shared {
    fn enqueue(&self, notice: Notice) {
        if self.queue.send(notice).is_err() {
            tracing::debug!(state = %notice.state, "Notification queue closed, dropping notice");
        }
    }

    fn fire_busy(&self, notice: Notice) {
        let mut counter = self.counter.lock();
        if counter.epoch != notice.epoch || counter.cycle != notice.cycle {
            return;
        }
        counter.busy_timer = None;
        if counter.active == 0 {
            tracing::trace!(cycle = notice.cycle, "Operations settled within busy delay");
            return;
        }
        self.enqueue(notice);
    }

    fn fire_idle(&self, notice: Notice) {
        let mut counter = self.counter.lock();
        if counter.epoch != notice.epoch || counter.cycle != notice.cycle || counter.active > 0 {
            return;
        }
        counter.idle_timer = None;
        self.enqueue(notice);
    }

    /// Deliver a queued notice if it is still current and changes the
    /// delivered state.
    fn deliver(&self, notice: Notice) {
        let _serial = self.subscribers.serialize();
        let active = {
            let mut counter = self.counter.lock();
            if counter.epoch != notice.epoch {
                tracing::trace!(state = %notice.state, "Dropping notice queued before reset");
                return;
            }
            if notice.state == LoadingState::Idle
                && (counter.active > 0 || counter.cycle != notice.cycle)
            {
                return;
            }
            if counter.delivered == notice.state {
                return;
            }
            counter.delivered = notice.state;
            counter.active
        };
        self.publish(notice.state, active);
    }

    /// Fan a transition out to the watch channel and every subscriber.
    /// Callers hold the delivery lock.
    fn publish(&self, state: LoadingState, active: usize) {
        let transition = LoadingTransition::new(state, active);
        self.watch_tx.send_replace(state.is_loading());
        let delivered = self.subscribers.notify(&transition);
        tracing::debug!(
            transition_id = %transition.id,
            state = %state,
            active_operations = active,
            subscribers = delivered,
            "Loading state delivered"
        );
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let counter = self.counter.get_mut();
        counter.cancel_idle_timer();
        counter.cancel_busy_timer();
    }
}

/// Aggregates concurrent operations into a single debounced loading signal.
///
/// Clone is cheap (inner Arc); every clone drives the same counter. Create
/// one per application (or per test) and hand clones to the request layer
/// and the UI layer.
#[derive(Clone)]
pub struct LoadingManager {
    shared: Arc<Shared>,
}

impl LoadingManager {
    /// Create a manager and spawn its notification dispatcher on the current
    /// tokio runtime.
    pub fn new(config: LoadingConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| LoadingError::NoRuntime)?;
        let (queue, rx) = mpsc::unbounded_channel();
        let (watch_tx, _) = watch::channel(false);

        let shared = Arc::new(Shared {
            config,
            counter: Mutex::new(Counter::default()),
            subscribers: Arc::new(SubscriberRegistry::new()),
            queue,
            watch_tx,
            runtime: runtime.clone(),
        });

        runtime.spawn(dispatch(Arc::downgrade(&shared), rx));

        tracing::debug!(
            idle_debounce_ms = config.idle_debounce.as_millis(),
            busy_delay_ms = config.busy_delay.as_millis(),
            "Loading manager started"
        );

        Ok(Self { shared })
    }

    pub fn config(&self) -> LoadingConfig {
        self.shared.config
    }

    /// Record the start of an operation.
    ///
    /// Cancels a pending idle notification. On the 0 -> 1 transition a
    /// "loading" notification is queued for the dispatcher; it is never
    /// delivered from inside this call.
    pub fn start_loading(&self) {
        let shared = &self.shared;
        let mut counter = shared.counter.lock();

        if counter.cancel_idle_timer() {
            tracing::trace!(cycle = counter.cycle, "Pending idle notification cancelled");
        }

        counter.active += 1;
        tracing::trace!(active = counter.active, "Operation started");

        if counter.active != 1 {
            return;
        }

        counter.cycle += 1;
        let notice = counter.notice(LoadingState::Loading);

        if shared.config.busy_delay.is_zero() {
            shared.enqueue(notice);
            return;
        }

        counter.cancel_busy_timer();
        let deadline = Instant::now() + shared.config.busy_delay;
        let weak = Arc::downgrade(shared);
        counter.busy_timer = Some(shared.runtime.spawn(async move {
            sleep_until(deadline).await;
            if let Some(shared) = weak.upgrade() {
                shared.fire_busy(notice);
            }
        }));
    }

    /// Record the end of an operation, successful or not.
    ///
    /// The counter never goes below zero. When it reaches zero the idle
    /// debounce timer is armed; "idle" is delivered only if nothing starts
    /// before it fires.
    pub fn stop_loading(&self) {
        let shared = &self.shared;
        let mut counter = shared.counter.lock();

        if counter.active == 0 {
            tracing::debug!("stop_loading called with no active operations");
            return;
        }

        counter.active -= 1;
        tracing::trace!(active = counter.active, "Operation finished");

        if counter.active > 0 {
            return;
        }

        counter.cancel_idle_timer();
        let notice = counter.notice(LoadingState::Idle);
        let deadline = Instant::now() + shared.config.idle_debounce;
        let weak = Arc::downgrade(shared);
        counter.idle_timer = Some(shared.runtime.spawn(async move {
            sleep_until(deadline).await;
            if let Some(shared) = weak.upgrade() {
                shared.fire_idle(notice);
            }
        }));
    }

    /// Register a callback invoked with `true`/`false` on every delivered
    /// transition.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.subscribe_transitions(move |transition: &LoadingTransition| {
            callback(transition.state.is_loading());
        })
    }

    /// Register a callback that receives the full transition event.
    pub fn subscribe_transitions<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&LoadingTransition) + Send + Sync + 'static,
    {
        let registry = &self.shared.subscribers;
        let id = registry.insert(Arc::new(callback));
        tracing::trace!(subscriber = %id, "Loading subscriber registered");
        Subscription::new(id, registry)
    }

    /// A watch receiver that mirrors every delivered transition.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.shared.watch_tx.subscribe()
    }

    /// Whether any operation is in flight right now.
    pub fn is_loading(&self) -> bool {
        self.shared.counter.lock().active > 0
    }

    pub fn active_operations(&self) -> usize {
        self.shared.counter.lock().active
    }

    /// The last state delivered to subscribers.
    pub fn state(&self) -> LoadingState {
        self.shared.counter.lock().delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.len()
    }

    /// Force the counter to zero, cancel pending timers and queued
    /// notifications, and notify "idle" synchronously.
    pub fn reset(&self) {
        let shared = &self.shared;
        let _serial = shared.subscribers.serialize();
        {
            let mut counter = shared.counter.lock();
            counter.cancel_idle_timer();
            counter.cancel_busy_timer();
            let dropped = counter.active;
            counter.active = 0;
            counter.epoch += 1;
            counter.cycle += 1;
            counter.delivered = LoadingState::Idle;
            tracing::debug!(
                dropped_operations = dropped,
                epoch = counter.epoch,
                "Loading state reset"
            );
        }
        shared.publish(LoadingState::Idle, 0);
    }

    /// Start an operation that stops when the returned guard is dropped.
    pub fn track(&self) -> LoadingGuard {
        LoadingGuard::new(self.clone())
    }

    /// Run `fut` as a tracked operation. The operation starts on first poll
    /// and stops when the future completes or is dropped.
    pub async fn track_future<F>(&self, fut: F) -> F::Output
    where
        F: Future,
    {
        let _guard = self.track();
        fut.await
    }
}

impl std::fmt::Debug for LoadingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counter = self.shared.counter.lock();
        f.debug_struct("LoadingManager")
            .field("config", &self.shared.config)
            .field("active", &counter.active)
            .field("delivered", &counter.delivered)
            .finish_non_exhaustive()
    }
}

async fn dispatch(weak: Weak<Shared>, mut rx: mpsc::UnboundedReceiver<Notice>) {
    while let Some(notice) = rx.recv().await {
        let Some(shared) = weak.upgrade() else {
            break;
        };
        shared.deliver(notice);
    }
    tracing::trace!("Loading dispatcher stopped");
}

//! Behavioural tests for the loading-state aggregator.
//!
//! All tests run on a paused tokio clock so debounce windows are exact.

use std::sync::Arc;
use std::time::Duration;

use beacon_loading::{LoadingConfig, LoadingManager, Subscription};
use parking_lot::Mutex;

type Events = Arc<Mutex<Vec<bool>>>;

fn manager() -> LoadingManager {
    LoadingManager::new(LoadingConfig::default()).unwrap()
}

fn record(manager: &LoadingManager) -> (Subscription, Events) {
    let events: Events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let sub = manager.subscribe(move |loading| sink.lock().push(loading));
    (sub, events)
}

/// Let the dispatcher drain queued notifications without moving the clock.
async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

async fn advance_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn is_loading_tracks_clamped_counter() {
    let manager = manager();
    // 1 = start, 0 = stop
    let script = [1, 0, 0, 1, 1, 0, 1, 0, 0, 0, 1, 1, 1, 0];
    let mut model: usize = 0;

    for step in script {
        if step == 1 {
            manager.start_loading();
            model += 1;
        } else {
            manager.stop_loading();
            model = model.saturating_sub(1);
        }
        assert_eq!(manager.is_loading(), model > 0);
        assert_eq!(manager.active_operations(), model);
    }
}

#[tokio::test(start_paused = true)]
async fn single_operation_notifies_idle_after_debounce() {
    let manager = manager();
    let (_sub, events) = record(&manager);

    manager.start_loading();
    manager.stop_loading();
    settle().await;
    assert_eq!(*events.lock(), vec![true]);

    advance_ms(199).await;
    assert_eq!(*events.lock(), vec![true]);

    advance_ms(2).await;
    assert_eq!(*events.lock(), vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn overlapping_operations_notify_once_each_way() {
    let manager = manager();
    let (_sub, events) = record(&manager);

    manager.start_loading();
    manager.start_loading();
    manager.stop_loading();
    settle().await;

    assert!(manager.is_loading());
    advance_ms(1_000).await;
    assert_eq!(*events.lock(), vec![true]);

    manager.stop_loading();
    advance_ms(150).await;
    assert_eq!(*events.lock(), vec![true]);

    advance_ms(100).await;
    assert_eq!(*events.lock(), vec![true, false]);

    advance_ms(1_000).await;
    assert_eq!(*events.lock(), vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn restart_within_debounce_cancels_idle() {
    let manager = manager();
    let (_sub, events) = record(&manager);

    manager.start_loading();
    manager.stop_loading();
    advance_ms(100).await;

    manager.start_loading();
    advance_ms(300).await;
    assert_eq!(*events.lock(), vec![true]);
    assert!(manager.is_loading());

    manager.stop_loading();
    advance_ms(199).await;
    assert_eq!(*events.lock(), vec![true]);

    advance_ms(2).await;
    assert_eq!(*events.lock(), vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn reset_notifies_idle_synchronously() {
    let manager = manager();
    let (_sub, events) = record(&manager);

    manager.start_loading();
    manager.start_loading();
    manager.start_loading();
    settle().await;
    assert_eq!(*events.lock(), vec![true]);

    manager.reset();
    assert_eq!(*events.lock(), vec![true, false]);
    assert!(!manager.is_loading());
    assert_eq!(manager.active_operations(), 0);

    advance_ms(1_000).await;
    assert_eq!(*events.lock(), vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn reset_discards_queued_notifications() {
    let manager = manager();
    let (_sub, events) = record(&manager);

    // Loading is queued but not yet delivered when reset runs.
    manager.start_loading();
    manager.reset();
    assert_eq!(*events.lock(), vec![false]);

    settle().await;
    advance_ms(1_000).await;
    assert_eq!(*events.lock(), vec![false]);
}

#[tokio::test(start_paused = true)]
async fn reset_cancels_pending_idle_timer() {
    let manager = manager();
    let (_sub, events) = record(&manager);

    manager.start_loading();
    settle().await;
    manager.stop_loading();
    advance_ms(50).await;

    manager.reset();
    advance_ms(1_000).await;
    assert_eq!(*events.lock(), vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn new_cycle_after_reset_behaves_normally() {
    let manager = manager();
    let (_sub, events) = record(&manager);

    manager.start_loading();
    manager.reset();
    manager.start_loading();
    settle().await;
    assert_eq!(*events.lock(), vec![false, true]);

    manager.stop_loading();
    advance_ms(201).await;
    assert_eq!(*events.lock(), vec![false, true, false]);
}

#[tokio::test(start_paused = true)]
async fn unsubscribed_callback_receives_nothing() {
    let manager = manager();
    let (kept_sub, kept) = record(&manager);
    let (gone_sub, gone) = record(&manager);
    assert_eq!(manager.subscriber_count(), 2);

    manager.start_loading();
    settle().await;
    assert!(gone_sub.unsubscribe());
    assert_eq!(manager.subscriber_count(), 1);

    manager.stop_loading();
    advance_ms(250).await;
    manager.start_loading();
    settle().await;
    manager.reset();

    assert_eq!(*kept.lock(), vec![true, false, true, false]);
    assert_eq!(*gone.lock(), vec![true]);
    drop(kept_sub);
}

#[tokio::test(start_paused = true)]
async fn panicking_subscriber_is_isolated() {
    let manager = manager();
    let _bad = manager.subscribe(|loading| {
        if loading {
            panic!("indicator widget crashed");
        }
    });
    let (_sub, events) = record(&manager);

    manager.start_loading();
    settle().await;
    manager.stop_loading();
    advance_ms(250).await;

    assert_eq!(*events.lock(), vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn example_scenario() {
    let manager = manager();
    let (_sub, events) = record(&manager);

    manager.start_loading();
    manager.start_loading();
    manager.stop_loading();
    assert!(manager.is_loading());
    settle().await;

    manager.stop_loading();
    assert!(!manager.is_loading());
    advance_ms(199).await;
    assert_eq!(*events.lock(), vec![true]);

    advance_ms(1).await;
    settle().await;
    assert_eq!(*events.lock(), vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn configurable_debounce() {
    let manager = LoadingManager::new(LoadingConfig {
        idle_debounce: Duration::from_millis(20),
        busy_delay: Duration::ZERO,
    })
    .unwrap();
    let (_sub, events) = record(&manager);

    manager.start_loading();
    manager.stop_loading();
    advance_ms(25).await;
    assert_eq!(*events.lock(), vec![true, false]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_operations_settle_to_idle() {
    let manager = LoadingManager::new(LoadingConfig {
        idle_debounce: Duration::from_millis(20),
        busy_delay: Duration::ZERO,
    })
    .unwrap();
    let (_sub, events) = record(&manager);
    let mut watch = manager.watch();

    let mut handles = Vec::new();
    for i in 0..32u64 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            manager
                .track_future(tokio::time::sleep(Duration::from_millis(i % 5)))
                .await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(manager.active_operations(), 0);
    tokio::time::timeout(Duration::from_secs(5), watch.wait_for(|loading| !*loading))
        .await
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let events = events.lock().clone();
    assert_eq!(events.last(), Some(&false));
    // Deliveries always alternate.
    assert!(events.windows(2).all(|pair| pair[0] != pair[1]));
}

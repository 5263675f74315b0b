//! Waiting for the manager to report idle before exiting.

use std::time::Duration;

use beacon_loading::LoadingManager;

/// Wait until the idle transition has been delivered, giving up after
/// `idle_debounce + grace`. Returns whether idle was observed.
pub async fn wait_for_idle(manager: &LoadingManager, grace: Duration) -> bool {
    let mut rx = manager.watch();
    let debounce = manager.config().idle_debounce;

    // A queued "loading" may not have been delivered yet; let the debounce
    // window pass before trusting the watch value.
    tokio::time::sleep(debounce).await;

    let observed = matches!(
        tokio::time::timeout(grace, rx.wait_for(|loading| !*loading)).await,
        Ok(Ok(_))
    );
    let idle = observed && !manager.is_loading();

    if !idle {
        tracing::warn!(
            active_operations = manager.active_operations(),
            "Gave up waiting for idle transition"
        );
    }
    idle
}

//! RAII tracking of a single operation.

use crate::manager::LoadingManager;

/// Counts as one in-flight operation from creation until it is dropped or
/// [`finish`](LoadingGuard::finish)ed, so the matching `stop_loading` happens
/// on every exit path: success, `?` early return, panic unwind, or a
/// cancelled future.
#[must_use = "dropping the guard immediately ends the tracked operation"]
#[derive(Debug)]
pub struct LoadingGuard {
    manager: LoadingManager,
    finished: bool,
}

impl LoadingGuard {
    pub(crate) fn new(manager: LoadingManager) -> Self {
        manager.start_loading();
        Self {
            manager,
            finished: false,
        }
    }

    /// End the operation now.
    pub fn finish(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.finished {
            self.finished = true;
            self.manager.stop_loading();
        }
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.release();
    }
}

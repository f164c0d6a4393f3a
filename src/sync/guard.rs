//! Reject-if-busy mutual exclusion.

use std::sync::atomic::{
    AtomicBool,
    Ordering,
};
use std::sync::{
    Mutex,
    MutexGuard,
    PoisonError,
};

use tokio_util::sync::CancellationToken;

/// Flag allowing at most one operation of a kind in flight.
///
/// A second caller is turned away instead of waiting: the engine treats a
/// busy guard as "someone is already doing this".
#[derive(Debug, Default)]
pub(crate) struct InFlightGuard {
    /// Set while a permit is alive.
    busy: AtomicBool,
}

impl InFlightGuard {
    /// An idle guard.
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self { busy: AtomicBool::new(false) }
    }

    /// `None` while another permit is alive.
    #[must_use]
    pub(crate) fn try_acquire(&self) -> Option<InFlightPermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightPermit { guard: self })
    }

    /// Whether a permit is currently held.
    #[must_use]
    pub(crate) fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the guard on drop, including on early return and cancellation.
#[derive(Debug)]
pub(crate) struct InFlightPermit<'a> {
    /// Guard to release.
    guard: &'a InFlightGuard,
}

impl Drop for InFlightPermit<'_> {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::Release);
    }
}

/// Slot for a single cancellable background task.
///
/// A claimed slot hands out a child of the session token, so tearing down the
/// session also stops the task. The slot frees itself once that token is
/// cancelled, whether by [`TaskSlot::stop`] or by the task finishing.
#[derive(Debug, Default)]
pub(crate) struct TaskSlot {
    /// Token of the last claimed task, cancelled or not.
    current: Mutex<Option<CancellationToken>>,
}

impl TaskSlot {
    /// Locks the slot, ignoring poisoning.
    fn lock(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `None` while a previously claimed task is still live.
    #[must_use]
    pub(crate) fn claim(&self, parent: &CancellationToken) -> Option<CancellationToken> {
        let mut current = self.lock();
        if current.as_ref().is_some_and(|token| !token.is_cancelled()) {
            return None;
        }
        let token = parent.child_token();
        *current = Some(token.clone());
        Some(token)
    }

    /// Cancels the live task, if any, and frees the slot.
    pub(crate) fn stop(&self) {
        if let Some(token) = self.lock().take() {
            token.cancel();
        }
    }

    /// Whether a claimed task is still live.
    #[must_use]
    pub(crate) fn is_active(&self) -> bool {
        self.lock().as_ref().is_some_and(|token| !token.is_cancelled())
    }
}

//! Minimum spacing between completed refreshes.

use std::sync::{
    Mutex,
    PoisonError,
};
use std::time::Duration;

use tokio::time::Instant;

/// Throttle window measured from the last *completed* refresh.
///
/// Failed refreshes do not arm the window, so a retry after an error is never
/// swallowed.
#[derive(Debug)]
pub(crate) struct Throttle {
    /// Minimum spacing.
    window: Duration,
    /// End of the last successful refresh.
    last_completed: Mutex<Option<Instant>>,
}

impl Throttle {
    /// A throttle that is open until the first completion.
    #[must_use]
    pub(crate) const fn new(window: Duration) -> Self {
        Self { window, last_completed: Mutex::new(None) }
    }

    /// Time left before a new refresh may run, `None` if it may run now.
    #[must_use]
    pub(crate) fn remaining(&self) -> Option<Duration> {
        let last = (*self.last_completed.lock().unwrap_or_else(PoisonError::into_inner))?;
        self.window.checked_sub(last.elapsed()).filter(|left| !left.is_zero())
    }

    /// Arms the window from now.
    pub(crate) fn mark_completed(&self) {
        *self.last_completed.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }
}

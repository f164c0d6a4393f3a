//! Activity polling while remote work is running.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::jobs::sleep_unless_cancelled;
use crate::remote::ProjectApi;
use crate::types::{
    ActivityItem,
    has_running_activity,
};

/// Why a poll loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollEnd {
    /// The last fetched list had nothing running.
    Idle,
    /// The session or the caller cancelled the token.
    Cancelled,
    /// The receiver refused the list, e.g. because the session changed.
    Rejected,
}

/// Re-fetches the activity list every `interval` until nothing is running.
///
/// Every fetched list is handed to `deliver`; returning `false` stops the
/// loop. Fetch errors are logged and retried on the next tick.
pub(crate) async fn poll_until_idle<F>(
    api: &dyn ProjectApi,
    page_size: u32,
    interval: Duration,
    cancel: &CancellationToken,
    mut deliver: F,
) -> PollEnd
where
    F: FnMut(Vec<ActivityItem>) -> bool + Send,
{
    loop {
        if !sleep_unless_cancelled(interval, cancel).await {
            return PollEnd::Cancelled;
        }

        let activity = match api.list_activity(0, page_size).await {
            Ok(activity) => activity,
            Err(error) => {
                tracing::warn!(%error, "Activity poll failed");
                continue;
            }
        };

        let running = has_running_activity(&activity);
        tracing::debug!(entries = activity.len(), running, "Polled activity");
        if !deliver(activity) {
            return PollEnd::Rejected;
        }
        if !running {
            return PollEnd::Idle;
        }
    }
}

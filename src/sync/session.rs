//! State owned by one set of credentials.

use std::sync::Arc;
use std::sync::atomic::{
    AtomicBool,
    Ordering,
};

use arc_swap::ArcSwap;
use tokio_util::sync::CancellationToken;

use super::guard::{
    InFlightGuard,
    TaskSlot,
};
use super::throttle::Throttle;
use crate::config::SyncSettings;
use crate::remote::ProjectApi;
use crate::store::SnapshotStore;
use crate::types::{
    ActivityItem,
    Credentials,
};

/// Lifecycle of the engine as seen by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No credentials.
    Unconfigured,
    /// Credentials set, no complete snapshot yet or a refresh running.
    Syncing,
    /// A complete snapshot is in view and nothing is refreshing.
    Ready,
}

/// Everything scoped to the active identity.
///
/// Replaced wholesale on identity change. `generation` lets in-flight work
/// detect that the session it started under is gone.
pub(crate) struct Session {
    /// Increases by one per identity change.
    pub(crate) generation: u64,
    /// Identity this session was opened with.
    pub(crate) credentials: Credentials,
    /// Client bound to `credentials.api_key`.
    pub(crate) api: Arc<dyn ProjectApi>,
    /// Snapshot files of `credentials.project_token`.
    pub(crate) store: SnapshotStore,

    /// Shared by project refresh and full key resync.
    pub(crate) refresh: InFlightGuard,
    /// Held while a publish request is outstanding.
    pub(crate) publishing: InFlightGuard,
    /// Spacing of project-detail refreshes.
    pub(crate) project_throttle: Throttle,
    /// Spacing of full key resyncs.
    pub(crate) keys_throttle: Throttle,

    /// Parent of every timer and poller started for this session.
    pub(crate) cancel: CancellationToken,
    /// The running auto-translation batch.
    pub(crate) auto_translate: TaskSlot,
    /// The running activity poller.
    pub(crate) activity_poll: TaskSlot,

    /// Last fetched activity list, newest first.
    pub(crate) activity: ArcSwap<Vec<ActivityItem>>,
    /// Set once a complete project and key snapshot is in view.
    pub(crate) ready: AtomicBool,
}

impl Session {
    /// A session with nothing in view yet.
    pub(crate) fn new(
        generation: u64,
        credentials: Credentials,
        api: Arc<dyn ProjectApi>,
        store: SnapshotStore,
        settings: &SyncSettings,
    ) -> Self {
        Self {
            generation,
            credentials,
            api,
            store,
            refresh: InFlightGuard::new(),
            publishing: InFlightGuard::new(),
            project_throttle: Throttle::new(settings.refresh_throttle()),
            keys_throttle: Throttle::new(settings.refresh_throttle()),
            cancel: CancellationToken::new(),
            auto_translate: TaskSlot::default(),
            activity_poll: TaskSlot::default(),
            activity: ArcSwap::from_pointee(Vec::new()),
            ready: AtomicBool::new(false),
        }
    }

    /// State reported to consumers.
    pub(crate) fn state(&self) -> SessionState {
        if self.refresh.is_busy() || !self.ready.load(Ordering::Acquire) {
            SessionState::Syncing
        } else {
            SessionState::Ready
        }
    }

    /// Records that a complete snapshot is in view.
    pub(crate) fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Stops every timer and poller belonging to this session.
    pub(crate) fn shut_down(&self) {
        self.cancel.cancel();
        tracing::debug!(generation = self.generation, "Session shut down");
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("generation", &self.generation)
            .field("credentials", &self.credentials)
            .field("store", &self.store)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

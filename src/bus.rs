//! Process-wide change notifications.
//!
//! Two independent channels: identity changed (credentials or project
//! switched) and content changed (cached data replaced). `emit` calls every
//! subscriber registered at the time of the call, in registration order, on
//! the calling task. A subscriber registered while an emission is running is
//! first called on the next emission. A failing or panicking subscriber is
//! logged and skipped; the remaining subscribers still run. Nothing is queued.

use std::panic::{
    AssertUnwindSafe,
    catch_unwind,
};
use std::sync::atomic::{
    AtomicU64,
    Ordering,
};
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
    PoisonError,
};

/// Error a subscriber may report back to the bus.
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

/// Stored subscriber callback.
type Handler = Arc<dyn Fn() -> Result<(), SubscriberError> + Send + Sync>;

/// The two channels of a [`ChangeBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Credentials or project switched; the view was cleared.
    Identity,
    /// Cached data was replaced.
    Content,
}

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    /// Channel the subscription belongs to.
    kind: ChangeKind,
    /// Bus-wide unique number.
    id: u64,
}

impl SubscriptionId {
    /// Channel this subscription listens on.
    #[must_use]
    pub const fn kind(self) -> ChangeKind {
        self.kind
    }
}

/// Outcome of one emission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitReport {
    /// Subscribers that returned `Ok`.
    pub delivered: usize,
    /// Subscribers that returned an error or panicked.
    pub failed: usize,
}

/// Subscribers of one kind.
#[derive(Default)]
struct Channel {
    /// Subscription ids and callbacks, in registration order.
    subscribers: Mutex<Vec<(u64, Handler)>>,
}

impl Channel {
    /// Locks the list, ignoring poisoning.
    fn lock(&self) -> MutexGuard<'_, Vec<(u64, Handler)>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `handler`.
    fn subscribe(&self, id: u64, handler: Handler) {
        self.lock().push((id, handler));
    }

    /// Removes subscription `id`; `false` if it was not registered.
    fn unsubscribe(&self, id: u64) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    /// Number of subscribers.
    fn len(&self) -> usize {
        self.lock().len()
    }

    /// Calls every current subscriber once.
    fn emit(&self, kind: ChangeKind) -> EmitReport {
        // Snapshot first: handlers may subscribe or unsubscribe re-entrantly.
        let handlers: Vec<(u64, Handler)> =
            self.lock().iter().map(|(id, handler)| (*id, Arc::clone(handler))).collect();

        let mut report = EmitReport::default();
        for (id, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler())) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(error)) => {
                    tracing::warn!(?kind, subscriber = id, %error, "Change subscriber failed");
                    report.failed += 1;
                }
                Err(_) => {
                    tracing::warn!(?kind, subscriber = id, "Change subscriber panicked");
                    report.failed += 1;
                }
            }
        }
        report
    }
}

/// Identity and content notifications for in-process consumers.
#[derive(Default)]
pub struct ChangeBus {
    /// Identity-changed subscribers.
    identity: Channel,
    /// Content-changed subscribers.
    content: Channel,
    /// Next subscription id, shared by both channels.
    next_id: AtomicU64,
}

impl ChangeBus {
    /// Bus without subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to identity changes.
    pub fn on_identity_changed<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn() -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.subscribe(ChangeKind::Identity, Arc::new(handler))
    }

    /// Subscribes to content changes.
    pub fn on_content_changed<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn() -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.subscribe(ChangeKind::Content, Arc::new(handler))
    }

    /// Returns `false` if the subscription was already gone.
    pub fn unsubscribe(&self, subscription: SubscriptionId) -> bool {
        self.channel(subscription.kind).unsubscribe(subscription.id)
    }

    /// Notifies identity subscribers.
    pub fn emit_identity_changed(&self) -> EmitReport {
        self.emit(ChangeKind::Identity)
    }

    /// Notifies content subscribers.
    pub fn emit_content_changed(&self) -> EmitReport {
        self.emit(ChangeKind::Content)
    }

    /// Current number of subscribers on one channel.
    #[must_use]
    pub fn subscriber_count(&self, kind: ChangeKind) -> usize {
        self.channel(kind).len()
    }

    /// Registers `handler` on `kind` under a fresh id.
    fn subscribe(&self, kind: ChangeKind, handler: Handler) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.channel(kind).subscribe(id, handler);
        SubscriptionId { kind, id }
    }

    /// Emits on `kind` and logs the outcome.
    fn emit(&self, kind: ChangeKind) -> EmitReport {
        let report = self.channel(kind).emit(kind);
        tracing::debug!(?kind, delivered = report.delivered, failed = report.failed, "Emitted change");
        report
    }

    /// Channel for `kind`.
    const fn channel(&self, kind: ChangeKind) -> &Channel {
        match kind {
            ChangeKind::Identity => &self.identity,
            ChangeKind::Content => &self.content,
        }
    }
}

impl std::fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeBus")
            .field("identity", &self.identity.len())
            .field("content", &self.content.len())
            .finish_non_exhaustive()
    }
}

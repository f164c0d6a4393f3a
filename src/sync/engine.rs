//! The sync engine.
//!
//! Sole writer of the snapshot store and of the in-memory view consumers
//! read from. Every remote result is committed under the session it was
//! requested for; results that arrive after an identity change are dropped.

use std::path::PathBuf;
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

use arc_swap::{
    ArcSwap,
    ArcSwapOption,
};

use super::activity::{
    self,
    PollEnd,
};
use super::jobs::{
    self,
    AutoTranslateReport,
    JobTimings,
};
use super::pagination::fetch_all_keys;
use super::session::{
    Session,
    SessionState,
};
use super::SyncError;
use crate::bus::{
    ChangeBus,
    SubscriberError,
    SubscriptionId,
};
use crate::config::SyncSettings;
use crate::remote::{
    ApiConnector,
    ProjectSummary,
    TranslationKeyDetails,
    TranslationText,
};
use crate::store::SnapshotStore;
use crate::types::{
    ActivityItem,
    Credentials,
    ProjectSnapshot,
    TranslationKeyRecord,
    has_running_activity,
    is_valid_personal_token,
};

/// How a refresh request ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New data was committed and content-changed emitted.
    Refreshed,
    /// Another refresh was in flight; nothing was fetched.
    AlreadyRefreshing,
    /// The previous refresh completed too recently; nothing was fetched.
    Throttled,
    /// The identity changed while fetching; the result was dropped.
    Superseded,
}

/// Why a refresh runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// Consumer request, subject to the throttle window.
    Requested,
    /// Follow-up to a change made through the engine.
    Forced,
}

/// State shared by every clone of a [`SyncEngine`].
struct EngineInner {
    /// Page sizes, timings and publish target.
    settings: SyncSettings,
    /// Directory every session's snapshot store lives in.
    cache_dir: PathBuf,
    /// Builds API clients for new credentials.
    connector: Arc<dyn ApiConnector>,
    /// Identity and content notifications.
    bus: ChangeBus,
    /// Active session, `None` while unconfigured.
    session: ArcSwapOption<Session>,
    /// Project snapshot consumers read.
    project: ArcSwapOption<ProjectSnapshot>,
    /// Key listing consumers read.
    keys: ArcSwap<Vec<TranslationKeyRecord>>,
    /// Serializes session swaps against commits.
    commit: Mutex<()>,
    /// Last generation handed to a session.
    generations: AtomicU64,
}

/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct SyncEngine {
    /// Shared state.
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    /// Unconfigured engine. Nothing is fetched until [`start`](Self::start).
    pub fn new(
        settings: SyncSettings,
        cache_dir: impl Into<PathBuf>,
        connector: Arc<dyn ApiConnector>,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                settings,
                cache_dir: cache_dir.into(),
                connector,
                bus: ChangeBus::new(),
                session: ArcSwapOption::empty(),
                project: ArcSwapOption::empty(),
                keys: ArcSwap::from_pointee(Vec::new()),
                commit: Mutex::new(()),
                generations: AtomicU64::new(0),
            }),
        }
    }

    // ----- reads -----

    /// [`SessionState::Unconfigured`] without a session, otherwise the
    /// session's own state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.session.load().as_deref().map_or(SessionState::Unconfigured, Session::state)
    }

    /// Credentials of the active session.
    #[must_use]
    pub fn credentials(&self) -> Option<Credentials> {
        self.inner.session.load().as_deref().map(|session| session.credentials.clone())
    }

    /// Last committed project snapshot of the active identity.
    #[must_use]
    pub fn project_snapshot(&self) -> Option<Arc<ProjectSnapshot>> {
        self.inner.project.load_full()
    }

    /// Last complete key listing of the active identity.
    #[must_use]
    pub fn translation_keys(&self) -> Arc<Vec<TranslationKeyRecord>> {
        self.inner.keys.load_full()
    }

    /// Last fetched activity list; empty without a session. Never persisted.
    #[must_use]
    pub fn activity(&self) -> Arc<Vec<ActivityItem>> {
        self.inner
            .session
            .load()
            .as_deref()
            .map_or_else(|| Arc::new(Vec::new()), |session| session.activity.load_full())
    }

    /// Change bus, for unsubscribing or inspecting subscribers.
    #[must_use]
    pub fn bus(&self) -> &ChangeBus {
        &self.inner.bus
    }

    /// Called after every session swap or reset, once the view is cleared.
    pub fn on_identity_changed<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn() -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.inner.bus.on_identity_changed(handler)
    }

    /// Called after every committed refresh or activity update.
    pub fn on_content_changed<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn() -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.inner.bus.on_content_changed(handler)
    }

    // ----- session lifecycle -----

    /// Opens a session and serves the cached snapshot right away, then
    /// resynchronizes everything.
    ///
    /// With a personal token, the API key is first checked against the
    /// account's projects; a mismatch fails with
    /// [`SyncError::StaleCredentials`] and leaves the engine unconfigured.
    /// If the check itself cannot reach the service, the previous session, if
    /// any, stays active.
    pub async fn start(&self, credentials: Credentials) -> Result<RefreshOutcome, SyncError> {
        self.begin(credentials, true).await
    }

    /// Like [`start`](Self::start) but without the cached snapshot: consumers
    /// see an empty view until the new project's data arrives.
    pub async fn switch_identity(&self, credentials: Credentials) -> Result<RefreshOutcome, SyncError> {
        self.begin(credentials, false).await
    }

    /// Drops the session: timers and pollers stop, the view is emptied and
    /// identity-changed is emitted. The store is left intact.
    pub fn reset(&self) {
        let previous = {
            let _commit = self.commit_lock();
            let previous = self.inner.session.swap(None);
            self.clear_view();
            previous
        };
        if let Some(previous) = previous {
            previous.shut_down();
            tracing::info!(generation = previous.generation, "Session reset");
        }
        self.inner.bus.emit_identity_changed();
    }

    /// Resets, then deletes the active project's snapshot files.
    pub fn purge(&self) -> Result<(), SyncError> {
        let session = self.current()?;
        self.reset();
        session.store.purge()?;
        tracing::info!(store = ?session.store, "Snapshot purged");
        Ok(())
    }

    /// Opens and activates a session, then runs a forced full resync.
    ///
    /// Unusable credentials reset the engine; any other failure to open
    /// leaves the current session untouched.
    async fn begin(&self, credentials: Credentials, warm_start: bool) -> Result<RefreshOutcome, SyncError> {
        let session = match self.open(credentials).await {
            Ok(session) => session,
            Err(error) if error.is_credential_error() => {
                tracing::warn!(%error, "Rejected credentials");
                self.reset();
                return Err(error);
            }
            Err(error) => {
                tracing::warn!(%error, "Could not start session");
                return Err(error);
            }
        };

        self.activate(&session, warm_start);
        self.inner.bus.emit_identity_changed();
        self.refresh_all_translation_keys(&session, Trigger::Forced).await
    }

    /// Checks `credentials` and builds a session for them without
    /// activating it.
    async fn open(&self, credentials: Credentials) -> Result<Arc<Session>, SyncError> {
        if !credentials.is_configured() {
            return Err(SyncError::NotConfigured);
        }
        if let Some(personal_token) = &credentials.personal_token {
            self.verify_api_key(personal_token, &credentials.api_key).await?;
        }

        let api = self.inner.connector.project_api(&credentials.api_key)?;
        let store = SnapshotStore::new(self.inner.cache_dir.clone(), &credentials.project_token);
        let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(Arc::new(Session::new(generation, credentials, api, store, &self.inner.settings)))
    }

    /// `StaleCredentials` unless one of the token's projects uses `api_key`.
    async fn verify_api_key(&self, personal_token: &str, api_key: &str) -> Result<(), SyncError> {
        let projects = self.list_projects(personal_token).await?;
        if projects.iter().any(|project| project.api_key == api_key) {
            Ok(())
        } else {
            Err(SyncError::StaleCredentials)
        }
    }

    /// Makes `session` the active one and shuts the previous one down.
    fn activate(&self, session: &Arc<Session>, warm_start: bool) {
        let previous = {
            let _commit = self.commit_lock();
            let previous = self.inner.session.swap(Some(Arc::clone(session)));
            self.clear_view();
            if warm_start {
                self.warm_load(session);
            }
            previous
        };
        if let Some(previous) = previous {
            previous.shut_down();
        }
        tracing::info!(
            generation = session.generation,
            project = %session.credentials.project_token,
            warm_start,
            "Session started"
        );
    }

    /// Serves the persisted snapshot; unreadable documents count as absent.
    fn warm_load(&self, session: &Session) {
        let project = session.store.read_project().unwrap_or_else(|error| {
            tracing::warn!(%error, "Ignoring cached project");
            None
        });
        let keys = session.store.read_keys().unwrap_or_else(|error| {
            tracing::warn!(%error, "Ignoring cached translation keys");
            Vec::new()
        });
        tracing::debug!(project = project.is_some(), keys = keys.len(), "Loaded cached snapshot");

        if project.is_some() {
            session.mark_ready();
        }
        self.inner.project.store(project.map(Arc::new));
        self.inner.keys.store(Arc::new(keys));
    }

    /// Empties what consumers read.
    fn clear_view(&self) {
        self.inner.project.store(None);
        self.inner.keys.store(Arc::new(Vec::new()));
    }

    /// Active session or `NotConfigured`.
    fn current(&self) -> Result<Arc<Session>, SyncError> {
        self.inner.session.load_full().ok_or(SyncError::NotConfigured)
    }

    /// Whether `session` is still the active one.
    fn is_current(&self, session: &Session) -> bool {
        self.inner.session.load().as_deref().is_some_and(|current| current.generation == session.generation)
    }

    /// Locks the commit mutex, ignoring poisoning.
    fn commit_lock(&self) -> MutexGuard<'_, ()> {
        self.inner.commit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `apply` if `session` is still the active one. `Ok(false)` when
    /// the session was replaced and nothing was written.
    fn commit<F>(&self, session: &Session, apply: F) -> Result<bool, SyncError>
    where
        F: FnOnce() -> Result<(), SyncError>,
    {
        let _commit = self.commit_lock();
        if !self.is_current(session) {
            tracing::debug!(generation = session.generation, "Dropping result of a replaced session");
            return Ok(false);
        }
        apply()?;
        Ok(true)
    }

    // ----- refresh -----

    /// Refreshes the project snapshot unless throttled or already refreshing.
    pub async fn request_refresh(&self) -> Result<RefreshOutcome, SyncError> {
        let session = self.current()?;
        self.refresh_project(&session, Trigger::Requested).await
    }

    /// Refreshes the project snapshot and every key page unless throttled or
    /// already refreshing.
    pub async fn request_full_key_resync(&self) -> Result<RefreshOutcome, SyncError> {
        let session = self.current()?;
        self.refresh_all_translation_keys(&session, Trigger::Requested).await
    }

    /// Fetches and commits the project snapshot.
    async fn refresh_project(&self, session: &Session, trigger: Trigger) -> Result<RefreshOutcome, SyncError> {
        if trigger == Trigger::Requested
            && let Some(left) = session.project_throttle.remaining()
        {
            tracing::debug!(?left, "Project refresh throttled");
            return Ok(RefreshOutcome::Throttled);
        }
        let Some(permit) = session.refresh.try_acquire() else {
            tracing::debug!("Refresh already in progress");
            return Ok(RefreshOutcome::AlreadyRefreshing);
        };

        let project = session.api.project_details().await?;
        let committed = self.commit(session, || {
            session.store.write_project(&project)?;
            self.inner.project.store(Some(Arc::new(project)));
            Ok(())
        })?;
        drop(permit);
        if !committed {
            return Ok(RefreshOutcome::Superseded);
        }

        session.project_throttle.mark_completed();
        tracing::info!("Project details refreshed");
        self.inner.bus.emit_content_changed();
        Ok(RefreshOutcome::Refreshed)
    }

    /// Fetches the project and every key page, then commits both together.
    async fn refresh_all_translation_keys(
        &self,
        session: &Session,
        trigger: Trigger,
    ) -> Result<RefreshOutcome, SyncError> {
        if trigger == Trigger::Requested
            && let Some(left) = session.keys_throttle.remaining()
        {
            tracing::debug!(?left, "Key resync throttled");
            return Ok(RefreshOutcome::Throttled);
        }
        let Some(permit) = session.refresh.try_acquire() else {
            tracing::debug!("Refresh already in progress");
            return Ok(RefreshOutcome::AlreadyRefreshing);
        };

        let project = session.api.project_details().await?;
        let keys = fetch_all_keys(session.api.as_ref(), self.inner.settings.keys_page_size).await?;
        let key_count = keys.len();
        let committed = self.commit(session, || {
            session.store.write_snapshot(&project, &keys)?;
            self.inner.project.store(Some(Arc::new(project)));
            self.inner.keys.store(Arc::new(keys));
            session.mark_ready();
            Ok(())
        })?;
        drop(permit);
        if !committed {
            return Ok(RefreshOutcome::Superseded);
        }

        session.project_throttle.mark_completed();
        session.keys_throttle.mark_completed();
        tracing::info!(keys = key_count, "Translation keys synchronized");
        self.inner.bus.emit_content_changed();
        Ok(RefreshOutcome::Refreshed)
    }

    // ----- key operations -----

    /// Creates `key` remotely, then resyncs.
    pub async fn add_translation_key(&self, key: TranslationKeyRecord) -> Result<(), SyncError> {
        let session = self.current()?;
        session.api.add_translation_key(&key).await?;
        tracing::info!(key = %key.key, namespace = %key.namespace, "Translation key added");
        self.resync_after_change(&session).await
    }

    /// Renames `key` or moves it to another namespace, then resyncs.
    pub async fn update_translation_key(
        &self,
        key: TranslationKeyRecord,
        updated: TranslationKeyRecord,
    ) -> Result<(), SyncError> {
        let session = self.current()?;
        session.api.update_translation_key(&key, &updated).await?;
        tracing::info!(from = %key.key, to = %updated.key, "Translation key updated");
        self.resync_after_change(&session).await
    }

    /// Deletes keys one by one; the first failure stops the batch, and keys
    /// already deleted stay deleted. An empty list does nothing.
    pub async fn delete_translation_keys(&self, keys: &[TranslationKeyRecord]) -> Result<(), SyncError> {
        let session = self.current()?;
        if keys.is_empty() {
            return Ok(());
        }
        let mut result: Result<(), SyncError> = Ok(());
        for key in keys {
            if let Err(error) = session.api.delete_translation_key(key).await {
                result = Err(error.into());
                break;
            }
            tracing::info!(key = %key.key, namespace = %key.namespace, "Translation key deleted");
        }
        let resync = self.resync_after_change(&session).await;
        result.and(resync)
    }

    /// Writes one translation. Keys are unchanged, so only the project
    /// snapshot is refreshed.
    pub async fn update_translation(
        &self,
        key: &TranslationKeyRecord,
        language: &str,
        text: &str,
    ) -> Result<(), SyncError> {
        let session = self.current()?;
        session.api.update_translation(key, language, text).await?;
        tracing::info!(key = %key.key, language, "Translation updated");
        self.refresh_project(&session, Trigger::Forced).await?;
        Ok(())
    }

    /// Empties one translation.
    pub async fn clear_translation(&self, key: &TranslationKeyRecord, language: &str) -> Result<(), SyncError> {
        self.update_translation(key, language, "").await
    }

    /// Description, tags and limits of one key, straight from the service.
    pub async fn translation_key_details(
        &self,
        key: &TranslationKeyRecord,
    ) -> Result<TranslationKeyDetails, SyncError> {
        Ok(self.current()?.api.translation_key_details(key).await?)
    }

    /// Every language's text for one key, straight from the service.
    pub async fn translations_for_key(
        &self,
        key: &TranslationKeyRecord,
    ) -> Result<Vec<TranslationText>, SyncError> {
        Ok(self.current()?.api.translations_for_key(key).await?)
    }

    /// Projects visible to a personal token. Works without a session.
    pub async fn list_projects(&self, personal_token: &str) -> Result<Vec<ProjectSummary>, SyncError> {
        if !is_valid_personal_token(personal_token) {
            return Err(SyncError::InvalidPersonalToken);
        }
        let account = self.inner.connector.account_api(personal_token)?;
        Ok(account.list_projects().await?)
    }

    /// Forced full resync after a key mutation.
    async fn resync_after_change(&self, session: &Session) -> Result<(), SyncError> {
        let outcome = self.refresh_all_translation_keys(session, Trigger::Forced).await?;
        if outcome == RefreshOutcome::AlreadyRefreshing {
            tracing::debug!("Resync after change skipped: refresh already in progress");
        }
        Ok(())
    }

    // ----- auto-translation -----

    /// Auto-translates `language_keys` one language at a time. An empty list
    /// means every language the project has right now.
    ///
    /// Afterwards activity and keys are refreshed so the new translations
    /// show up.
    pub async fn start_auto_translate(
        &self,
        language_keys: &[String],
    ) -> Result<AutoTranslateReport, SyncError> {
        let session = self.current()?;
        let languages = if language_keys.is_empty() {
            session.api.project_details().await?.language_keys()
        } else {
            language_keys.to_vec()
        };
        if languages.is_empty() {
            return Err(SyncError::NoLanguages);
        }

        let Some(cancel) = session.auto_translate.claim(&session.cancel) else {
            return Err(SyncError::conflict("Auto-translation is already in progress"));
        };
        let timings = JobTimings {
            settle: self.inner.settings.job_settle_delay(),
            poll: self.inner.settings.job_poll_interval(),
        };
        let batch = jobs::run_batch(session.api.as_ref(), &languages, timings, &cancel).await;
        cancel.cancel();

        let follow_up = self.settle_after_remote_work(&session).await;
        match (batch, follow_up) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(_), Err(error)) => Err(error),
            (Err(error), follow_up) => {
                if let Err(follow_up) = follow_up {
                    tracing::warn!(error = %follow_up, "Refresh after auto-translation failed");
                }
                Err(error)
            }
        }
    }

    /// Stops the running batch before its next submission. Jobs already
    /// handed to the service are not cancelled there.
    pub fn cancel_auto_translate(&self) {
        if let Some(session) = self.inner.session.load_full() {
            if session.auto_translate.is_active() {
                tracing::info!("Cancelling auto-translation");
            }
            session.auto_translate.stop();
        }
    }

    /// Activity and key refresh after an auto-translate batch.
    async fn settle_after_remote_work(&self, session: &Arc<Session>) -> Result<(), SyncError> {
        if !self.is_current(session) {
            return Ok(());
        }
        self.fetch_activity(session).await?;
        self.refresh_all_translation_keys(session, Trigger::Forced).await?;
        Ok(())
    }

    // ----- publishing -----

    /// Publishes to the configured environment. Fails with
    /// [`SyncError::Conflict`] while another publish is in flight.
    pub async fn publish(&self) -> Result<(), SyncError> {
        let session = self.current()?;
        let Some(permit) = session.publishing.try_acquire() else {
            return Err(SyncError::conflict("Publishing is already in progress"));
        };

        let environment = &self.inner.settings.publish_environment;
        tracing::info!(environment = %environment, "Publishing translations");
        session.api.publish(environment).await?;
        drop(permit);

        self.fetch_activity(&session).await?;
        self.refresh_project(&session, Trigger::Forced).await?;
        Ok(())
    }

    // ----- activity -----

    /// Fetches the activity list. While it shows running work it keeps being
    /// refreshed in the background until nothing is running.
    pub async fn refresh_activity(&self) -> Result<(), SyncError> {
        let session = self.current()?;
        self.fetch_activity(&session).await
    }

    /// Fetches the first activity page and arms or stops the poller.
    async fn fetch_activity(&self, session: &Arc<Session>) -> Result<(), SyncError> {
        let activity = session
            .api
            .list_activity(0, self.inner.settings.activity_page_size)
            .await?;
        let running = has_running_activity(&activity);
        if !self.store_activity(session, activity) {
            return Ok(());
        }

        if running {
            self.ensure_activity_poll(session);
        } else {
            session.activity_poll.stop();
        }
        Ok(())
    }

    /// Commits `activity` for `session`; `false` if it was replaced.
    fn store_activity(&self, session: &Session, activity: Vec<ActivityItem>) -> bool {
        let stored = self.commit(session, || {
            session.activity.store(Arc::new(activity));
            Ok(())
        });
        let stored = matches!(stored, Ok(true));
        if stored {
            self.inner.bus.emit_content_changed();
        }
        stored
    }

    /// Spawns the activity poller unless one is running for `session`.
    fn ensure_activity_poll(&self, session: &Arc<Session>) {
        let Some(cancel) = session.activity_poll.claim(&session.cancel) else {
            return;
        };
        tracing::debug!("Activity polling started");

        let engine = self.clone();
        let session = Arc::clone(session);
        let page_size = self.inner.settings.activity_page_size;
        let interval = self.inner.settings.activity_poll_interval();
        tokio::spawn(async move {
            let end = activity::poll_until_idle(session.api.as_ref(), page_size, interval, &cancel, |items| {
                engine.store_activity(&session, items)
            })
            .await;
            cancel.cancel();
            if end != PollEnd::Cancelled {
                tracing::debug!(?end, "Activity polling stopped");
            }
        });
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("session", &self.inner.session.load().as_deref())
            .field("cache_dir", &self.inner.cache_dir)
            .field("bus", &self.inner.bus)
            .finish_non_exhaustive()
    }
}

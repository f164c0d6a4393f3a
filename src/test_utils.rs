//! Shared test doubles.
//!
//! `FakeRemote` stands in for the SimpleLocalize API: it serves scripted
//! data and records every call as a short string (`"keys:0"`, `"submit:fr"`)
//! so tests can assert on order and count.
#![cfg(test)]

use std::collections::VecDeque;
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
};
use std::time::Duration;

use async_trait::async_trait;

use crate::remote::{
    AccountApi,
    ApiConnector,
    KeysPage,
    ProjectApi,
    ProjectSummary,
    RemoteError,
    TranslationKeyDetails,
    TranslationText,
};
use crate::types::{
    ActivityItem,
    ActivityKind,
    AutoTranslateJob,
    JobStatus,
    Language,
    ProjectSnapshot,
    TranslationKeyRecord,
};

/// Callback run with the joined language list after every submission.
type SubmitHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Scripted responses and the call log.
#[derive(Default)]
struct FakeState {
    /// Returned by `project_details`.
    project: ProjectSnapshot,
    /// Full key listing, paged on request.
    keys: Vec<TranslationKeyRecord>,
    /// Page that answers with a 500.
    failing_key_page: Option<u32>,
    /// Page that comes back empty while still reporting more pages.
    empty_key_page: Option<u32>,
    /// `project_details` answers with a 503.
    failing_project: bool,
    /// `list_projects` cannot reach the service.
    failing_account: bool,
    /// Remaining running-job polls that still report a job.
    running_jobs: usize,
    /// Value `running_jobs` is reset to on every submission.
    polls_per_job: usize,
    /// Languages of the last submission, reported by `running_jobs`.
    last_submitted: String,
    /// Queued activity responses.
    activity: VecDeque<Vec<ActivityItem>>,
    /// Returned by `list_projects`.
    projects: Vec<ProjectSummary>,
    /// Latency of reads and publish.
    delay: Duration,
    /// See [`FakeRemote::on_submit`].
    on_submit: Option<SubmitHook>,
    /// Every call, in order.
    calls: Vec<String>,
    /// API keys passed to the connector.
    connected: Vec<String>,
}

/// In-memory SimpleLocalize API.
#[derive(Default)]
pub(crate) struct FakeRemote {
    /// Scripted state behind a lock so the fake can be shared across tasks.
    state: Mutex<FakeState>,
}

impl FakeRemote {
    /// Empty project, no keys, nothing running.
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Locks the state, ignoring poisoning from a failed test thread.
    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Logs `call` and returns the latency to simulate.
    fn record(&self, call: impl Into<String>) -> Duration {
        let mut state = self.state();
        state.calls.push(call.into());
        state.delay
    }

    /// Sleeps on tokio's clock unless `delay` is zero.
    async fn pause(delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Replaces the project returned by `project_details`.
    pub(crate) fn set_project(&self, project: ProjectSnapshot) {
        self.state().project = project;
    }

    /// Replaces the whole key listing.
    pub(crate) fn set_keys(&self, keys: Vec<TranslationKeyRecord>) {
        self.state().keys = keys;
    }

    /// Makes `page` of the key listing fail with a 500.
    pub(crate) fn fail_key_page(&self, page: u32) {
        self.state().failing_key_page = Some(page);
    }

    /// Makes `page` of the key listing come back empty with `has_next` set.
    pub(crate) fn set_empty_key_page(&self, page: u32) {
        self.state().empty_key_page = Some(page);
    }

    /// Makes `project_details` fail with a 503.
    pub(crate) fn fail_project(&self, failing: bool) {
        self.state().failing_project = failing;
    }

    /// Makes `list_projects` fail with a transport error.
    pub(crate) fn fail_account(&self, failing: bool) {
        self.state().failing_account = failing;
    }

    /// Undoes every scripted failure.
    pub(crate) fn clear_failures(&self) {
        let mut state = self.state();
        state.failing_key_page = None;
        state.empty_key_page = None;
        state.failing_project = false;
        state.failing_account = false;
    }

    /// Number of running-job polls that still report a job after each submission.
    pub(crate) fn set_polls_per_job(&self, polls: usize) {
        self.state().polls_per_job = polls;
    }

    /// Running-job polls that report a job before anything is submitted.
    pub(crate) fn set_running_jobs(&self, polls: usize) {
        self.state().running_jobs = polls;
    }

    /// Queues one activity response; the last queued response repeats.
    pub(crate) fn push_activity(&self, activity: Vec<ActivityItem>) {
        self.state().activity.push_back(activity);
    }

    /// Projects visible to the personal token.
    pub(crate) fn set_projects(&self, projects: Vec<ProjectSummary>) {
        self.state().projects = projects;
    }

    /// Simulated latency for reads and publish.
    pub(crate) fn set_delay(&self, delay: Duration) {
        self.state().delay = delay;
    }

    /// Runs `hook` right after every auto-translate submission.
    pub(crate) fn on_submit(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
        self.state().on_submit = Some(Arc::new(hook));
    }

    /// Call log so far.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Number of logged calls starting with `prefix`.
    pub(crate) fn count_calls(&self, prefix: &str) -> usize {
        self.state().calls.iter().filter(|call| call.starts_with(prefix)).count()
    }

    /// Empties the call log.
    pub(crate) fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// API keys the connector built clients for, in order.
    pub(crate) fn connected(&self) -> Vec<String> {
        self.state().connected.clone()
    }

    /// One page of the scripted listing.
    fn page(&self, page: u32, size: u32) -> Result<KeysPage, RemoteError> {
        let state = self.state();
        if state.failing_key_page == Some(page) {
            return Err(RemoteError::rejected(500, "boom"));
        }
        if state.empty_key_page == Some(page) {
            return Ok(KeysPage { keys: Vec::new(), has_next: true });
        }
        let size = usize::try_from(size).unwrap_or(usize::MAX);
        let page = usize::try_from(page).unwrap_or(usize::MAX);
        let total = state.keys.len();
        let start = page.saturating_mul(size).min(total);
        let end = start.saturating_add(size).min(total);
        let keys = state.keys.get(start..end).unwrap_or_default().to_vec();
        Ok(KeysPage { keys, has_next: end < total })
    }
}

#[async_trait]
impl ProjectApi for FakeRemote {
    async fn list_translation_keys(&self, page: u32, size: u32) -> Result<KeysPage, RemoteError> {
        Self::pause(self.record(format!("keys:{page}"))).await;
        self.page(page, size)
    }

    async fn project_details(&self) -> Result<ProjectSnapshot, RemoteError> {
        Self::pause(self.record("project")).await;
        let state = self.state();
        if state.failing_project {
            return Err(RemoteError::rejected(503, "unavailable"));
        }
        Ok(state.project.clone())
    }

    async fn add_translation_key(&self, key: &TranslationKeyRecord) -> Result<(), RemoteError> {
        self.record(format!("add:{}", key.key));
        self.state().keys.push(key.clone());
        Ok(())
    }

    async fn translation_key_details(
        &self,
        key: &TranslationKeyRecord,
    ) -> Result<TranslationKeyDetails, RemoteError> {
        self.record(format!("details:{}", key.key));
        Ok(TranslationKeyDetails {
            key: key.key.clone(),
            namespace: key.namespace.clone(),
            description: Some("fake".to_string()),
            ..TranslationKeyDetails::default()
        })
    }

    async fn update_translation_key(
        &self,
        key: &TranslationKeyRecord,
        updated: &TranslationKeyRecord,
    ) -> Result<(), RemoteError> {
        self.record(format!("rename:{}->{}", key.key, updated.key));
        let mut state = self.state();
        if let Some(existing) = state.keys.iter_mut().find(|existing| **existing == *key) {
            existing.clone_from(updated);
        }
        Ok(())
    }

    async fn delete_translation_key(&self, key: &TranslationKeyRecord) -> Result<(), RemoteError> {
        self.record(format!("delete:{}", key.key));
        self.state().keys.retain(|existing| existing != key);
        Ok(())
    }

    async fn translations_for_key(
        &self,
        key: &TranslationKeyRecord,
    ) -> Result<Vec<TranslationText>, RemoteError> {
        self.record(format!("translations:{}", key.key));
        Ok(vec![TranslationText {
            key: key.key.clone(),
            namespace: key.namespace.clone(),
            language: "en".to_string(),
            text: "Hello".to_string(),
        }])
    }

    async fn update_translation(
        &self,
        key: &TranslationKeyRecord,
        language: &str,
        text: &str,
    ) -> Result<(), RemoteError> {
        self.record(format!("translate:{}:{language}:{text}", key.key));
        Ok(())
    }

    async fn start_auto_translation(&self, language_keys: &[String]) -> Result<(), RemoteError> {
        let joined = language_keys.join(",");
        self.record(format!("submit:{joined}"));
        let hook = {
            let mut state = self.state();
            state.running_jobs = state.polls_per_job;
            state.last_submitted = joined.clone();
            state.on_submit.clone()
        };
        if let Some(hook) = hook {
            hook(&joined);
        }
        Ok(())
    }

    async fn running_jobs(&self) -> Result<Vec<AutoTranslateJob>, RemoteError> {
        let mut state = self.state();
        let jobs = if state.running_jobs > 0 {
            state.running_jobs -= 1;
            vec![AutoTranslateJob {
                language_key: state.last_submitted.clone(),
                status: JobStatus::Running,
            }]
        } else {
            Vec::new()
        };
        state.calls.push(format!("jobs:{}", jobs.len()));
        Ok(jobs)
    }

    async fn list_activity(&self, _page: u32, _size: u32) -> Result<Vec<ActivityItem>, RemoteError> {
        self.record("activity");
        let mut state = self.state();
        let activity = if state.activity.len() > 1 {
            state.activity.pop_front()
        } else {
            state.activity.front().cloned()
        };
        Ok(activity.unwrap_or_default())
    }

    async fn publish(&self, environment: &str) -> Result<(), RemoteError> {
        Self::pause(self.record(format!("publish:{environment}"))).await;
        Ok(())
    }
}

#[async_trait]
impl AccountApi for FakeRemote {
    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, RemoteError> {
        self.record("projects");
        let state = self.state();
        if state.failing_account {
            return Err(RemoteError::Transport("connection refused".to_string()));
        }
        Ok(state.projects.clone())
    }
}

/// Hands out the same fake for every credential.
pub(crate) struct FakeConnector(pub(crate) Arc<FakeRemote>);

impl ApiConnector for FakeConnector {
    fn project_api(&self, api_key: &str) -> Result<Arc<dyn ProjectApi>, RemoteError> {
        self.0.state().connected.push(api_key.to_string());
        let api: Arc<dyn ProjectApi> = self.0.clone();
        Ok(api)
    }

    fn account_api(&self, _personal_token: &str) -> Result<Arc<dyn AccountApi>, RemoteError> {
        let api: Arc<dyn AccountApi> = self.0.clone();
        Ok(api)
    }
}

/// `count` keys named `key.0`, `key.1`, ... in the default namespace.
pub(crate) fn numbered_keys(count: usize) -> Vec<TranslationKeyRecord> {
    (0..count).map(|i| TranslationKeyRecord::new(format!("key.{i}"), "")).collect()
}

/// Project named `Project <token>` with the given language keys.
pub(crate) fn project_with_languages(token: &str, languages: &[&str]) -> ProjectSnapshot {
    ProjectSnapshot {
        project_token: token.to_string(),
        name: format!("Project {token}"),
        languages: languages
            .iter()
            .map(|key| Language { key: (*key).to_string(), name: key.to_uppercase() })
            .collect(),
        ..ProjectSnapshot::default()
    }
}

/// Activity entry of `kind`.
pub(crate) fn activity(kind: ActivityKind, running: bool) -> ActivityItem {
    ActivityItem { kind, running, ..ActivityItem::default() }
}

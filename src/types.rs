//! Core types used throughout the project.
//!
//! These mirror the JSON shapes of the SimpleLocalize API closely enough to be
//! deserialized directly from responses and written back to the snapshot
//! files unchanged.

use serde::{
    Deserialize,
    Serialize,
};

/// Cached project metadata.
///
/// Replaced wholesale on every successful project refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectSnapshot {
    /// Public token of the project.
    pub project_token: String,
    /// Display name.
    pub name: String,
    /// Number of translation keys in the project.
    #[serde(rename = "keys")]
    pub key_count: u64,
    /// Languages in project order.
    pub languages: Vec<Language>,
    /// Empty when the project does not use namespaces.
    pub namespaces: Vec<Namespace>,
    /// Customer-specific translation sets.
    pub customers: Vec<Customer>,
    /// Environments translations can be published to.
    #[serde(rename = "environments")]
    pub hosting_environments: Vec<HostingEnvironment>,
    /// Files published per environment.
    pub hosting_resources: Vec<HostingResource>,
    /// Changes not yet published to `_latest`.
    pub unpublished_changes: u64,
}

impl ProjectSnapshot {
    /// Language keys in project order.
    #[must_use]
    pub fn language_keys(&self) -> Vec<String> {
        self.languages.iter().map(|language| language.key.clone()).collect()
    }

    /// Whether keys are grouped by namespace.
    #[must_use]
    pub fn has_namespaces(&self) -> bool {
        !self.namespaces.is_empty()
    }

    /// Hosting resources published to the given environment.
    pub fn resources_for_environment<'a>(
        &'a self,
        environment_key: &'a str,
    ) -> impl Iterator<Item = &'a HostingResource> + 'a {
        self.hosting_resources.iter().filter(move |resource| resource.key == environment_key)
    }
}

/// A project language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Language {
    /// Language key, e.g. `en` or `pt_BR`.
    pub key: String,
    /// Display name.
    pub name: String,
}

/// A namespace keys can be grouped under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Namespace {
    /// Namespace name.
    pub name: String,
}

/// A customer with its own translation overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Customer {
    /// Customer key.
    pub key: String,
    /// Display name.
    pub name: String,
}

/// A hosting environment, e.g. `_latest` or `_production`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostingEnvironment {
    /// Environment key.
    pub key: String,
    /// Display name.
    pub name: String,
}

/// A file published to a hosting environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostingResource {
    /// Environment key the resource belongs to.
    pub key: String,
    /// Path of the file under the environment.
    pub path: String,
}

/// One entry of the translation-key index.
///
/// Identity is the `(key, namespace)` pair; an empty namespace is the default
/// namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct TranslationKeyRecord {
    /// Key name.
    #[serde(rename = "translationKey", alias = "key")]
    pub key: String,
    /// Namespace, empty for the default one.
    #[serde(default)]
    pub namespace: String,
}

impl TranslationKeyRecord {
    /// A key in `namespace`.
    #[must_use]
    pub fn new(key: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self { key: key.into(), namespace: namespace.into() }
    }
}

/// Identity of the remote project a session talks to.
///
/// Changing any field invalidates every cached snapshot.
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Credentials {
    /// Secret key of the project. Redacted in `Debug`.
    pub api_key: String,
    /// Public token of the project.
    pub project_token: String,
    /// Optional account token, checked against the project on start.
    pub personal_token: Option<String>,
}

impl Credentials {
    /// Project credentials without a personal token.
    #[must_use]
    pub fn new(api_key: impl Into<String>, project_token: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), project_token: project_token.into(), personal_token: None }
    }

    /// Adds a personal token.
    #[must_use]
    pub fn with_personal_token(mut self, personal_token: impl Into<String>) -> Self {
        self.personal_token = Some(personal_token.into());
        self
    }

    /// Both the API key and the project token are present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.project_token.is_empty()
    }
}

/// Minimum length of a personal token.
const PERSONAL_TOKEN_MIN_LEN: usize = 20;

/// Marker every personal token carries.
const PERSONAL_TOKEN_MARKER: &str = "slper_";

/// Checks the shape of a personal token before it is sent anywhere.
#[must_use]
pub fn is_valid_personal_token(token: &str) -> bool {
    token.contains(PERSONAL_TOKEN_MARKER) && token.len() >= PERSONAL_TOKEN_MIN_LEN
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("project_token", &self.project_token)
            .field("personal_token", &self.personal_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Remote job status as reported by the jobs endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Still translating.
    Running,
    /// Any other status.
    #[serde(other)]
    Finished,
}

/// An auto-translation job of one language.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoTranslateJob {
    /// Target language.
    #[serde(default)]
    pub language_key: String,
    /// Current status.
    pub status: JobStatus,
}

impl AutoTranslateJob {
    /// Whether the job still blocks new submissions.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }
}

/// Kind of a project activity entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    /// File import.
    Import,
    /// File export.
    Export,
    /// Auto-translation finished.
    AutoTranslationSuccess,
    /// Auto-translation failed.
    AutoTranslationFailed,
    /// Edit in the web editor.
    Change,
    /// Publication to `_latest`.
    Publication,
    /// Publication to another environment.
    EnvironmentPublication,
    /// Rollback of a publication.
    Revert,
    /// A kind this crate does not know.
    #[default]
    #[serde(other)]
    Unknown,
}

/// One entry of the project activity log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivityItem {
    /// What happened.
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    /// The work is still in progress.
    pub running: bool,
    /// Timestamp as sent by the service.
    pub created_at: Option<String>,
    /// Target environment of a publication.
    pub environment: Option<HostingEnvironment>,
}

/// Whether any entry still reports in-progress work.
#[must_use]
pub fn has_running_activity(activity: &[ActivityItem]) -> bool {
    activity.iter().any(|entry| entry.running)
}

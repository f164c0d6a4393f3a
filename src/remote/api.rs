//! Contract between the sync engine and the SimpleLocalize API.
//!
//! The engine only ever talks to these traits; the HTTP implementation lives
//! in [`super::client`] and tests substitute in-memory fakes.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{
    Deserialize,
    Serialize,
};

use super::RemoteError;
use crate::types::{
    ActivityItem,
    AutoTranslateJob,
    Language,
    ProjectSnapshot,
    TranslationKeyRecord,
};

/// One page of the key listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeysPage {
    /// Keys on this page, in listing order.
    pub keys: Vec<TranslationKeyRecord>,
    /// More pages follow this one.
    pub has_next: bool,
}

/// Label attached to a key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tag {
    /// Tag name as shown in the web editor.
    pub name: String,
}

/// Metadata of a single key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranslationKeyDetails {
    /// Key name.
    pub key: String,
    /// Empty when the project has no namespaces.
    pub namespace: String,
    /// Note for translators.
    pub description: Option<String>,
    /// Tags attached to the key.
    pub tags: Vec<Tag>,
    /// `None` or `0` means unlimited.
    pub characters_limit: Option<u32>,
}

/// Translation of one key into one language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranslationText {
    /// Key name.
    pub key: String,
    /// Empty when the project has no namespaces.
    pub namespace: String,
    /// Language key, e.g. `en`.
    pub language: String,
    /// Translated text.
    pub text: String,
}

/// Project entry of the personal-account project listing.
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectSummary {
    /// Display name.
    pub name: String,
    /// Public token identifying the project.
    pub project_token: String,
    /// Secret key for [`ProjectApi`] calls. Redacted in `Debug`.
    pub api_key: String,
    /// Number of keys in the project.
    pub keys: u64,
    /// Languages configured in the project.
    pub languages: Vec<Language>,
}

impl std::fmt::Debug for ProjectSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectSummary")
            .field("name", &self.name)
            .field("project_token", &self.project_token)
            .field("api_key", &"<redacted>")
            .field("keys", &self.keys)
            .field("languages", &self.languages.len())
            .finish()
    }
}

/// Operations scoped to one project, authenticated with its API key.
#[async_trait]
pub trait ProjectApi: Send + Sync {
    /// Fetches page `page` (zero-based) of `size` keys.
    async fn list_translation_keys(&self, page: u32, size: u32) -> Result<KeysPage, RemoteError>;

    /// Fetches languages, namespaces, customers and hosting details.
    async fn project_details(&self) -> Result<ProjectSnapshot, RemoteError>;

    /// Creates a key.
    async fn add_translation_key(&self, key: &TranslationKeyRecord) -> Result<(), RemoteError>;

    /// Fetches the metadata of one key.
    async fn translation_key_details(
        &self,
        key: &TranslationKeyRecord,
    ) -> Result<TranslationKeyDetails, RemoteError>;

    /// Renames a key and/or moves it to another namespace.
    async fn update_translation_key(
        &self,
        key: &TranslationKeyRecord,
        updated: &TranslationKeyRecord,
    ) -> Result<(), RemoteError>;

    /// Deletes a key with all of its translations.
    async fn delete_translation_key(&self, key: &TranslationKeyRecord) -> Result<(), RemoteError>;

    /// Base-language translations of one key.
    async fn translations_for_key(
        &self,
        key: &TranslationKeyRecord,
    ) -> Result<Vec<TranslationText>, RemoteError>;

    /// Sets the text of `key` in `language`. An empty text clears it.
    async fn update_translation(
        &self,
        key: &TranslationKeyRecord,
        language: &str,
        text: &str,
    ) -> Result<(), RemoteError>;

    /// Queues auto-translation jobs for the given languages.
    async fn start_auto_translation(&self, language_keys: &[String]) -> Result<(), RemoteError>;

    /// Jobs currently in the `RUNNING` state.
    async fn running_jobs(&self) -> Result<Vec<AutoTranslateJob>, RemoteError>;

    /// Fetches page `page` of the activity log, newest first.
    async fn list_activity(&self, page: u32, size: u32) -> Result<Vec<ActivityItem>, RemoteError>;

    /// Publishes translations to a hosting environment.
    async fn publish(&self, environment: &str) -> Result<(), RemoteError>;
}

/// Operations of a personal account, authenticated with a personal token.
#[async_trait]
pub trait AccountApi: Send + Sync {
    /// Projects the account can access.
    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, RemoteError>;
}

/// Builds API clients for a given identity.
///
/// A new client is built whenever the session's credentials change, so no
/// client ever outlives the identity it was created for.
pub trait ApiConnector: Send + Sync {
    /// Client for the project owning `api_key`.
    fn project_api(&self, api_key: &str) -> Result<Arc<dyn ProjectApi>, RemoteError>;

    /// Client for the account owning `personal_token`.
    fn account_api(&self, personal_token: &str) -> Result<Arc<dyn AccountApi>, RemoteError>;
}

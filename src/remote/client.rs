//! HTTP implementation of the API contract.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{
    AUTHORIZATION,
    HeaderMap,
    HeaderValue,
};
use reqwest::{
    Method,
    RequestBuilder,
    Url,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::api::{
    AccountApi,
    ApiConnector,
    KeysPage,
    ProjectApi,
    ProjectSummary,
    TranslationKeyDetails,
    TranslationText,
};
use super::RemoteError;
use crate::config::SyncSettings;
use crate::types::{
    ActivityItem,
    AutoTranslateJob,
    ProjectSnapshot,
    TranslationKeyRecord,
};

/// Header carrying a project API key.
const API_KEY_HEADER: &str = "x-simplelocalize-token";
/// Header identifying the calling integration.
const CLIENT_HEADER: &str = "x-simplelocalize-client";

/// How a client authenticates. One client never mixes the two.
#[derive(Clone)]
pub enum Auth {
    /// Project API key, sent as `X-SimpleLocalize-Token`.
    ApiKey(String),
    /// Personal account token, sent as `Authorization`.
    PersonalToken(String),
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("Auth::ApiKey(<redacted>)"),
            Self::PersonalToken(_) => f.write_str("Auth::PersonalToken(<redacted>)"),
        }
    }
}

/// `{ "data": ... }` wrapper used by every endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T: Default> {
    /// Payload; absent on some empty answers.
    #[serde(default)]
    data: T,
}

/// Body of `GET /v1/translation-keys`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeysPageResponse {
    /// Keys on the page.
    #[serde(default)]
    data: Vec<TranslationKeyRecord>,
    /// Explicit continuation flag.
    has_next: Option<bool>,
    /// Page count, used when `hasNext` is missing.
    total_pages: Option<u32>,
}

impl KeysPageResponse {
    /// Older deployments only report `totalPages`.
    fn into_page(self, page: u32) -> KeysPage {
        let has_next = self
            .has_next
            .unwrap_or_else(|| self.total_pages.is_some_and(|total| page + 1 < total));
        KeysPage { keys: self.data, has_next }
    }
}

/// Authenticated JSON client for the SimpleLocalize REST API.
#[derive(Debug, Clone)]
pub struct RestClient {
    /// Carries the auth and client headers on every request.
    http: reqwest::Client,
    /// API root, e.g. `https://api.simplelocalize.io/api`.
    base_url: Url,
}

impl RestClient {
    /// Builds a client that sends `auth` with every request.
    ///
    /// # Errors
    /// - `RemoteError::Transport`: unparsable base URL or a header value
    ///   containing invalid characters
    pub fn new(
        base_url: &str,
        client_name: &str,
        timeout: Duration,
        auth: &Auth,
    ) -> Result<Self, RemoteError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RemoteError::Transport(format!("invalid base URL '{base_url}': {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(CLIENT_HEADER, header_value(client_name)?);
        match auth {
            Auth::ApiKey(key) => {
                headers.insert(API_KEY_HEADER, header_value(key)?);
            }
            Auth::PersonalToken(token) => {
                headers.insert(AUTHORIZATION, header_value(token)?);
            }
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(RemoteError::from)?;

        Ok(Self { http, base_url })
    }

    /// `base_url` followed by the percent-encoded `segments`.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                RemoteError::Transport(format!("cannot use '{}' as a base URL", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Starts a request to the endpoint at `segments`.
    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, RemoteError> {
        Ok(self.http.request(method, self.endpoint(segments)?))
    }

    /// Sends the request and turns non-2xx answers into [`RemoteError::Rejected`].
    async fn send(request: RequestBuilder) -> Result<reqwest::Response, RemoteError> {
        let response = request.send().await.map_err(RemoteError::from)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::rejected(status.as_u16(), &body))
    }

    /// Sends the request and decodes the JSON body.
    async fn fetch<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, RemoteError> {
        let response = Self::send(request).await?;
        response.json::<T>().await.map_err(|e| RemoteError::Decode(e.to_string()))
    }

    /// Like [`Self::fetch`], unwrapping the `data` envelope.
    async fn fetch_data<T: DeserializeOwned + Default>(
        request: RequestBuilder,
    ) -> Result<T, RemoteError> {
        Ok(Self::fetch::<Envelope<T>>(request).await?.data)
    }

    /// Sends the request and ignores the body.
    async fn execute(request: RequestBuilder) -> Result<(), RemoteError> {
        Self::send(request).await.map(drop)
    }
}

/// Query parameters identifying one key.
fn key_query(key: &TranslationKeyRecord) -> [(&'static str, &str); 2] {
    [("key", key.key.as_str()), ("namespace", key.namespace.as_str())]
}

/// Converts a credential or client name into a header value.
fn header_value(value: &str) -> Result<HeaderValue, RemoteError> {
    HeaderValue::from_str(value)
        .map_err(|e| RemoteError::Transport(format!("invalid header value: {e}")))
}

#[async_trait]
impl ProjectApi for RestClient {
    async fn list_translation_keys(&self, page: u32, size: u32) -> Result<KeysPage, RemoteError> {
        let request = self
            .request(Method::GET, &["v1", "translation-keys"])?
            .query(&[("page", page), ("size", size)]);
        let response: KeysPageResponse = Self::fetch(request).await?;
        Ok(response.into_page(page))
    }

    async fn project_details(&self) -> Result<ProjectSnapshot, RemoteError> {
        Self::fetch_data(self.request(Method::GET, &["v2", "project"])?).await
    }

    async fn add_translation_key(&self, key: &TranslationKeyRecord) -> Result<(), RemoteError> {
        let request = self
            .request(Method::POST, &["v1", "translation-keys"])?
            .json(&json!({ "key": key.key, "namespace": key.namespace }));
        Self::execute(request).await
    }

    async fn translation_key_details(
        &self,
        key: &TranslationKeyRecord,
    ) -> Result<TranslationKeyDetails, RemoteError> {
        let request = self
            .request(Method::GET, &["v1", "translation-keys", "details"])?
            .query(&key_query(key));
        Self::fetch_data(request).await
    }

    async fn update_translation_key(
        &self,
        key: &TranslationKeyRecord,
        updated: &TranslationKeyRecord,
    ) -> Result<(), RemoteError> {
        let request = self
            .request(Method::PATCH, &["v1", "translation-keys"])?
            .query(&key_query(key))
            .json(&json!({ "key": updated.key, "namespace": updated.namespace }));
        Self::execute(request).await
    }

    async fn delete_translation_key(&self, key: &TranslationKeyRecord) -> Result<(), RemoteError> {
        let request =
            self.request(Method::DELETE, &["v1", "translation-keys"])?.query(&key_query(key));
        Self::execute(request).await
    }

    async fn translations_for_key(
        &self,
        key: &TranslationKeyRecord,
    ) -> Result<Vec<TranslationText>, RemoteError> {
        let request = self
            .request(Method::GET, &["v2", "translations"])?
            .query(&key_query(key))
            .query(&[("baseOnly", "true")]);
        Self::fetch_data(request).await
    }

    async fn update_translation(
        &self,
        key: &TranslationKeyRecord,
        language: &str,
        text: &str,
    ) -> Result<(), RemoteError> {
        let request = self.request(Method::PATCH, &["v2", "translations"])?.json(&json!({
            "key": key.key,
            "namespace": key.namespace,
            "language": language,
            "text": text,
        }));
        Self::execute(request).await
    }

    async fn start_auto_translation(&self, language_keys: &[String]) -> Result<(), RemoteError> {
        let request = self
            .request(Method::POST, &["v2", "jobs", "auto-translate"])?
            .json(&json!({ "languageKeys": language_keys }));
        Self::execute(request).await
    }

    async fn running_jobs(&self) -> Result<Vec<AutoTranslateJob>, RemoteError> {
        let request = self.request(Method::GET, &["v2", "jobs"])?.query(&[("status", "RUNNING")]);
        let jobs: Vec<AutoTranslateJob> = Self::fetch_data(request).await?;
        Ok(jobs.into_iter().filter(AutoTranslateJob::is_running).collect())
    }

    async fn list_activity(&self, page: u32, size: u32) -> Result<Vec<ActivityItem>, RemoteError> {
        let request =
            self.request(Method::GET, &["v1", "activity"])?.query(&[("page", page), ("size", size)]);
        Self::fetch_data(request).await
    }

    async fn publish(&self, environment: &str) -> Result<(), RemoteError> {
        Self::execute(self.request(Method::POST, &["v2", "environments", environment, "publish"])?)
            .await
    }
}

#[async_trait]
impl AccountApi for RestClient {
    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, RemoteError> {
        Self::fetch_data(self.request(Method::GET, &["v2", "projects"])?).await
    }
}

/// Builds [`RestClient`]s from the workspace settings.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    /// See [`SyncSettings::api_base_url`].
    base_url: String,
    /// See [`SyncSettings::client_name`].
    client_name: String,
    /// Per-request timeout.
    timeout: Duration,
}

impl HttpConnector {
    /// Captures the connection settings. Clients are built on demand.
    #[must_use]
    pub fn new(settings: &SyncSettings) -> Self {
        Self {
            base_url: settings.api_base_url.clone(),
            client_name: settings.client_name.clone(),
            timeout: settings.request_timeout(),
        }
    }

    /// Builds a client authenticated with `auth`.
    fn client(&self, auth: &Auth) -> Result<RestClient, RemoteError> {
        RestClient::new(&self.base_url, &self.client_name, self.timeout, auth)
    }
}

impl ApiConnector for HttpConnector {
    fn project_api(&self, api_key: &str) -> Result<Arc<dyn ProjectApi>, RemoteError> {
        Ok(Arc::new(self.client(&Auth::ApiKey(api_key.to_string()))?))
    }

    fn account_api(&self, personal_token: &str) -> Result<Arc<dyn AccountApi>, RemoteError> {
        Ok(Arc::new(self.client(&Auth::PersonalToken(personal_token.to_string()))?))
    }
}

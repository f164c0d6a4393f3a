//! Settings read from `.simplelocalize.json` and their validation.

use std::path::{
    Path,
    PathBuf,
};
use std::time::Duration;

use serde::{
    Deserialize,
    Serialize,
};
use thiserror::Error;

/// A single rejected setting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Configuration error in '{field_path}': {message}")]
pub struct ValidationError {
    /// JSON path to the field (e.g., "keysPageSize")
    pub field_path: String,
    /// What is wrong with the value.
    pub message: String,
}

impl ValidationError {
    /// Creates an error for `field_path`.
    #[must_use]
    pub fn new(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field_path: field_path.into(), message: message.into() }
    }
}

/// Errors raised while loading or applying settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// One or more settings were rejected.
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    ValidationErrors(Vec<ValidationError>),

    /// The configuration file exists but could not be read.
    #[error("Failed to load configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// The configuration file is not valid JSON for [`SyncSettings`].
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Renders the errors as a numbered list, one per line.
fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, err)| format!("  {}. {} - {}", i + 1, err.field_path, err.message))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Largest page the key-listing endpoint accepts.
pub const MAX_KEYS_PAGE_SIZE: u32 = 10_000;

/// Snapshot directory, relative to the workspace, when `cacheDir` is unset.
pub const DEFAULT_CACHE_DIR: &str = ".simplelocalize/cache";

/// Engine and client settings. Every field has a default.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    /// Root of the REST API, without a trailing `/`.
    pub api_base_url: String,
    /// Sent as `X-SimpleLocalize-Client` on every request.
    pub client_name: String,
    /// Per-request timeout.
    pub request_timeout_secs: u64,

    /// Keys requested per listing page.
    pub keys_page_size: u32,
    /// Activity entries requested per poll.
    pub activity_page_size: u32,

    /// Minimum time between two completed refreshes of the same kind.
    pub refresh_throttle_ms: u64,
    /// Delay between activity polls while something is still running.
    pub activity_poll_interval_ms: u64,
    /// Delay between running-job polls during auto-translation.
    pub job_poll_interval_ms: u64,
    /// Wait after submitting a job before its first poll.
    pub job_settle_delay_ms: u64,

    /// Environment published by `publish()`.
    pub publish_environment: String,

    /// Directory holding the snapshot files.
    ///
    /// A relative path is anchored at the workspace root when the file is
    /// loaded. See [`ConfigManager::cache_dir`](super::ConfigManager::cache_dir)
    /// for the default.
    pub cache_dir: Option<PathBuf>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.simplelocalize.io/api".to_string(),
            client_name: "vsc-extension".to_string(),
            request_timeout_secs: 30,
            keys_page_size: 2000,
            activity_page_size: 10,
            refresh_throttle_ms: 3000,
            activity_poll_interval_ms: 5000,
            job_poll_interval_ms: 2000,
            job_settle_delay_ms: 3000,
            publish_environment: "_latest".to_string(),
            cache_dir: None,
        }
    }
}

impl SyncSettings {
    /// Anchors a relative `cache_dir` at `workspace_root`.
    pub(super) fn resolve_cache_dir(&mut self, workspace_root: &Path) {
        if let Some(dir) = self.cache_dir.as_mut()
            && dir.is_relative()
        {
            *dir = workspace_root.join(&*dir);
        }
    }

    /// [`Self::request_timeout_secs`] as a duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// [`Self::refresh_throttle_ms`] as a duration.
    #[must_use]
    pub const fn refresh_throttle(&self) -> Duration {
        Duration::from_millis(self.refresh_throttle_ms)
    }

    /// [`Self::activity_poll_interval_ms`] as a duration.
    #[must_use]
    pub const fn activity_poll_interval(&self) -> Duration {
        Duration::from_millis(self.activity_poll_interval_ms)
    }

    /// [`Self::job_poll_interval_ms`] as a duration.
    #[must_use]
    pub const fn job_poll_interval(&self) -> Duration {
        Duration::from_millis(self.job_poll_interval_ms)
    }

    /// [`Self::job_settle_delay_ms`] as a duration.
    #[must_use]
    pub const fn job_settle_delay(&self) -> Duration {
        Duration::from_millis(self.job_settle_delay_ms)
    }

    /// # Errors
    /// - Invalid base URL
    /// - Zero page sizes, timeouts or poll intervals
    /// - Empty client name, publish environment or cache directory
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        match reqwest::Url::parse(&self.api_base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::new(
                "apiBaseUrl",
                format!("Unsupported scheme '{}'. Use http or https", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new(
                "apiBaseUrl",
                format!("Invalid URL '{}': {e}", self.api_base_url),
            )),
        }

        if self.client_name.is_empty() {
            errors.push(ValidationError::new("clientName", "The client name cannot be empty"));
        }

        if self.request_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "requestTimeoutSecs",
                "The timeout must be at least 1 second",
            ));
        }

        if self.keys_page_size == 0 || self.keys_page_size > MAX_KEYS_PAGE_SIZE {
            errors.push(ValidationError::new(
                "keysPageSize",
                format!("The page size must be between 1 and {MAX_KEYS_PAGE_SIZE}"),
            ));
        }

        if self.activity_page_size == 0 {
            errors.push(ValidationError::new(
                "activityPageSize",
                "The page size must be greater than 0",
            ));
        }

        if self.activity_poll_interval_ms == 0 {
            errors.push(ValidationError::new(
                "activityPollIntervalMs",
                "The poll interval must be greater than 0",
            ));
        }

        if self.job_poll_interval_ms == 0 {
            errors.push(ValidationError::new(
                "jobPollIntervalMs",
                "The poll interval must be greater than 0",
            ));
        }

        if self.publish_environment.is_empty() {
            errors.push(ValidationError::new(
                "publishEnvironment",
                "The environment cannot be empty. Example: \"_latest\"",
            ));
        }

        if self.cache_dir.as_ref().is_some_and(|dir| dir.as_os_str().is_empty()) {
            errors.push(ValidationError::new(
                "cacheDir",
                "The cache directory cannot be empty. Omit it to use the default",
            ));
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

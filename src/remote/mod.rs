//! Typed access to the SimpleLocalize REST API.
//!
//! Stateless: every call maps to exactly one HTTP request and failures are
//! returned as-is, without retries.
mod api;
mod client;
mod error;

pub use api::{
    AccountApi,
    ApiConnector,
    KeysPage,
    ProjectApi,
    ProjectSummary,
    Tag,
    TranslationKeyDetails,
    TranslationText,
};
pub use client::{
    Auth,
    HttpConnector,
    RestClient,
};
pub use error::RemoteError;

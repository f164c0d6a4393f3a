//! Keeps a local mirror of one SimpleLocalize project in sync.
//!
//! [`SyncEngine`] owns the session for the active credentials, decides when
//! to fetch, writes the snapshot store and tells subscribers through the
//! change bus. Consumers only read.
mod activity;
mod engine;
mod error;
mod guard;
mod jobs;
mod pagination;
mod session;
mod throttle;

pub use engine::{
    RefreshOutcome,
    SyncEngine,
};
pub use error::SyncError;
pub use jobs::AutoTranslateReport;
pub use session::SessionState;

//! simplelocalize-sync
//!
//! Keeps a local, persistent mirror of a SimpleLocalize project (project
//! details and the full translation-key listing) in sync with the remote
//! service, and tells in-process consumers when it changed.

pub mod bus;
pub mod config;
pub mod remote;
pub mod store;
pub mod sync;
pub mod types;

#[cfg(test)]
mod test_utils;

pub use sync::{
    RefreshOutcome,
    SessionState,
    SyncEngine,
    SyncError,
};

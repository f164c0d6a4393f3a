//! Durable cache of the last-known project state.
//!
//! Pure read/write: the store never decides when to fetch. Only the sync
//! engine writes to it.
mod snapshot;

pub use snapshot::{
    SnapshotStore,
    StoreError,
};

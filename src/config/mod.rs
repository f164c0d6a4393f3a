//! Workspace configuration.
/// Config file loader
mod loader;
/// Configuration manager
mod manager;
/// Configuration types and settings
mod types;

pub use manager::ConfigManager;
pub use types::{
    ConfigError,
    DEFAULT_CACHE_DIR,
    MAX_KEYS_PAGE_SIZE,
    SyncSettings,
    ValidationError,
};

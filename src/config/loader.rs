//! Reads `.simplelocalize.json` from a workspace.

use std::io::ErrorKind;
use std::path::Path;

use super::{
    ConfigError,
    SyncSettings,
};

/// Name of the workspace configuration file.
pub(super) const CONFIG_FILE_NAME: &str = ".simplelocalize.json";

/// Reads the workspace configuration file.
///
/// A relative `cacheDir` is resolved against `workspace_root`, so the
/// snapshot location does not depend on the process working directory.
///
/// # Returns
/// - `Ok(Some(settings))`: the file exists and parsed
/// - `Ok(None)`: no configuration file
/// - `Err(ConfigError)`: the file could not be read or parsed
pub(super) fn load_from_workspace(
    workspace_root: &Path,
) -> Result<Option<SyncSettings>, ConfigError> {
    let config_path = workspace_root.join(CONFIG_FILE_NAME);

    let content = match std::fs::read_to_string(&config_path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %config_path.display(), "No configuration file");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let mut settings: SyncSettings = serde_json::from_str(&content)?;
    settings.resolve_cache_dir(workspace_root);
    tracing::debug!(path = %config_path.display(), cache_dir = ?settings.cache_dir, "Loaded configuration");

    Ok(Some(settings))
}

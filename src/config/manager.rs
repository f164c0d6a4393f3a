//! Owns the active settings and the workspace they were loaded from.

use std::path::PathBuf;

use super::{
    ConfigError,
    DEFAULT_CACHE_DIR,
    SyncSettings,
    loader,
};

/// Holds the validated settings for one workspace.
#[derive(Default, Debug, Clone)]
pub struct ConfigManager {
    /// Last settings that passed validation.
    current_settings: SyncSettings,
    /// Workspace the settings were loaded from, if any.
    workspace_root: Option<PathBuf>,
}

impl ConfigManager {
    /// Starts with the default settings and no workspace.
    #[must_use]
    pub fn new() -> Self {
        Self { current_settings: SyncSettings::default(), workspace_root: None }
    }

    /// Loads and validates the workspace settings.
    ///
    /// Without a workspace root, or without a configuration file, the defaults
    /// are used. Nothing is replaced when loading or validation fails.
    pub fn load_settings(&mut self, workspace_root: Option<PathBuf>) -> Result<(), ConfigError> {
        tracing::debug!("Loading settings for workspace: {:?}", workspace_root);

        let settings = if let Some(root) = &workspace_root {
            loader::load_from_workspace(root)?.map_or_else(SyncSettings::default, |ws| {
                tracing::debug!("Loaded workspace settings: {:?}", ws);
                ws
            })
        } else {
            SyncSettings::default()
        };

        settings.validate().map_err(ConfigError::ValidationErrors)?;

        self.current_settings = settings;
        self.workspace_root = workspace_root;
        tracing::debug!("Settings loaded successfully: {:?}", self.current_settings);

        Ok(())
    }

    /// Replaces the settings after validating them.
    ///
    /// A relative `cache_dir` is anchored at the current workspace root, as it
    /// would be when read from the file.
    pub fn update_settings(&mut self, mut new_settings: SyncSettings) -> Result<(), ConfigError> {
        tracing::debug!("Updating settings...");

        if let Some(root) = &self.workspace_root {
            new_settings.resolve_cache_dir(root);
        }
        new_settings.validate().map_err(ConfigError::ValidationErrors)?;

        self.current_settings = new_settings;
        tracing::debug!("Settings updated successfully");

        Ok(())
    }

    /// The active settings.
    #[must_use]
    pub const fn get_settings(&self) -> &SyncSettings {
        &self.current_settings
    }

    /// The workspace passed to the last successful [`Self::load_settings`].
    #[must_use]
    pub const fn workspace_root(&self) -> Option<&PathBuf> {
        self.workspace_root.as_ref()
    }

    /// Directory the snapshot store writes to.
    ///
    /// - `cacheDir` set: that directory, already anchored at the workspace
    /// - otherwise: [`DEFAULT_CACHE_DIR`] under the workspace root, or under
    ///   the working directory when there is no workspace
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.current_settings.cache_dir {
            return dir.clone();
        }
        self.workspace_root
            .as_ref()
            .map_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR), |root| root.join(DEFAULT_CACHE_DIR))
    }
}

//! End-to-end engine behaviour through the public API: workspace settings,
//! the on-disk snapshot and change notifications.

#![allow(clippy::unwrap_used)]
#![allow(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

use std::sync::atomic::{
    AtomicBool,
    AtomicUsize,
    Ordering,
};
use std::sync::{
    Arc,
    Mutex,
};

use async_trait::async_trait;
use googletest::prelude::*;
use simplelocalize_sync::config::{
    ConfigManager,
    DEFAULT_CACHE_DIR,
};
use simplelocalize_sync::remote::{
    AccountApi,
    ApiConnector,
    KeysPage,
    ProjectApi,
    ProjectSummary,
    RemoteError,
    TranslationKeyDetails,
    TranslationText,
};
use simplelocalize_sync::store::SnapshotStore;
use simplelocalize_sync::types::{
    ActivityItem,
    AutoTranslateJob,
    Credentials,
    ProjectSnapshot,
    TranslationKeyRecord,
};
use simplelocalize_sync::{
    RefreshOutcome,
    SessionState,
    SyncEngine,
    SyncError,
};
use tempfile::TempDir;

/// Serves a fixed key list; every other endpoint is unsupported.
#[derive(Default)]
struct ScriptedRemote {
    keys: Vec<TranslationKeyRecord>,
    offline: AtomicBool,
    pages: Mutex<Vec<(u32, u32)>>,
}

impl ScriptedRemote {
    fn with_keys(count: usize) -> Arc<Self> {
        let keys = (0..count).map(|i| TranslationKeyRecord::new(format!("greeting.{i}"), "common")).collect();
        Arc::new(Self { keys, ..Self::default() })
    }

    fn check_online(&self) -> Result<(), RemoteError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(RemoteError::Transport("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

fn unsupported() -> RemoteError {
    RemoteError::Transport("unsupported in this test".to_string())
}

#[async_trait]
impl ProjectApi for ScriptedRemote {
    async fn list_translation_keys(&self, page: u32, size: u32) -> Result<KeysPage, RemoteError> {
        self.check_online()?;
        self.pages.lock().unwrap().push((page, size));
        let (page, size) = (page as usize, size as usize);
        let keys: Vec<_> = self.keys.iter().skip(page * size).take(size).cloned().collect();
        let has_next = (page + 1) * size < self.keys.len();
        Ok(KeysPage { keys, has_next })
    }

    async fn project_details(&self) -> Result<ProjectSnapshot, RemoteError> {
        self.check_online()?;
        Ok(ProjectSnapshot { name: "Website".to_string(), ..ProjectSnapshot::default() })
    }

    async fn add_translation_key(&self, _key: &TranslationKeyRecord) -> Result<(), RemoteError> {
        Err(unsupported())
    }

    async fn translation_key_details(
        &self,
        _key: &TranslationKeyRecord,
    ) -> Result<TranslationKeyDetails, RemoteError> {
        Err(unsupported())
    }

    async fn update_translation_key(
        &self,
        _key: &TranslationKeyRecord,
        _updated: &TranslationKeyRecord,
    ) -> Result<(), RemoteError> {
        Err(unsupported())
    }

    async fn delete_translation_key(&self, _key: &TranslationKeyRecord) -> Result<(), RemoteError> {
        Err(unsupported())
    }

    async fn translations_for_key(
        &self,
        _key: &TranslationKeyRecord,
    ) -> Result<Vec<TranslationText>, RemoteError> {
        Err(unsupported())
    }

    async fn update_translation(
        &self,
        _key: &TranslationKeyRecord,
        _language: &str,
        _text: &str,
    ) -> Result<(), RemoteError> {
        Err(unsupported())
    }

    async fn start_auto_translation(&self, _language_keys: &[String]) -> Result<(), RemoteError> {
        Err(unsupported())
    }

    async fn running_jobs(&self) -> Result<Vec<AutoTranslateJob>, RemoteError> {
        Ok(Vec::new())
    }

    async fn list_activity(&self, _page: u32, _size: u32) -> Result<Vec<ActivityItem>, RemoteError> {
        Ok(Vec::new())
    }

    async fn publish(&self, _environment: &str) -> Result<(), RemoteError> {
        Err(unsupported())
    }
}

#[async_trait]
impl AccountApi for ScriptedRemote {
    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, RemoteError> {
        Ok(Vec::new())
    }
}

struct Connector(Arc<ScriptedRemote>);

impl ApiConnector for Connector {
    fn project_api(&self, _api_key: &str) -> Result<Arc<dyn ProjectApi>, RemoteError> {
        let api: Arc<dyn ProjectApi> = self.0.clone();
        Ok(api)
    }

    fn account_api(&self, _personal_token: &str) -> Result<Arc<dyn AccountApi>, RemoteError> {
        let api: Arc<dyn AccountApi> = self.0.clone();
        Ok(api)
    }
}

fn engine_in(workspace: &TempDir, remote: &Arc<ScriptedRemote>) -> SyncEngine {
    let mut config_manager = ConfigManager::new();
    config_manager.load_settings(Some(workspace.path().to_path_buf())).unwrap();
    let settings = config_manager.get_settings().clone();
    SyncEngine::new(settings, config_manager.cache_dir(), Arc::new(Connector(Arc::clone(remote))))
}

fn credentials() -> Credentials {
    Credentials::new("api-key", "project-token")
}

#[tokio::test]
async fn workspace_page_size_drives_key_pagination() {
    let workspace = TempDir::new().unwrap();
    std::fs::write(workspace.path().join(".simplelocalize.json"), r#"{ "keysPageSize": 2 }"#).unwrap();
    let remote = ScriptedRemote::with_keys(5);
    let engine = engine_in(&workspace, &remote);

    engine.start(credentials()).await.unwrap();

    assert_eq!(*remote.pages.lock().unwrap(), vec![(0, 2), (1, 2), (2, 2)]);
    assert_that!(engine.translation_keys().len(), eq(5));
    let store = SnapshotStore::new(workspace.path().join(DEFAULT_CACHE_DIR), "project-token");
    assert_that!(store.read_keys().unwrap().len(), eq(5));
}

#[tokio::test]
async fn workspace_cache_dir_holds_the_snapshot() {
    let workspace = TempDir::new().unwrap();
    std::fs::write(workspace.path().join(".simplelocalize.json"), r#"{ "cacheDir": "l10n/snapshots" }"#)
        .unwrap();
    let remote = ScriptedRemote::with_keys(3);

    engine_in(&workspace, &remote).start(credentials()).await.unwrap();

    let store = SnapshotStore::new(workspace.path().join("l10n/snapshots"), "project-token");
    assert_that!(store.read_keys().unwrap().len(), eq(3));
    assert!(!workspace.path().join(DEFAULT_CACHE_DIR).exists());
}

#[tokio::test]
async fn last_good_snapshot_survives_restart_while_offline() {
    let workspace = TempDir::new().unwrap();
    let remote = ScriptedRemote::with_keys(4);
    engine_in(&workspace, &remote).start(credentials()).await.unwrap();

    remote.offline.store(true, Ordering::SeqCst);
    let restarted = engine_in(&workspace, &remote);
    let result = restarted.start(credentials()).await;

    assert!(matches!(result, Err(SyncError::Remote(RemoteError::Transport(_)))));
    assert_that!(restarted.translation_keys().len(), eq(4));
    assert_eq!(restarted.project_snapshot().map(|project| project.name.clone()), Some("Website".to_string()));
    assert_eq!(restarted.state(), SessionState::Ready);
}

#[tokio::test]
async fn subscribers_follow_the_session_lifecycle() {
    let workspace = TempDir::new().unwrap();
    let remote = ScriptedRemote::with_keys(1);
    let engine = engine_in(&workspace, &remote);
    let identity = Arc::new(AtomicUsize::new(0));
    let content = Arc::new(AtomicUsize::new(0));
    let identity_counter = Arc::clone(&identity);
    let content_counter = Arc::clone(&content);
    engine.on_identity_changed(move || {
        identity_counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    engine.on_content_changed(move || {
        content_counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    assert_eq!(engine.start(credentials()).await.unwrap(), RefreshOutcome::Refreshed);
    engine.reset();

    assert_that!(identity.load(Ordering::SeqCst), eq(2));
    assert_that!(content.load(Ordering::SeqCst), eq(1));
    assert_that!(engine.translation_keys().len(), eq(0));
    assert_eq!(engine.state(), SessionState::Unconfigured);
}

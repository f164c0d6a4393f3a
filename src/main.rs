//! Headless driver: syncs the workspace's project once and runs one command.
//!
//! ```text
//! simplelocalize-sync [sync | activity | publish | purge | auto-translate [LANG...]]
//! ```
//!
//! Credentials come from `SIMPLELOCALIZE_API_KEY`, `SIMPLELOCALIZE_PROJECT_TOKEN`
//! and, optionally, `SIMPLELOCALIZE_PERSONAL_TOKEN`. Settings are read from
//! `.simplelocalize.json` in the current directory.

use std::process::ExitCode;
use std::sync::Arc;

use simplelocalize_sync::config::ConfigManager;
use simplelocalize_sync::remote::HttpConnector;
use simplelocalize_sync::types::Credentials;
use simplelocalize_sync::{
    SyncEngine,
    SyncError,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// What to do once the project is in sync.
#[derive(Debug)]
enum Command {
    /// Sync only.
    Sync,
    /// Print the recent activity.
    Activity,
    /// Publish to the configured environment.
    Publish,
    /// Delete every snapshot in the cache directory.
    Purge,
    /// Auto-translate the given languages, or all of them when empty.
    AutoTranslate(Vec<String>),
}

impl Command {
    /// Parses the arguments after the program name.
    fn parse(mut args: impl Iterator<Item = String>) -> Option<Self> {
        let command = match args.next().as_deref() {
            None | Some("sync") => Self::Sync,
            Some("activity") => Self::Activity,
            Some("publish") => Self::Publish,
            Some("purge") => Self::Purge,
            Some("auto-translate") => Self::AutoTranslate(args.collect()),
            Some(_) => return None,
        };
        Some(command)
    }
}

/// Logs to stderr through a non-blocking writer. Keep the guard alive.
fn init_tracing() -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("simplelocalize_sync=info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_target(false).init();
    guard
}

/// `None` unless both the API key and the project token are set.
fn credentials_from_env() -> Option<Credentials> {
    let api_key = std::env::var("SIMPLELOCALIZE_API_KEY").ok()?;
    let project_token = std::env::var("SIMPLELOCALIZE_PROJECT_TOKEN").ok()?;
    let credentials = Credentials::new(api_key, project_token);
    Some(match std::env::var("SIMPLELOCALIZE_PERSONAL_TOKEN") {
        Ok(personal_token) => credentials.with_personal_token(personal_token),
        Err(_) => credentials,
    })
}

/// Logs the project name and sizes.
fn log_summary(engine: &SyncEngine) {
    let keys = engine.translation_keys().len();
    match engine.project_snapshot() {
        Some(project) => tracing::info!(
            project = %project.name,
            languages = project.languages.len(),
            keys,
            unpublished_changes = project.unpublished_changes,
            "Project in sync"
        ),
        None => tracing::info!(keys, "No project details yet"),
    }
}

/// Runs `command` against a started engine.
async fn run(engine: &SyncEngine, command: Command) -> Result<(), SyncError> {
    match command {
        Command::Sync => {}
        Command::Activity => {
            engine.refresh_activity().await?;
            let activity = engine.activity();
            for item in &*activity {
                tracing::info!(kind = ?item.kind, running = item.running, created_at = ?item.created_at, "Activity");
            }
        }
        Command::Publish => engine.publish().await?,
        Command::Purge => return engine.purge(),
        Command::AutoTranslate(languages) => {
            let batch = engine.start_auto_translate(&languages);
            tokio::pin!(batch);
            let report = tokio::select! {
                report = &mut batch => report,
                _ = tokio::signal::ctrl_c() => {
                    engine.cancel_auto_translate();
                    batch.await
                }
            }?;
            tracing::info!(
                completed = ?report.completed,
                cancelled = report.cancelled,
                "Auto-translation finished"
            );
        }
    }
    log_summary(engine);
    Ok(())
}

/// Entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let _guard = init_tracing();

    let Some(command) = Command::parse(std::env::args().skip(1)) else {
        tracing::error!("Unknown command. Use sync, activity, publish, purge or auto-translate");
        return ExitCode::FAILURE;
    };

    let workspace_root = match std::env::current_dir() {
        Ok(root) => root,
        Err(error) => {
            tracing::error!(%error, "Cannot determine the workspace directory");
            return ExitCode::FAILURE;
        }
    };
    let mut config_manager = ConfigManager::new();
    if let Err(error) = config_manager.load_settings(Some(workspace_root)) {
        tracing::error!(%error, "Invalid configuration");
        return ExitCode::FAILURE;
    }
    let settings = config_manager.get_settings().clone();

    let Some(credentials) = credentials_from_env() else {
        tracing::error!("Set SIMPLELOCALIZE_API_KEY and SIMPLELOCALIZE_PROJECT_TOKEN");
        return ExitCode::FAILURE;
    };

    let cache_dir = config_manager.cache_dir();
    let connector = Arc::new(HttpConnector::new(&settings));
    let engine = SyncEngine::new(settings, cache_dir, connector);

    if let Err(error) = engine.start(credentials).await {
        tracing::error!(%error, "Synchronization failed");
        return ExitCode::FAILURE;
    }

    match run(&engine, command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "Command failed");
            ExitCode::FAILURE
        }
    }
}

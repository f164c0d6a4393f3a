//! Sequential auto-translation batches.
//!
//! The service runs one auto-translate job at a time, so languages are
//! submitted one by one and the runner waits until no job is running before
//! moving on.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::SyncError;
use crate::remote::ProjectApi;

/// Delays used while waiting for a submitted job.
#[derive(Debug, Clone, Copy)]
pub(crate) struct JobTimings {
    /// Wait after a submission before the first poll.
    pub(crate) settle: Duration,
    /// Wait between two polls of a job that is still running.
    pub(crate) poll: Duration,
}

/// What happened to a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoTranslateReport {
    /// Languages handed to the service, in submission order.
    pub submitted: Vec<String>,
    /// Languages whose job was observed to finish.
    pub completed: Vec<String>,
    /// The batch stopped before every language was submitted and finished.
    pub cancelled: bool,
}

/// Runs `languages` one at a time.
///
/// Fails with [`SyncError::Conflict`] before submitting anything if a job is
/// already running. Cancellation is honoured before every submission and
/// while waiting; a job already handed to the service keeps running there.
pub(crate) async fn run_batch(
    api: &dyn ProjectApi,
    languages: &[String],
    timings: JobTimings,
    cancel: &CancellationToken,
) -> Result<AutoTranslateReport, SyncError> {
    if !api.running_jobs().await?.is_empty() {
        return Err(SyncError::conflict("There are running jobs. Please wait for them to finish."));
    }

    let mut report = AutoTranslateReport::default();
    for language in languages {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }

        tracing::info!(language = %language, "Submitting auto-translation");
        api.start_auto_translation(std::slice::from_ref(language)).await?;
        report.submitted.push(language.clone());

        if !wait_until_idle(api, timings, cancel).await {
            report.cancelled = true;
            break;
        }
        tracing::info!(language = %language, "Auto-translation finished");
        report.completed.push(language.clone());
    }

    if report.cancelled {
        tracing::info!(submitted = report.submitted.len(), "Auto-translation cancelled");
    }
    Ok(report)
}

/// `false` when cancelled before the service reported idle.
async fn wait_until_idle(api: &dyn ProjectApi, timings: JobTimings, cancel: &CancellationToken) -> bool {
    if !sleep_unless_cancelled(timings.settle, cancel).await {
        return false;
    }
    loop {
        match api.running_jobs().await {
            Ok(jobs) if jobs.is_empty() => return true,
            Ok(jobs) => tracing::debug!(running = jobs.len(), "Waiting for auto-translation"),
            Err(error) => tracing::warn!(%error, "Polling running jobs failed"),
        }
        if !sleep_unless_cancelled(timings.poll, cancel).await {
            return false;
        }
    }
}

/// `false` if the token fired first.
pub(crate) async fn sleep_unless_cancelled(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}

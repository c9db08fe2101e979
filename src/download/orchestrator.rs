//! Background acquisition with durable bookkeeping and bounded retry.
//!
//! Each track with a non-terminal task has at most one worker. A worker
//! loops over attempts: wait for a free slot, resolve the stream, transfer
//! the bytes into a scoped file, then record the outcome. Failed attempts
//! are retried with exponential backoff until the attempt budget runs out;
//! `ContentNotFound` fails the task immediately.
//!
//! Every read-modify-write of a task row happens under that track's lock,
//! so two callers can never both observe "no live task" and start twice.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::{Semaphore, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::DownloadError;
use super::backoff::BackoffPolicy;
use super::fetch::{ByteSource, FetchError};
use super::storage::LocalStorage;
use super::store::TaskStore;
use super::task::{DownloadErrorKind, DownloadEvent, DownloadStatus, DownloadTask};
use crate::catalog::Catalog;
use crate::config::DownloadConfig;
use crate::events::EventSink;
use crate::extraction::{ResolutionRequest, RoutingHandle, StreamQuality, StreamResolver};
use crate::model::TrackId;

/// Progress is reported in steps of 1/PROGRESS_STEPS of the content length.
const PROGRESS_STEPS: u64 = 20;

/// Tunables for the orchestrator.
#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
    /// Bound on resolve + transfer for one attempt
    pub attempt_timeout: Duration,
    pub max_concurrent: usize,
    pub quality: StreamQuality,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self::from(&DownloadConfig::default())
    }
}

impl From<&DownloadConfig> for DownloadSettings {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.backoff(),
            attempt_timeout: config.attempt_timeout(),
            max_concurrent: config.max_concurrent.max(1),
            quality: config.quality,
        }
    }
}

/// Collaborators of the orchestrator.
pub struct DownloadDeps {
    pub catalog: Arc<dyn Catalog>,
    pub resolver: Arc<dyn StreamResolver>,
    pub source: Arc<dyn ByteSource>,
    pub storage: Arc<dyn LocalStorage>,
    pub store: Arc<dyn TaskStore>,
    pub sink: Arc<dyn EventSink>,
    pub routing: RoutingHandle,
}

/// A failed attempt: the recorded kind plus detail for the log.
#[derive(Debug)]
struct AttemptFailure {
    kind: DownloadErrorKind,
    detail: String,
}

impl AttemptFailure {
    fn new(kind: DownloadErrorKind, detail: impl ToString) -> Self {
        Self {
            kind,
            detail: detail.to_string(),
        }
    }
}

impl From<FetchError> for AttemptFailure {
    fn from(e: FetchError) -> Self {
        let kind = match e {
            FetchError::Rejected(429) => DownloadErrorKind::RateLimited,
            FetchError::Rejected(401) => DownloadErrorKind::Unauthorized,
            // An expired URL is resolved again on the next attempt
            FetchError::Network(_) | FetchError::Gone(_) | FetchError::Rejected(_) => {
                DownloadErrorKind::ProviderUnavailable
            }
        };
        Self::new(kind, e)
    }
}

struct Worker {
    id: u64,
    cancel: CancellationToken,
    /// Closed when the worker exits
    done: watch::Receiver<()>,
}

struct Inner {
    deps: DownloadDeps,
    settings: DownloadSettings,
    slots: Semaphore,
    track_locks: Mutex<HashMap<TrackId, Arc<tokio::sync::Mutex<()>>>>,
    workers: Mutex<HashMap<TrackId, Worker>>,
    next_worker: AtomicU64,
}

/// Drives download tasks to completion.
#[derive(Clone)]
pub struct DownloadOrchestrator {
    inner: Arc<Inner>,
}

impl DownloadOrchestrator {
    pub fn new(deps: DownloadDeps, settings: DownloadSettings) -> Self {
        let slots = Semaphore::new(settings.max_concurrent.max(1));
        Self {
            inner: Arc::new(Inner {
                deps,
                settings,
                slots,
                track_locks: Mutex::new(HashMap::new()),
                workers: Mutex::new(HashMap::new()),
                next_worker: AtomicU64::new(1),
            }),
        }
    }

    /// Queue `track_id` for download.
    ///
    /// Returns [`DownloadError::AlreadyInProgress`] (leaving the existing
    /// task untouched) when a non-terminal task exists. A terminal task is
    /// reset to `Queued`.
    pub async fn enqueue(&self, track_id: &TrackId) -> Result<DownloadTask, DownloadError> {
        if self.inner.deps.catalog.find_by_id(track_id).await?.is_none() {
            return Err(DownloadError::TrackNotFound(track_id.clone()));
        }

        let lock = self.inner.track_lock(track_id);
        let _guard = lock.lock().await;

        if let Some(existing) = self.inner.deps.store.get(track_id).await?
            && !existing.is_terminal()
        {
            debug!(target: "download", track = %track_id, status = %existing.status, "Already in progress");
            return Err(DownloadError::AlreadyInProgress(track_id.clone()));
        }

        let task = DownloadTask::new(track_id.clone());
        self.inner.deps.store.put(&task).await?;
        self.inner.emit(DownloadEvent::status(&task));
        info!(target: "download", track = %track_id, "Queued download");

        self.spawn_worker(track_id.clone(), None);
        Ok(task)
    }

    /// Re-enqueue a task that ended in `Failed`.
    pub async fn retry_failed(&self, track_id: &TrackId) -> Result<DownloadTask, DownloadError> {
        match self.inner.deps.store.get(track_id).await? {
            Some(task) if task.status == DownloadStatus::Failed => self.enqueue(track_id).await,
            Some(task) if !task.is_terminal() => Err(DownloadError::AlreadyInProgress(track_id.clone())),
            Some(task) => Err(DownloadError::NotResumable(track_id.clone(), task.status)),
            None => Err(DownloadError::NoTask(track_id.clone())),
        }
    }

    /// Reload persisted tasks after a restart and drive every non-terminal one.
    ///
    /// Tasks left `Running` by a previous process are moved to `Retrying`.
    /// Returns how many tasks were picked up.
    pub async fn recover(&self) -> Result<usize, DownloadError> {
        let tasks = self.inner.deps.store.load_all().await?;
        let mut resumed = 0;

        for task in tasks.into_iter().filter(|t| !t.is_terminal()) {
            if self.is_active(&task.track_id) {
                continue;
            }
            let task = if task.status == DownloadStatus::Running {
                self.inner
                    .update(&task.track_id, |t| t.transition(DownloadStatus::Retrying))
                    .await?
            } else {
                task
            };
            let wait = task
                .next_attempt_at
                .and_then(|at| (at - Utc::now()).to_std().ok());
            self.spawn_worker(task.track_id.clone(), wait);
            resumed += 1;
        }

        if resumed > 0 {
            info!(target: "download", "Recovered {} unfinished downloads", resumed);
        }
        Ok(resumed)
    }

    /// Stop the worker of `track_id`. The task is left `Retrying`.
    ///
    /// Returns `false` when no worker was running.
    pub async fn cancel(&self, track_id: &TrackId) -> bool {
        let worker = self
            .inner
            .workers
            .lock()
            .get(track_id)
            .map(|w| (w.cancel.clone(), w.done.clone()));
        let Some((cancel, mut done)) = worker else {
            return false;
        };
        cancel.cancel();
        // Wait for the worker to record the cancellation
        while done.changed().await.is_ok() {}
        true
    }

    /// Drive a non-terminal task that has no live worker (e.g. after [`cancel`]).
    ///
    /// Returns `false` when a worker is already running.
    ///
    /// [`cancel`]: Self::cancel
    pub async fn resume(&self, track_id: &TrackId) -> Result<bool, DownloadError> {
        let task = self
            .inner
            .deps
            .store
            .get(track_id)
            .await?
            .ok_or_else(|| DownloadError::NoTask(track_id.clone()))?;
        if task.is_terminal() {
            return Err(DownloadError::NotResumable(track_id.clone(), task.status));
        }
        if self.is_active(track_id) {
            return Ok(false);
        }
        self.spawn_worker(track_id.clone(), None);
        Ok(true)
    }

    pub async fn task(&self, track_id: &TrackId) -> Result<Option<DownloadTask>, DownloadError> {
        self.inner.deps.store.get(track_id).await
    }

    pub async fn tasks(&self) -> Result<Vec<DownloadTask>, DownloadError> {
        self.inner.deps.store.load_all().await
    }

    /// Whether a worker is currently driving `track_id`.
    pub fn is_active(&self, track_id: &TrackId) -> bool {
        self.inner.workers.lock().contains_key(track_id)
    }

    /// Wait until no worker drives `track_id`, then return its task.
    pub async fn wait(&self, track_id: &TrackId) -> Result<Option<DownloadTask>, DownloadError> {
        let done = self.inner.workers.lock().get(track_id).map(|w| w.done.clone());
        if let Some(mut done) = done {
            while done.changed().await.is_ok() {}
        }
        self.task(track_id).await
    }

    /// Cancel every worker; their tasks stay `Retrying` for the next [`recover`].
    ///
    /// [`recover`]: Self::recover
    pub async fn shutdown(&self) {
        let ids: Vec<TrackId> = self.inner.workers.lock().keys().cloned().collect();
        for id in ids {
            self.cancel(&id).await;
        }
    }

    fn spawn_worker(&self, track_id: TrackId, initial_wait: Option<Duration>) {
        let id = self.inner.next_worker.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(());

        self.inner.workers.lock().insert(
            track_id.clone(),
            Worker {
                id,
                cancel: cancel.clone(),
                done: done_rx,
            },
        );

        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.drive(&track_id, initial_wait, &cancel).await;
            let mut workers = inner.workers.lock();
            if workers.get(&track_id).is_some_and(|w| w.id == id) {
                workers.remove(&track_id);
            }
            drop(workers);
            drop(done_tx);
        });
    }
}

impl Inner {
    fn track_lock(&self, track_id: &TrackId) -> Arc<tokio::sync::Mutex<()>> {
        self.track_locks.lock().entry(track_id.clone()).or_default().clone()
    }

    fn emit(&self, event: DownloadEvent) {
        self.deps.sink.notify(event.into());
    }

    /// Read-modify-write a task under its track lock, then publish it.
    async fn update<F>(&self, track_id: &TrackId, f: F) -> Result<DownloadTask, DownloadError>
    where
        F: FnOnce(&mut DownloadTask),
    {
        let lock = self.track_lock(track_id);
        let _guard = lock.lock().await;
        let mut task = self
            .deps
            .store
            .get(track_id)
            .await?
            .ok_or_else(|| DownloadError::NoTask(track_id.clone()))?;
        f(&mut task);
        self.deps.store.put(&task).await?;
        self.emit(DownloadEvent::status(&task));
        Ok(task)
    }

    /// Worker loop for one track.
    async fn drive(&self, track_id: &TrackId, initial_wait: Option<Duration>, cancel: &CancellationToken) {
        if let Err(e) = self.drive_inner(track_id, initial_wait, cancel).await {
            error!(target: "download", track = %track_id, "Download bookkeeping failed: {}", e);
        }
    }

    async fn drive_inner(
        &self,
        track_id: &TrackId,
        initial_wait: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError> {
        let mut wait = initial_wait;

        loop {
            if let Some(delay) = wait.take() {
                tokio::select! {
                    _ = cancel.cancelled() => return self.mark_cancelled(track_id).await,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let permit = tokio::select! {
                _ = cancel.cancelled() => return self.mark_cancelled(track_id).await,
                permit = self.slots.acquire() => permit,
            };
            let Ok(_permit) = permit else {
                return Ok(());
            };

            let task = self
                .update(track_id, |t| {
                    t.attempts += 1;
                    t.transition(DownloadStatus::Running);
                })
                .await?;
            debug!(target: "download", track = %track_id, attempt = task.attempts, "Download attempt started");

            let outcome = tokio::select! {
                _ = cancel.cancelled() => Err(AttemptFailure::new(DownloadErrorKind::Cancelled, "cancelled")),
                result = tokio::time::timeout(self.settings.attempt_timeout, self.attempt(track_id)) => {
                    result.unwrap_or_else(|_| Err(AttemptFailure::new(
                        DownloadErrorKind::ProviderUnavailable,
                        format!("attempt timed out after {:?}", self.settings.attempt_timeout),
                    )))
                }
            };

            match outcome {
                Ok(path) => {
                    self.update(track_id, |t| {
                        t.last_error = None;
                        t.transition(DownloadStatus::Succeeded);
                    })
                    .await?;
                    info!(target: "download", track = %track_id, path = ?path, "Download complete");
                    return Ok(());
                }
                Err(failure) if failure.kind == DownloadErrorKind::Cancelled => {
                    return self.mark_cancelled(track_id).await;
                }
                Err(failure) => {
                    let exhausted = task.attempts >= self.settings.max_attempts;
                    if failure.kind.is_fatal() || exhausted {
                        self.update(track_id, |t| {
                            t.last_error = Some(failure.kind);
                            t.transition(DownloadStatus::Failed);
                        })
                        .await?;
                        error!(
                            target: "download",
                            track = %track_id,
                            attempts = task.attempts,
                            kind = %failure.kind,
                            "Download failed: {}",
                            failure.detail
                        );
                        return Ok(());
                    }

                    let delay = self.settings.backoff.delay(task.attempts);
                    self.update(track_id, |t| {
                        t.last_error = Some(failure.kind);
                        t.transition(DownloadStatus::Retrying);
                        t.next_attempt_at = chrono::Duration::from_std(delay).ok().map(|d| Utc::now() + d);
                    })
                    .await?;
                    warn!(
                        target: "download",
                        track = %track_id,
                        attempt = task.attempts,
                        retry_in = ?delay,
                        "Download attempt failed: {}",
                        failure.detail
                    );
                    wait = Some(delay);
                }
            }
        }
    }

    async fn mark_cancelled(&self, track_id: &TrackId) -> Result<(), DownloadError> {
        self.update(track_id, |t| {
            t.last_error = Some(DownloadErrorKind::Cancelled);
            t.transition(DownloadStatus::Retrying);
        })
        .await?;
        info!(target: "download", track = %track_id, "Download cancelled");
        Ok(())
    }

    /// One resolve + transfer cycle. Dropping the future discards the partial file.
    async fn attempt(&self, track_id: &TrackId) -> Result<PathBuf, AttemptFailure> {
        let track = self
            .deps
            .catalog
            .find_by_id(track_id)
            .await
            .map_err(|e| AttemptFailure::new(DownloadErrorKind::StorageFailure, e))?
            .ok_or_else(|| AttemptFailure::new(DownloadErrorKind::TrackNotFound, "track left the catalog"))?;

        let request = ResolutionRequest::download(
            track.source.clone(),
            self.deps.routing.current(),
            self.settings.quality,
        );
        let stream = self
            .deps
            .resolver
            .resolve(&request)
            .await
            .map_err(|e| AttemptFailure::new(DownloadErrorKind::from(&e), e))?;

        let mut body = self.deps.source.open(&stream).await?;
        let mut file = self
            .deps
            .storage
            .create(&track, stream.format)
            .await
            .map_err(|e| AttemptFailure::new(DownloadErrorKind::StorageFailure, e))?;

        let mut written: u64 = 0;
        let mut reported_step = 0;
        while let Some(chunk) = body.chunks.next().await {
            let chunk = chunk?;
            file.write(&chunk)
                .await
                .map_err(|e| AttemptFailure::new(DownloadErrorKind::StorageFailure, e))?;
            written += chunk.len() as u64;

            if let Some(total) = body.len.filter(|t| *t > 0) {
                let step = (written.min(total) * PROGRESS_STEPS) / total;
                if step > reported_step {
                    reported_step = step;
                    self.emit(DownloadEvent::Progress {
                        track_id: track_id.clone(),
                        bytes: written,
                        total: Some(total),
                    });
                }
            }
        }

        if let Some(total) = body.len
            && written < total
        {
            return Err(AttemptFailure::new(
                DownloadErrorKind::ProviderUnavailable,
                format!("stream ended after {written} of {total} bytes"),
            ));
        }
        if body.len.is_none() {
            self.emit(DownloadEvent::Progress {
                track_id: track_id.clone(),
                bytes: written,
                total: None,
            });
        }

        let path = file
            .commit()
            .await
            .map_err(|e| AttemptFailure::new(DownloadErrorKind::StorageFailure, e))?;

        if let Err(e) = self.deps.catalog.update_local_content(track_id, &path).await {
            // Keep "local content set iff downloaded" true
            let _ = tokio::fs::remove_file(&path).await;
            return Err(AttemptFailure::new(DownloadErrorKind::StorageFailure, e));
        }

        Ok(path)
    }
}

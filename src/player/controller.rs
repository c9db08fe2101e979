//! Playback controller.
//!
//! A single actor task owns the session (queue, state, stream cache) and
//! applies commands one at a time, so a user skip can never race an
//! in-flight recovery. Resolution runs as the actor's *pending load*: a
//! future polled alongside the command channel. Replacing the queue,
//! skipping or stopping drops that future, which cancels the resolution.
//!
//! ```text
//!   set_queue / skip / auto-advance
//!   Idle ───────────► Loading ───────► Playing ◄──► Paused
//!                        │   ▲            │
//!        resolution      │   │ stream     │
//!        exhausted       ▼   │ failure    │
//!                      Error ◄────────────┘ (re-resolution failed)
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::engine::AudioEngine;
use super::queue::{Advance, PlayQueue, RepeatMode};
use super::state::{PlaybackError, PlaybackEvent, PlaybackSnapshot, PlaybackSource, PlaybackState};
use crate::catalog::Catalog;
use crate::config::PlaybackConfig;
use crate::events::EventSink;
use crate::extraction::{ResolutionRequest, ResolvedStream, RoutingHandle, StreamQuality, StreamResolver};
use crate::model::TrackId;

/// Pending commands before callers wait for the actor.
const COMMAND_CAPACITY: usize = 32;

/// Tunables for the controller.
#[derive(Debug, Clone)]
pub struct PlaybackSettings {
    pub quality: StreamQuality,
    /// Extra resolution attempts when a position starts
    pub resolution_retries: u32,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self::from(&PlaybackConfig::default())
    }
}

impl From<&PlaybackConfig> for PlaybackSettings {
    fn from(config: &PlaybackConfig) -> Self {
        Self {
            quality: config.quality,
            resolution_retries: config.resolution_retries,
        }
    }
}

/// Collaborators of the controller.
pub struct PlaybackDeps {
    pub catalog: Arc<dyn Catalog>,
    pub resolver: Arc<dyn StreamResolver>,
    pub engine: Arc<dyn AudioEngine>,
    pub sink: Arc<dyn EventSink>,
    pub routing: RoutingHandle,
}

#[derive(Debug)]
enum Command {
    SetQueue { tracks: Vec<TrackId>, start: usize },
    Play,
    Pause,
    SkipNext,
    SkipPrevious,
    Stop,
    Seek(Duration),
    SetRepeat(RepeatMode),
    SetShuffle(bool),
    TrackFinished,
    StreamFailed,
}

struct Request {
    command: Command,
    reply: oneshot::Sender<Result<(), PlaybackError>>,
}

/// Handle to the playback actor. Cheap to clone; the actor stops when
/// every handle is dropped.
#[derive(Clone)]
pub struct PlaybackController {
    tx: mpsc::Sender<Request>,
    snapshot: watch::Receiver<PlaybackSnapshot>,
}

impl PlaybackController {
    /// Start the actor on the current runtime.
    pub fn spawn(deps: PlaybackDeps, settings: PlaybackSettings) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let (snapshot_tx, snapshot) = watch::channel(PlaybackSnapshot::default());
        let actor = Actor {
            deps,
            settings,
            rx,
            snapshot_tx,
            queue: PlayQueue::new(),
            state: PlaybackState::Idle,
            cache: HashMap::new(),
            source: None,
            consecutive_failures: 0,
            pending: None,
            last_emitted: (PlaybackState::Idle, None),
        };
        tokio::spawn(actor.run());
        Self { tx, snapshot }
    }

    async fn send(&self, command: Command) -> Result<(), PlaybackError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Request { command, reply })
            .await
            .map_err(|_| PlaybackError::ControllerClosed)?;
        response.await.map_err(|_| PlaybackError::ControllerClosed)?
    }

    /// Replace the session and start loading `start`.
    pub async fn set_queue(&self, tracks: Vec<TrackId>, start: usize) -> Result<(), PlaybackError> {
        self.send(Command::SetQueue { tracks, start }).await
    }

    /// Resume from `Paused`, or retry the current position from `Error`.
    pub async fn play(&self) -> Result<(), PlaybackError> {
        self.send(Command::Play).await
    }

    pub async fn pause(&self) -> Result<(), PlaybackError> {
        self.send(Command::Pause).await
    }

    pub async fn skip_next(&self) -> Result<(), PlaybackError> {
        self.send(Command::SkipNext).await
    }

    pub async fn skip_previous(&self) -> Result<(), PlaybackError> {
        self.send(Command::SkipPrevious).await
    }

    /// Drop the session and return to `Idle`.
    pub async fn stop(&self) -> Result<(), PlaybackError> {
        self.send(Command::Stop).await
    }

    /// Seek within the current track, re-resolving an expired stream first.
    pub async fn seek(&self, position: Duration) -> Result<(), PlaybackError> {
        self.send(Command::Seek(position)).await
    }

    pub async fn set_repeat(&self, mode: RepeatMode) -> Result<(), PlaybackError> {
        self.send(Command::SetRepeat(mode)).await
    }

    pub async fn set_shuffle(&self, enabled: bool) -> Result<(), PlaybackError> {
        self.send(Command::SetShuffle(enabled)).await
    }

    /// The engine reached the end of the current track.
    pub async fn track_finished(&self) -> Result<(), PlaybackError> {
        self.send(Command::TrackFinished).await
    }

    /// The engine lost the current stream mid-playback.
    pub async fn report_stream_failure(&self) -> Result<(), PlaybackError> {
        self.send(Command::StreamFailed).await
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Follow snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshot.clone()
    }
}

// ============================================================================
// Actor
// ============================================================================

/// Why a position is being loaded.
#[derive(Debug, Clone, Copy, PartialEq)]
enum LoadKind {
    /// The position becomes current; counts as a play
    Start,
    /// The stream failed mid-playback; exactly one re-resolution
    Recover { paused: bool },
    /// Seek needed a fresh stream
    Seek { position: Duration, paused: bool },
}

type LoadResult = Result<PlaybackSource, String>;

struct PendingLoad {
    index: usize,
    kind: LoadKind,
    future: BoxFuture<'static, LoadResult>,
}

enum Wake {
    Request(Option<Request>),
    Loaded(LoadResult),
}

struct Actor {
    deps: PlaybackDeps,
    settings: PlaybackSettings,
    rx: mpsc::Receiver<Request>,
    snapshot_tx: watch::Sender<PlaybackSnapshot>,
    queue: PlayQueue,
    state: PlaybackState,
    /// Resolved streams per queue position
    cache: HashMap<usize, ResolvedStream>,
    source: Option<PlaybackSource>,
    consecutive_failures: usize,
    pending: Option<PendingLoad>,
    last_emitted: (PlaybackState, Option<usize>),
}

async fn next_loaded(pending: &mut Option<PendingLoad>) -> LoadResult {
    match pending {
        Some(p) => p.future.as_mut().await,
        None => std::future::pending().await,
    }
}

impl Actor {
    async fn run(mut self) {
        loop {
            let wake = tokio::select! {
                request = self.rx.recv() => Wake::Request(request),
                result = next_loaded(&mut self.pending), if self.pending.is_some() => Wake::Loaded(result),
            };

            match wake {
                Wake::Request(Some(Request { command, reply })) => {
                    debug!(target: "player", ?command, "Command");
                    let result = self.handle(command).await;
                    let _ = reply.send(result);
                }
                Wake::Request(None) => break,
                Wake::Loaded(result) => {
                    if let Some(pending) = self.pending.take() {
                        self.finish_load(pending.index, pending.kind, result).await;
                    }
                }
            }
            self.publish();
        }

        self.pending = None;
        if let Err(e) = self.deps.engine.stop() {
            debug!(target: "player", "Engine stop on shutdown: {}", e);
        }
    }

    async fn handle(&mut self, command: Command) -> Result<(), PlaybackError> {
        match command {
            Command::SetQueue { tracks, start } => self.set_queue(tracks, start),
            Command::Play => self.play(),
            Command::Pause => self.pause(),
            Command::SkipNext => self.skip(|queue| queue.skip_forward(Advance::Manual)),
            Command::SkipPrevious => self.skip(PlayQueue::previous),
            Command::Stop => {
                self.clear_session();
                Ok(())
            }
            Command::Seek(position) => self.seek(position),
            Command::SetRepeat(mode) => {
                self.queue.set_repeat(mode);
                Ok(())
            }
            Command::SetShuffle(enabled) => {
                self.queue.set_shuffle(enabled);
                Ok(())
            }
            Command::TrackFinished => self.track_finished(),
            Command::StreamFailed => self.stream_failed().await,
        }
    }

    fn set_queue(&mut self, tracks: Vec<TrackId>, start: usize) -> Result<(), PlaybackError> {
        if tracks.is_empty() {
            return Err(PlaybackError::QueueEmpty);
        }
        if start >= tracks.len() {
            return Err(PlaybackError::IndexOutOfRange {
                index: start,
                len: tracks.len(),
            });
        }

        let (repeat, shuffle) = (self.queue.repeat(), self.queue.shuffle());
        self.clear_session();
        self.queue = PlayQueue::with_tracks(tracks, start, repeat, shuffle);
        info!(target: "player", tracks = self.queue.len(), start, "Queue replaced");
        self.start_load(start, LoadKind::Start);
        Ok(())
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        match self.state {
            PlaybackState::Idle => Err(PlaybackError::InvalidState(self.state)),
            PlaybackState::Loading | PlaybackState::Playing => Ok(()),
            PlaybackState::Paused => {
                self.deps.engine.play()?;
                self.set_state(PlaybackState::Playing);
                Ok(())
            }
            PlaybackState::Error => {
                let index = self.queue.current_index().ok_or(PlaybackError::QueueEmpty)?;
                self.consecutive_failures = 0;
                self.start_load(index, LoadKind::Start);
                Ok(())
            }
        }
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        match self.state {
            PlaybackState::Playing => {
                self.deps.engine.pause()?;
                self.set_state(PlaybackState::Paused);
                Ok(())
            }
            PlaybackState::Paused => Ok(()),
            state => Err(PlaybackError::InvalidState(state)),
        }
    }

    fn skip<F>(&mut self, step: F) -> Result<(), PlaybackError>
    where
        F: FnOnce(&mut PlayQueue) -> Option<usize>,
    {
        if self.queue.is_empty() {
            return Err(PlaybackError::QueueEmpty);
        }
        let index = step(&mut self.queue).ok_or(PlaybackError::QueueEmpty)?;
        self.consecutive_failures = 0;
        self.start_load(index, LoadKind::Start);
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> Result<(), PlaybackError> {
        if !self.state.has_audio() {
            return Err(PlaybackError::InvalidState(self.state));
        }
        let index = self.queue.current_index().ok_or(PlaybackError::QueueEmpty)?;

        let expired = matches!(&self.source, Some(PlaybackSource::Stream(stream)) if stream.is_expired());
        if !expired {
            self.deps.engine.seek(position)?;
            return Ok(());
        }

        debug!(target: "player", index, "Stream expired, re-resolving before seek");
        self.cache.remove(&index);
        let paused = self.state == PlaybackState::Paused;
        self.start_load(index, LoadKind::Seek { position, paused });
        Ok(())
    }

    fn track_finished(&mut self) -> Result<(), PlaybackError> {
        if self.state != PlaybackState::Playing {
            return Err(PlaybackError::InvalidState(self.state));
        }
        match self.queue.skip_forward(Advance::Natural) {
            Some(index) => {
                self.consecutive_failures = 0;
                self.start_load(index, LoadKind::Start);
            }
            None => {
                info!(target: "player", "End of queue");
                self.clear_session();
            }
        }
        Ok(())
    }

    async fn stream_failed(&mut self) -> Result<(), PlaybackError> {
        if !self.state.has_audio() {
            return Err(PlaybackError::InvalidState(self.state));
        }
        let index = self.queue.current_index().ok_or(PlaybackError::QueueEmpty)?;
        self.cache.remove(&index);

        if self.source.as_ref().is_some_and(PlaybackSource::is_local) {
            self.fail_position(index, "local file failed during playback".to_string())
                .await;
        } else {
            warn!(target: "player", index, "Stream failed mid-playback, re-resolving");
            let paused = self.state == PlaybackState::Paused;
            self.start_load(index, LoadKind::Recover { paused });
        }
        Ok(())
    }

    /// Drop the session: cancel any pending load, stop the engine, go idle.
    fn clear_session(&mut self) {
        self.pending = None;
        if self.state.has_audio()
            && let Err(e) = self.deps.engine.stop()
        {
            warn!(target: "player", "Engine stop failed: {}", e);
        }
        let (repeat, shuffle) = (self.queue.repeat(), self.queue.shuffle());
        self.queue = PlayQueue::with_tracks(Vec::new(), 0, repeat, shuffle);
        self.cache.clear();
        self.source = None;
        self.consecutive_failures = 0;
        self.set_state(PlaybackState::Idle);
    }

    /// Make `index` current and begin resolving it. Any previous pending
    /// load is cancelled.
    fn start_load(&mut self, index: usize, kind: LoadKind) {
        let Some(track_id) = self.queue.items().get(index).cloned() else {
            return;
        };
        if kind == LoadKind::Start
            && self.state.has_audio()
            && let Err(e) = self.deps.engine.stop()
        {
            warn!(target: "player", "Engine stop failed: {}", e);
        }
        self.queue.jump_to(index);
        self.source = None;

        let cached = match kind {
            LoadKind::Recover { .. } => None,
            _ => self.cache.get(&index).filter(|s| !s.is_expired()).cloned(),
        };
        let attempts = match kind {
            LoadKind::Recover { .. } => 1,
            _ => 1 + self.settings.resolution_retries,
        };

        let future = load_source(
            self.deps.catalog.clone(),
            self.deps.resolver.clone(),
            track_id,
            cached,
            self.deps.routing.clone(),
            self.settings.quality,
            attempts,
        )
        .boxed();

        self.pending = Some(PendingLoad { index, kind, future });
        self.set_state(PlaybackState::Loading);
    }

    async fn finish_load(&mut self, index: usize, kind: LoadKind, result: LoadResult) {
        let source = match result {
            Ok(source) => source,
            Err(e) => return self.fail_position(index, e).await,
        };

        let (start, paused) = match kind {
            LoadKind::Seek { position, paused } => (position, paused),
            LoadKind::Recover { paused } => (Duration::ZERO, paused),
            LoadKind::Start => (Duration::ZERO, false),
        };
        let engine = &self.deps.engine;
        let started = engine
            .load(&source, start)
            .and_then(|()| if paused { Ok(()) } else { engine.play() });
        if let Err(e) = started {
            return self.fail_position(index, e.to_string()).await;
        }

        if let PlaybackSource::Stream(stream) = &source {
            self.cache.insert(index, stream.clone());
        }
        self.source = Some(source);
        self.consecutive_failures = 0;

        if kind == LoadKind::Start
            && let Some(track_id) = self.queue.items().get(index)
            && let Err(e) = self.deps.catalog.increment_play(track_id, chrono::Utc::now()).await
        {
            warn!(target: "player", track = %track_id, "Failed to record play: {}", e);
        }

        self.set_state(if paused {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        });
    }

    /// Give up on `index`, then auto-advance unless the whole queue has
    /// failed in a row.
    async fn fail_position(&mut self, index: usize, error: String) {
        self.source = None;
        self.cache.remove(&index);
        self.consecutive_failures += 1;
        if self.state.has_audio()
            && let Err(e) = self.deps.engine.stop()
        {
            debug!(target: "player", "Engine stop failed: {}", e);
        }
        self.set_state(PlaybackState::Error);

        if let Some(track_id) = self.queue.items().get(index).cloned() {
            warn!(target: "player", index, track = %track_id, "Playback failed: {}", error);
            self.deps.sink.notify(
                PlaybackEvent::TrackFailed {
                    index,
                    track_id,
                    error,
                }
                .into(),
            );
        }

        if self.consecutive_failures >= self.queue.len() {
            warn!(target: "player", failures = self.consecutive_failures, "Every queue entry failed, stopping");
            return;
        }
        if let Some(next) = self.queue.skip_forward(Advance::Manual) {
            self.start_load(next, LoadKind::Start);
        }
    }

    fn set_state(&mut self, state: PlaybackState) {
        self.state = state;
        let index = self.queue.current_index();
        if self.last_emitted == (state, index) {
            return;
        }
        self.last_emitted = (state, index);
        self.deps.sink.notify(
            PlaybackEvent::StateChanged {
                state,
                index,
                track_id: self.queue.current().cloned(),
            }
            .into(),
        );
        self.publish();
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(PlaybackSnapshot {
            state: self.state,
            queue: self.queue.items().to_vec(),
            index: self.queue.current_index(),
            repeat: self.queue.repeat(),
            shuffle: self.queue.shuffle(),
            source: self.source.clone(),
        });
    }
}

/// Resolve what to play for `track_id`: the local copy if there is one,
/// else a still-valid cached stream, else up to `attempts` resolutions.
async fn load_source(
    catalog: Arc<dyn Catalog>,
    resolver: Arc<dyn StreamResolver>,
    track_id: TrackId,
    cached: Option<ResolvedStream>,
    routing: RoutingHandle,
    quality: StreamQuality,
    attempts: u32,
) -> LoadResult {
    let track = catalog
        .find_by_id(&track_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("track {track_id} is not in the catalog"))?;

    if let Some(path) = track.local_content {
        return Ok(PlaybackSource::Local(path));
    }
    if let Some(stream) = cached {
        return Ok(PlaybackSource::Stream(stream));
    }

    let request = ResolutionRequest::playback(track.source.clone(), routing.current(), quality);
    let mut last_error = String::from("no resolution attempted");
    for attempt in 1..=attempts.max(1) {
        match resolver.resolve(&request).await {
            Ok(stream) => return Ok(PlaybackSource::Stream(stream)),
            Err(e) => {
                debug!(target: "player", track = %track_id, attempt, "Resolution failed: {}", e);
                last_error = e.to_string();
            }
        }
    }
    Err(last_error)
}

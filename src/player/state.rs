//! Playback state, snapshots and events.

use std::path::PathBuf;
use std::time::Duration;

use super::engine::EngineError;
use super::queue::RepeatMode;
use crate::extraction::ResolvedStream;
use crate::model::TrackId;

/// Playback state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// No queue
    #[default]
    Idle,
    /// Resolving the current position
    Loading,
    Playing,
    Paused,
    /// Resolution exhausted for the current position
    Error,
}

impl PlaybackState {
    /// The engine holds audio only while playing or paused.
    pub fn has_audio(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

/// What the engine is given to play.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackSource {
    /// A downloaded copy
    Local(PathBuf),
    Stream(ResolvedStream),
}

impl PlaybackSource {
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

/// Point-in-time view of the controller.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    pub queue: Vec<TrackId>,
    pub index: Option<usize>,
    pub repeat: RepeatMode,
    pub shuffle: bool,
    /// Source of the current position, once loaded
    pub source: Option<PlaybackSource>,
}

impl PlaybackSnapshot {
    pub fn current_track(&self) -> Option<&TrackId> {
        self.index.and_then(|i| self.queue.get(i))
    }
}

/// Errors returned by playback commands
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlaybackError {
    #[error("Command not valid while {0:?}")]
    InvalidState(PlaybackState),

    #[error("Queue is empty or at its end")]
    QueueEmpty,

    #[error("Start index {index} out of range for a queue of {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Audio engine: {0}")]
    Engine(#[from] EngineError),

    #[error("Playback controller has shut down")]
    ControllerClosed,
}

/// Observable playback change.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    StateChanged {
        state: PlaybackState,
        index: Option<usize>,
        track_id: Option<TrackId>,
    },
    /// A position could not be played and was given up on
    TrackFailed {
        index: usize,
        track_id: TrackId,
        error: String,
    },
}

/// Format a duration as MM:SS or HH:MM:SS.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}

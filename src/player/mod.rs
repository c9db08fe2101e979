//! Playback: queue, state machine and the audio engine seam.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 PlaybackController (handle)                     │
//! │      set_queue / play / pause / skip / seek / stop             │
//! └────────────────────────────┬────────────────────────────────────┘
//!                              │ tokio mpsc + oneshot replies
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Controller actor task                       │
//! │  Owns queue + stream cache, resolves on demand, emits events   │
//! └────────────────────────────┬────────────────────────────────────┘
//!                              │ AudioEngine (crossbeam channel)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Output thread                            │
//! │            Decodes and plays; owned by the embedder             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod controller;
pub mod engine;
mod queue;
mod state;

pub use controller::{PlaybackController, PlaybackDeps, PlaybackSettings};
pub use engine::{AudioEngine, ChannelEngine, EngineCommand, EngineError};
pub use queue::{Advance, PlayQueue, RepeatMode};
pub use state::{PlaybackError, PlaybackEvent, PlaybackSnapshot, PlaybackSource, PlaybackState, format_duration};

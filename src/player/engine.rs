//! Audio engine seam.
//!
//! The controller decides *what* plays; an [`AudioEngine`] makes the sound.
//! [`ChannelEngine`] forwards commands over a bounded crossbeam channel to
//! an output thread owned by the embedding application.

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use super::state::PlaybackSource;

/// Errors from the audio engine
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Engine rejected source: {0}")]
    Rejected(String),

    #[error("Audio output is gone")]
    Disconnected,

    #[error("Audio output is not keeping up")]
    Busy,
}

/// Output side of playback.
pub trait AudioEngine: Send + Sync {
    /// Prepare `source` for playback at `start`.
    fn load(&self, source: &PlaybackSource, start: Duration) -> Result<(), EngineError>;
    fn play(&self) -> Result<(), EngineError>;
    fn pause(&self) -> Result<(), EngineError>;
    fn stop(&self) -> Result<(), EngineError>;
    fn seek(&self, position: Duration) -> Result<(), EngineError>;
}

/// Commands sent to the output thread.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    Load { source: PlaybackSource, start: Duration },
    Play,
    Pause,
    Stop,
    Seek(Duration),
}

/// Engine that forwards commands to an output thread.
#[derive(Debug, Clone)]
pub struct ChannelEngine {
    tx: Sender<EngineCommand>,
}

impl ChannelEngine {
    /// Create an engine and the receiver for the output thread.
    pub fn new(capacity: usize) -> (Self, Receiver<EngineCommand>) {
        let (tx, rx) = bounded(capacity.max(1));
        (Self { tx }, rx)
    }

    fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        self.tx.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => EngineError::Busy,
            TrySendError::Disconnected(_) => EngineError::Disconnected,
        })
    }
}

impl AudioEngine for ChannelEngine {
    fn load(&self, source: &PlaybackSource, start: Duration) -> Result<(), EngineError> {
        self.send(EngineCommand::Load {
            source: source.clone(),
            start,
        })
    }

    fn play(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::Play)
    }

    fn pause(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::Pause)
    }

    fn stop(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::Stop)
    }

    fn seek(&self, position: Duration) -> Result<(), EngineError> {
        self.send(EngineCommand::Seek(position))
    }
}

/// Mock implementations for testing.
#[cfg(test)]
pub mod mocks {
    use parking_lot::Mutex;

    use super::*;

    /// Records commands; `load` can be told to reject.
    #[derive(Default)]
    pub struct RecordingEngine {
        pub commands: Mutex<Vec<EngineCommand>>,
        pub reject_loads: Mutex<bool>,
    }

    impl RecordingEngine {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn commands(&self) -> Vec<EngineCommand> {
            self.commands.lock().clone()
        }

        pub fn loads(&self) -> Vec<PlaybackSource> {
            self.commands
                .lock()
                .iter()
                .filter_map(|c| match c {
                    EngineCommand::Load { source, .. } => Some(source.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    impl AudioEngine for RecordingEngine {
        fn load(&self, source: &PlaybackSource, start: Duration) -> Result<(), EngineError> {
            if *self.reject_loads.lock() {
                return Err(EngineError::Rejected("unsupported".into()));
            }
            self.commands.lock().push(EngineCommand::Load {
                source: source.clone(),
                start,
            });
            Ok(())
        }

        fn play(&self) -> Result<(), EngineError> {
            self.commands.lock().push(EngineCommand::Play);
            Ok(())
        }

        fn pause(&self) -> Result<(), EngineError> {
            self.commands.lock().push(EngineCommand::Pause);
            Ok(())
        }

        fn stop(&self) -> Result<(), EngineError> {
            self.commands.lock().push(EngineCommand::Stop);
            Ok(())
        }

        fn seek(&self, position: Duration) -> Result<(), EngineError> {
            self.commands.lock().push(EngineCommand::Seek(position));
            Ok(())
        }
    }
}

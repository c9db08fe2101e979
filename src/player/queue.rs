//! Play queue management.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::model::TrackId;

/// Repeat mode for the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    /// Repeat entire queue
    All,
    /// Repeat current track
    One,
}

/// Why the queue moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The current track played to its end
    Natural,
    /// User skip or auto-advance after a failure
    Manual,
}

/// The play queue with current position tracking.
///
/// Shuffle never reorders `items`: it walks a derived permutation, so
/// going back retraces the same order.
#[derive(Debug, Clone)]
pub struct PlayQueue {
    items: Vec<TrackId>,
    /// Current position in the queue (-1 = not started)
    position: i32,
    shuffle: bool,
    /// Shuffled indices (maps shuffle position → item index)
    shuffle_order: Vec<usize>,
    /// Current position in shuffle_order when shuffling
    shuffle_position: i32,
    repeat: RepeatMode,
}

impl Default for PlayQueue {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            position: -1,
            shuffle: false,
            shuffle_order: Vec::new(),
            shuffle_position: -1,
            repeat: RepeatMode::Off,
        }
    }
}

impl PlayQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue positioned at `start`, with the given modes.
    ///
    /// With shuffle on, `start` is the first entry of the shuffle order.
    pub fn with_tracks(items: Vec<TrackId>, start: usize, repeat: RepeatMode, shuffle: bool) -> Self {
        let mut queue = Self {
            items,
            repeat,
            ..Self::default()
        };
        if start < queue.items.len() {
            queue.position = start as i32;
        }
        queue.set_shuffle(shuffle);
        queue
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[TrackId] {
        &self.items
    }

    /// Get current position (index into items).
    pub fn current_index(&self) -> Option<usize> {
        if self.position >= 0 && (self.position as usize) < self.items.len() {
            Some(self.position as usize)
        } else {
            None
        }
    }

    pub fn current(&self) -> Option<&TrackId> {
        self.current_index().and_then(|i| self.items.get(i))
    }

    /// Advance and return the new index, or `None` at the end of the queue
    /// (repeat off), leaving the position unchanged.
    ///
    /// `RepeatMode::One` replays the current track only on a natural
    /// advance; a manual skip moves on and wraps.
    pub fn skip_forward(&mut self, advance: Advance) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }

        if self.repeat == RepeatMode::One && advance == Advance::Natural {
            if self.position < 0 {
                self.position = 0;
            }
            return self.current_index();
        }
        let wrap = self.repeat != RepeatMode::Off;

        if self.shuffle && !self.shuffle_order.is_empty() {
            return self.skip_forward_shuffle(wrap);
        }

        let next = self.position + 1;
        if next as usize >= self.items.len() {
            if !wrap {
                return None;
            }
            self.position = 0;
        } else {
            self.position = next;
        }
        self.current_index()
    }

    fn skip_forward_shuffle(&mut self, wrap: bool) -> Option<usize> {
        let next = self.shuffle_position + 1;
        if next as usize >= self.shuffle_order.len() {
            if !wrap {
                return None;
            }
            // New pass, new order
            self.position = -1;
            self.generate_shuffle_order();
            self.shuffle_position = 0;
        } else {
            self.shuffle_position = next;
        }
        self.position = self.shuffle_order[self.shuffle_position as usize] as i32;
        self.current_index()
    }

    /// Step back and return the new index, or `None` at the start of the
    /// queue (repeat off), leaving the position unchanged.
    pub fn previous(&mut self) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }
        let wrap = self.repeat != RepeatMode::Off;

        if self.shuffle && !self.shuffle_order.is_empty() {
            let prev = self.shuffle_position - 1;
            if prev < 0 {
                if !wrap {
                    return None;
                }
                self.shuffle_position = self.shuffle_order.len() as i32 - 1;
            } else {
                self.shuffle_position = prev;
            }
            self.position = self.shuffle_order[self.shuffle_position as usize] as i32;
            return self.current_index();
        }

        let prev = self.position - 1;
        if prev < 0 {
            if !wrap {
                return None;
            }
            self.position = self.items.len() as i32 - 1;
        } else {
            self.position = prev;
        }
        self.current_index()
    }

    /// Jump to a specific position.
    pub fn jump_to(&mut self, index: usize) -> Option<usize> {
        if index >= self.items.len() {
            return None;
        }
        self.position = index as i32;
        if self.shuffle
            && let Some(shuffle_pos) = self.shuffle_order.iter().position(|&i| i == index)
        {
            self.shuffle_position = shuffle_pos as i32;
        }
        self.current_index()
    }

    /// Set shuffle mode.
    pub fn set_shuffle(&mut self, enabled: bool) {
        self.shuffle = enabled;
        if enabled {
            self.generate_shuffle_order();
        } else {
            self.shuffle_order.clear();
            self.shuffle_position = -1;
        }
    }

    /// Generate a new shuffle order, keeping the current track first.
    fn generate_shuffle_order(&mut self) {
        let len = self.items.len();
        if len == 0 {
            self.shuffle_order.clear();
            self.shuffle_position = -1;
            return;
        }

        let mut indices: Vec<usize> = (0..len).collect();
        indices.shuffle(&mut rand::rng());

        if let Some(current) = self.current_index() {
            if let Some(pos) = indices.iter().position(|&i| i == current) {
                indices.remove(pos);
                indices.insert(0, current);
            }
            self.shuffle_position = 0;
        } else {
            self.shuffle_position = -1;
        }

        self.shuffle_order = indices;
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn set_repeat(&mut self, mode: RepeatMode) {
        self.repeat = mode;
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }
}

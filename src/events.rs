//! Observable state events.
//!
//! The download orchestrator and the playback controller report every
//! state transition to an [`EventSink`]. Notification is fire-and-forget:
//! a sink must never block the caller, and a failing or absent consumer
//! never fails the operation that emitted the event.

use tokio::sync::mpsc;

use crate::download::DownloadEvent;
use crate::player::PlaybackEvent;

/// Any observable event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Download(DownloadEvent),
    Playback(PlaybackEvent),
}

impl From<DownloadEvent> for Event {
    fn from(e: DownloadEvent) -> Self {
        Event::Download(e)
    }
}

impl From<PlaybackEvent> for Event {
    fn from(e: PlaybackEvent) -> Self {
        Event::Playback(e)
    }
}

/// Receiver of state events.
pub trait EventSink: Send + Sync {
    fn notify(&self, event: Event);
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn notify(&self, event: Event) {
        match event {
            Event::Download(DownloadEvent::Progress { .. }) => {
                tracing::debug!(target: "events", ?event, "Download progress");
            }
            Event::Download(e) => tracing::info!(target: "events", event = ?e, "Download"),
            Event::Playback(e) => tracing::info!(target: "events", event = ?e, "Playback"),
        }
    }
}

/// Forwards events into an unbounded channel; dropped receivers are ignored.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn notify(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

/// Sends each event to every inner sink.
pub struct FanoutSink(pub Vec<std::sync::Arc<dyn EventSink>>);

impl EventSink for FanoutSink {
    fn notify(&self, event: Event) {
        for sink in &self.0 {
            sink.notify(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::DownloadStatus;
    use crate::model::TrackId;
    use std::sync::Arc;

    fn status_event() -> Event {
        Event::Download(DownloadEvent::Status {
            track_id: TrackId::from("t1"),
            status: DownloadStatus::Queued,
            attempts: 0,
            error: None,
        })
    }

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (sink, mut rx) = ChannelSink::new();
        sink.notify(status_event());
        assert_eq!(rx.recv().await, Some(status_event()));
    }

    #[test]
    fn test_channel_sink_ignores_closed_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.notify(status_event());
    }

    #[tokio::test]
    async fn test_fanout_reaches_all() {
        let (a, mut rx_a) = ChannelSink::new();
        let (b, mut rx_b) = ChannelSink::new();
        let fanout = FanoutSink(vec![Arc::new(a), Arc::new(b), Arc::new(TracingSink)]);
        fanout.notify(status_event());
        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.recv().await.is_some());
    }
}

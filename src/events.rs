//! Filter events.
//!
//! A filter never returns errors from its worker thread; it reports them,
//! along with state changes and newly exposed streams, on a broadcast
//! channel. Receivers work from both async code ([`EventReceiver::recv`])
//! and plain threads ([`EventReceiver::blocking_recv`],
//! [`EventReceiver::try_recv`]).

use crate::element::FilterState;
use crate::error::{Error, ErrorKind};
use std::fmt;
use tokio::sync::broadcast;

/// Events emitted by a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterEvent {
    /// Lifecycle state changed.
    StateChanged {
        /// Emitting filter.
        filter: String,
        /// Previous state.
        from: FilterState,
        /// New state.
        to: FilterState,
    },
    /// An output port was created for a track.
    StreamAdded {
        /// Emitting filter.
        filter: String,
        /// Track carried by the port.
        track_id: u32,
        /// Port name.
        port: String,
        /// Whether a downstream peer was linked.
        linked: bool,
    },
    /// All output ports are negotiated; frames will follow.
    Ready {
        /// Emitting filter.
        filter: String,
    },
    /// Processing failed and the worker paused.
    Error {
        /// Emitting filter.
        filter: String,
        /// Error classification.
        kind: ErrorKind,
        /// Human readable description.
        message: String,
    },
    /// The input is exhausted and EOS was pushed to every port.
    Eos {
        /// Emitting filter.
        filter: String,
    },
}

impl fmt::Display for FilterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterEvent::StateChanged { filter, from, to } => {
                write!(f, "{}: state {} -> {}", filter, from, to)
            }
            FilterEvent::StreamAdded {
                filter,
                track_id,
                port,
                linked,
            } => write!(
                f,
                "{}: stream {} on {}{}",
                filter,
                track_id,
                port,
                if *linked { "" } else { " (unlinked)" }
            ),
            FilterEvent::Ready { filter } => write!(f, "{}: ready", filter),
            FilterEvent::Error {
                filter,
                kind,
                message,
            } => write!(f, "{}: {:?} error: {}", filter, kind, message),
            FilterEvent::Eos { filter } => write!(f, "{}: EOS", filter),
        }
    }
}

/// Sending half of a filter's event channel.
#[derive(Clone)]
pub struct EventSender {
    sender: broadcast::Sender<FilterEvent>,
}

impl EventSender {
    /// Create a new event sender with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Send an event.
    ///
    /// Returns the number of receivers that got it; 0 without subscribers.
    pub fn send(&self, event: FilterEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Send an error event.
    pub fn send_error(&self, filter: &str, error: &Error) {
        self.send(FilterEvent::Error {
            filter: filter.to_string(),
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    /// Send a state change event.
    pub fn send_state_changed(&self, filter: &str, from: FilterState, to: FilterState) {
        self.send(FilterEvent::StateChanged {
            filter: filter.to_string(),
            from,
            to,
        });
    }

    /// Send an EOS event.
    pub fn send_eos(&self, filter: &str) {
        self.send(FilterEvent::Eos {
            filter: filter.to_string(),
        });
    }

    /// Create a receiver. It sees events sent from now on.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for EventSender {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Receiving half of a filter's event channel.
pub struct EventReceiver {
    receiver: broadcast::Receiver<FilterEvent>,
}

impl EventReceiver {
    /// Receive the next event.
    ///
    /// Returns `None` once the sender is gone. Events dropped because the
    /// receiver lagged are skipped.
    pub async fn recv(&mut self) -> Option<FilterEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Blocking variant of [`recv`](Self::recv) for non-async threads.
    ///
    /// # Panics
    ///
    /// Panics when called from within an async runtime.
    pub fn blocking_recv(&mut self) -> Option<FilterEvent> {
        loop {
            match self.receiver.blocking_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive an event without blocking.
    pub fn try_recv(&mut self) -> Option<FilterEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Wait for EOS or an error event.
    ///
    /// Returns `Ok(())` on EOS and the error kind and message on error.
    pub async fn wait_eos(&mut self) -> Result<(), (ErrorKind, String)> {
        while let Some(event) = self.recv().await {
            match event {
                FilterEvent::Eos { .. } => return Ok(()),
                FilterEvent::Error { kind, message, .. } => return Err((kind, message)),
                _ => continue,
            }
        }
        Err((ErrorKind::Unknown, "event channel closed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_get_events() {
        let sender = EventSender::new(8);
        let mut first = sender.subscribe();
        let mut second = sender.subscribe();

        assert_eq!(
            sender.send(FilterEvent::Ready {
                filter: "demux".into()
            }),
            2
        );
        assert!(matches!(first.recv().await, Some(FilterEvent::Ready { .. })));
        assert!(matches!(second.try_recv(), Some(FilterEvent::Ready { .. })));
        assert!(second.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_wait_eos_reports_errors() {
        let sender = EventSender::default();
        let mut rx = sender.subscribe();
        sender.send_state_changed("demux", FilterState::Null, FilterState::ParseHeader);
        sender.send_error("demux", &Error::UnsupportedFormat("wav".into()));

        let (kind, message) = rx.wait_eos().await.unwrap_err();
        assert_eq!(kind, ErrorKind::UnsupportedFormat);
        assert!(message.contains("wav"));

        sender.send_eos("demux");
        assert!(rx.wait_eos().await.is_ok());
    }

    #[test]
    fn test_send_without_subscribers() {
        let sender = EventSender::new(0);
        let delivered = sender.send(FilterEvent::Eos {
            filter: "demux".into(),
        });
        assert_eq!(delivered, 0);
    }

    #[test]
    fn test_display() {
        let event = FilterEvent::StreamAdded {
            filter: "demux".into(),
            track_id: 2,
            port: "video_2".into(),
            linked: false,
        };
        assert_eq!(event.to_string(), "demux: stream 2 on video_2 (unlinked)");
    }
}

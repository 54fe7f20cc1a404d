//! Connectivity events and the physical-link boundary
//!
//! Link state changes arrive from an external collaborator (Wi-Fi or
//! Ethernet management). Rather than invoking lifecycle transitions from a
//! notification handler, events are pushed onto a single-consumer channel
//! that the lifecycle coordinator drains. This avoids re-entrancy between
//! the event source and the state machine.

use tokio::sync::mpsc;
use tracing::trace;

/// Capacity of the coordinator's event channel. Link flaps are rare; a
/// small bound is plenty.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Events consumed by the lifecycle coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// The physical link came up.
    LinkUp,
    /// The physical link went down.
    LinkDown,
    /// An operator requested shutdown.
    QuitRequested,
}

/// A handle to the physical-link interface the tunnel rides on.
///
/// Bring-up of the underlying interface is out of scope; this is the
/// reference the virtual interface attaches to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInterface {
    name: String,
}

impl LinkInterface {
    /// Create a handle for the named interface.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Interface name (e.g. `wlan0`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Cloneable producer side of the coordinator's event channel.
///
/// Held by the link-event source, the IPC handler, the signal handler, and
/// the receive loop (for fatal-error escalation). Sends after the
/// coordinator has stopped are silently dropped; a late event has nobody
/// left to act on it.
#[derive(Debug, Clone)]
pub struct LinkEventSender {
    tx: mpsc::Sender<LinkEvent>,
}

impl LinkEventSender {
    /// Send a raw event.
    pub fn send(&self, event: LinkEvent) {
        if self.tx.try_send(event).is_err() {
            trace!("dropping {:?}: coordinator is gone or channel full", event);
        }
    }

    /// Notify that the link came up.
    pub fn link_up(&self) {
        self.send(LinkEvent::LinkUp);
    }

    /// Notify that the link went down.
    pub fn link_down(&self) {
        self.send(LinkEvent::LinkDown);
    }

    /// Request shutdown. Safe to call more than once; only the first has
    /// observable effect.
    pub fn request_quit(&self) {
        self.send(LinkEvent::QuitRequested);
    }
}

/// Create the event channel: a cloneable sender and the coordinator's
/// receiver.
#[must_use]
pub fn event_channel() -> (LinkEventSender, mpsc::Receiver<LinkEvent>) {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    (LinkEventSender { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (tx, mut rx) = event_channel();
        tx.link_up();
        tx.link_down();
        tx.request_quit();

        assert_eq!(rx.recv().await, Some(LinkEvent::LinkUp));
        assert_eq!(rx.recv().await, Some(LinkEvent::LinkDown));
        assert_eq!(rx.recv().await, Some(LinkEvent::QuitRequested));
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped_is_harmless() {
        let (tx, rx) = event_channel();
        drop(rx);
        // Must not panic or block.
        tx.request_quit();
        tx.link_up();
    }

    #[test]
    fn test_link_interface_name() {
        let link = LinkInterface::new("wlan0");
        assert_eq!(link.name(), "wlan0");
    }
}

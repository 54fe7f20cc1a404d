//! IPC command handler
//!
//! Translates control commands into reads of the coordinator's shared
//! state or a quit event. The handler never mutates lifecycle state
//! directly; a quit is acknowledged immediately and performed by the
//! coordinator on its own task.

use std::sync::Arc;

use tracing::info;

use super::protocol::{IpcCommand, IpcResponse, StatusInfo};
use crate::lifecycle::CoordinatorState;
use crate::link::LinkEventSender;
use crate::stats::TrafficCounter;
use crate::VERSION;

/// Handler for IPC commands.
pub struct IpcHandler {
    state: Arc<CoordinatorState>,
    counter: Arc<TrafficCounter>,
    events: LinkEventSender,
}

impl IpcHandler {
    /// Create a new handler over the coordinator's observable state.
    #[must_use]
    pub fn new(
        state: Arc<CoordinatorState>,
        counter: Arc<TrafficCounter>,
        events: LinkEventSender,
    ) -> Self {
        Self {
            state,
            counter,
            events,
        }
    }

    /// Handle a single command.
    pub async fn handle(&self, command: IpcCommand) -> IpcResponse {
        match command {
            IpcCommand::Ping => IpcResponse::Pong,
            IpcCommand::Status => IpcResponse::Status(self.status()),
            IpcCommand::Quit => {
                info!("Quit requested via IPC");
                self.events.request_quit();
                IpcResponse::success_with_message("shutting down")
            }
        }
    }

    fn status(&self) -> StatusInfo {
        StatusInfo {
            version: VERSION.to_string(),
            phase: self.state.phase().name().to_string(),
            connected: self.state.is_connected(),
            rx_bytes_total: self.counter.total(),
            rx_bytes_pending: self.counter.pending(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Phase;
    use crate::link::{event_channel, LinkEvent};

    fn handler_with_channel() -> (IpcHandler, tokio::sync::mpsc::Receiver<LinkEvent>) {
        let state = Arc::new(CoordinatorState::default());
        let counter = Arc::new(TrafficCounter::new());
        counter.add(2048);
        let (tx, rx) = event_channel();
        (IpcHandler::new(state, counter, tx), rx)
    }

    #[tokio::test]
    async fn test_ping() {
        let (handler, _rx) = handler_with_channel();
        let resp = handler.handle(IpcCommand::Ping).await;
        assert!(matches!(resp, IpcResponse::Pong));
    }

    #[tokio::test]
    async fn test_status_reflects_counters() {
        let (handler, _rx) = handler_with_channel();
        let resp = handler.handle(IpcCommand::Status).await;
        match resp {
            IpcResponse::Status(s) => {
                assert_eq!(s.phase, Phase::Initializing.name());
                assert!(!s.connected);
                assert_eq!(s.rx_bytes_total, 2048);
                assert_eq!(s.rx_bytes_pending, 2048);
            }
            other => panic!("expected status, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_quit_sends_event_and_acknowledges() {
        let (handler, mut rx) = handler_with_channel();
        let resp = handler.handle(IpcCommand::Quit).await;
        assert!(!resp.is_error());
        assert_eq!(rx.recv().await, Some(LinkEvent::QuitRequested));
    }
}

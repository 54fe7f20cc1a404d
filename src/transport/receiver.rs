//! The inbound receive loop
//!
//! A dedicated task that blocks on the UDP socket with no timeout and
//! forwards every datagram into the tunnel engine. Cancellation is abrupt:
//! the lifecycle coordinator aborts the task and closes the socket rather
//! than draining cooperatively. A cancellation point checked between
//! iterations would never fire while the task sits inside the receive
//! call, so the socket itself is the cancellation mechanism.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

use super::endpoint::TransportEndpoint;
use crate::device::TunnelDevice;
use crate::engine::TunnelEngine;
use crate::error::TransportError;
use crate::link::LinkEventSender;
use crate::packet::PacketView;
use crate::stats::TrafficCounter;

/// Fixed capacity of the receive buffer, reused across iterations.
pub const RECV_BUFFER_SIZE: usize = 2048;

/// Handle to a running receive-loop task.
///
/// States: not started (no value exists), running, stopping (after
/// [`stop`](Self::stop) begins), stopped (task joined). A socket-level
/// receive error is the only condition under which the loop terminates on
/// its own; it escalates to full shutdown through the event channel.
pub struct ReceiveLoop {
    handle: JoinHandle<()>,
    stopping: Arc<AtomicBool>,
}

impl ReceiveLoop {
    /// Spawn the receive loop on the endpoint's socket.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the endpoint was already closed.
    pub fn spawn(
        endpoint: &TransportEndpoint,
        device: Arc<TunnelDevice>,
        engine: Arc<dyn TunnelEngine>,
        counter: Arc<TrafficCounter>,
        events: LinkEventSender,
    ) -> Result<Self, TransportError> {
        let socket = endpoint.socket()?;
        let stopping = Arc::new(AtomicBool::new(false));
        let task_stopping = Arc::clone(&stopping);

        let handle = tokio::spawn(async move {
            run(socket, device, engine, counter, events, task_stopping).await;
        });

        debug!("receive loop started");
        Ok(Self { handle, stopping })
    }

    /// Whether the task has already exited on its own.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Forcibly stop the loop.
    ///
    /// Aborts the task even if it is blocked inside the receive call, then
    /// waits for it to wind down. The caller closes the endpoint right
    /// after; the two teardowns are always paired.
    pub async fn stop(self) {
        self.stopping.store(true, Ordering::Release);
        self.handle.abort();
        match self.handle.await {
            Ok(()) => debug!("receive loop exited before cancellation"),
            Err(e) if e.is_cancelled() => debug!("receive loop cancelled"),
            Err(e) => error!("receive loop task failed: {}", e),
        }
        info!("receive loop stopped");
    }
}

/// Loop body: block for the next datagram, count it, hand it to the engine.
async fn run(
    socket: Arc<UdpSocket>,
    device: Arc<TunnelDevice>,
    engine: Arc<dyn TunnelEngine>,
    counter: Arc<TrafficCounter>,
    events: LinkEventSender,
    stopping: Arc<AtomicBool>,
) {
    let mut buf = [0u8; RECV_BUFFER_SIZE];

    loop {
        match socket.recv_from(&mut buf).await {
            Ok((n, peer)) => {
                counter.add(n);
                trace!("received a UDP packet: size {} from {}", n, peer);

                let SocketAddr::V4(peer) = peer else {
                    // IPv4-only deployment; nothing else can arrive here.
                    continue;
                };

                let packet = PacketView::new(&buf[..n]);
                // Engine failures are the engine's concern; the next
                // datagram is still awaited.
                engine
                    .deliver_inbound(&device, packet, *peer.ip(), peer.port())
                    .await;
            }
            Err(e) => {
                if stopping.load(Ordering::Acquire) {
                    debug!("receive loop: socket closed during shutdown");
                } else {
                    error!("UDP receive error, shutting down: {}", e);
                    events.request_quit();
                }
                return;
            }
        }
    }
}

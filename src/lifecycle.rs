//! Lifecycle coordination of the tunnel data path
//!
//! The coordinator is the single writer of the pipeline's lifetime: it
//! waits for connectivity, starts the receive loop and stats reporter,
//! waits for a quit request, and tears everything down. Link events and
//! quit requests arrive on one single-consumer channel, so state
//! transitions never run re-entrantly from a notification handler.
//!
//! Link-down does not stop a running pipeline; flapping is tolerated and
//! only an explicit quit tears the data path down. A quit always tears
//! down the UDP services if they were ever started, regardless of the
//! connectivity flag at that moment.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::device::TunnelDevice;
use crate::engine::{EngineTimer, TunnelEngine};
use crate::error::WgBridgeError;
use crate::link::{LinkEvent, LinkEventSender};
use crate::stats::{StatsReporter, TrafficCounter};
use crate::transport::{ReceiveLoop, TransportEndpoint};

/// Coordinator phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    /// Setting up interfaces and the engine.
    Initializing = 0,
    /// Waiting for the physical link to come up.
    AwaitingConnection = 1,
    /// Pipeline started.
    Running = 2,
    /// Quit accepted, teardown in progress.
    Quitting = 3,
    /// Teardown complete.
    Stopped = 4,
}

impl Phase {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::AwaitingConnection,
            2 => Self::Running,
            3 => Self::Quitting,
            4 => Self::Stopped,
            _ => Self::Initializing,
        }
    }

    /// Human-readable phase name for status reporting.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::AwaitingConnection => "awaiting-connection",
            Self::Running => "running",
            Self::Quitting => "quitting",
            Self::Stopped => "stopped",
        }
    }
}

/// Shared view of the coordinator's state, readable from the IPC handler
/// while the coordinator itself runs.
#[derive(Debug)]
pub struct CoordinatorState {
    phase: AtomicU8,
    connected: AtomicBool,
}

impl Default for CoordinatorState {
    fn default() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Initializing as u8),
            connected: AtomicBool::new(false),
        }
    }
}

impl CoordinatorState {
    fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Whether the link is currently considered up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn set_phase(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }
}

/// The UDP services started per connected period. The endpoint's socket
/// is valid exactly while the receive loop is runnable; the two are
/// created and destroyed together.
struct UdpServices {
    endpoint: Arc<TransportEndpoint>,
    rx_loop: ReceiveLoop,
    stats: StatsReporter,
}

/// The top-level lifecycle state machine.
pub struct Coordinator {
    device: Arc<TunnelDevice>,
    engine: Arc<dyn TunnelEngine>,
    counter: Arc<TrafficCounter>,
    timer: Option<EngineTimer>,
    events: mpsc::Receiver<LinkEvent>,
    events_tx: LinkEventSender,
    state: Arc<CoordinatorState>,
    listen_port: u16,
    stats_interval: Duration,
}

impl Coordinator {
    /// Create the coordinator.
    ///
    /// `events` is the single-consumer channel all link and quit events
    /// arrive on; `events_tx` is retained so the receive loop can escalate
    /// fatal socket errors. `timer` is the running engine timer, stopped
    /// during teardown.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        device: Arc<TunnelDevice>,
        engine: Arc<dyn TunnelEngine>,
        counter: Arc<TrafficCounter>,
        timer: Option<EngineTimer>,
        events: mpsc::Receiver<LinkEvent>,
        events_tx: LinkEventSender,
        listen_port: u16,
        stats_interval: Duration,
    ) -> Self {
        Self {
            device,
            engine,
            counter,
            timer,
            events,
            events_tx,
            state: Arc::new(CoordinatorState::new()),
            listen_port,
            stats_interval,
        }
    }

    /// A shared handle to the coordinator's observable state.
    #[must_use]
    pub fn state_handle(&self) -> Arc<CoordinatorState> {
        Arc::clone(&self.state)
    }

    /// Run the state machine to completion.
    ///
    /// Consumes events until a quit request (or the channel closing, which
    /// is treated the same), then tears the pipeline down.
    ///
    /// # Errors
    ///
    /// Returns the startup error if binding the transport endpoint fails
    /// on link-up; teardown of anything already started still runs first.
    pub async fn run(mut self) -> Result<(), WgBridgeError> {
        self.state.set_phase(Phase::AwaitingConnection);
        info!("Waiting for network connection...");

        let mut services: Option<UdpServices> = None;
        let mut fatal: Option<WgBridgeError> = None;

        loop {
            let event = self.events.recv().await;
            match event {
                Some(LinkEvent::LinkUp) => {
                    self.state.set_connected(true);
                    if services.is_some() {
                        debug!("link up while pipeline already running");
                        self.state.set_phase(Phase::Running);
                        continue;
                    }
                    info!("Network connected");
                    match self.start_udp_services().await {
                        Ok(started) => {
                            services = Some(started);
                            self.state.set_phase(Phase::Running);
                        }
                        Err(e) => {
                            error!("Failed to start UDP services: {}", e);
                            fatal = Some(e);
                            break;
                        }
                    }
                }
                Some(LinkEvent::LinkDown) => {
                    if self.state.is_connected() {
                        info!("Network disconnected");
                    } else {
                        info!("Waiting for network to be connected");
                    }
                    self.state.set_connected(false);
                    // The pipeline keeps running through link flaps; only
                    // an explicit quit stops it.
                    if services.is_some() {
                        self.state.set_phase(Phase::AwaitingConnection);
                    }
                }
                Some(LinkEvent::QuitRequested) | None => {
                    info!("Quit requested");
                    break;
                }
            }
        }

        self.state.set_phase(Phase::Quitting);
        info!("Stopping wg-bridge...");

        if let Some(services) = services.take() {
            Self::stop_udp_services(&self.device, services).await;
        }
        if let Some(timer) = self.timer.take() {
            timer.stop();
        }

        self.state.set_phase(Phase::Stopped);
        info!("Shutdown complete");

        match fatal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Bind the transport endpoint and start the receive loop and stats
    /// reporter. The engine is asked to begin its outbound session once
    /// the socket exists; a failure there is retried by the engine timer
    /// and does not abort startup.
    async fn start_udp_services(&self) -> Result<UdpServices, WgBridgeError> {
        info!("Starting UDP service on port {}...", self.listen_port);

        let endpoint = Arc::new(TransportEndpoint::bind_tunnel_port(self.listen_port)?);
        self.device.set_endpoint(Arc::clone(&endpoint));

        let rx_loop = match ReceiveLoop::spawn(
            &endpoint,
            Arc::clone(&self.device),
            Arc::clone(&self.engine),
            Arc::clone(&self.counter),
            self.events_tx.clone(),
        ) {
            Ok(rx_loop) => rx_loop,
            Err(e) => {
                // A half-started pipeline must not leave the bound socket
                // installed on the device.
                self.device.clear_endpoint();
                endpoint.close();
                return Err(e.into());
            }
        };
        let stats = StatsReporter::spawn(Arc::clone(&self.counter), self.stats_interval);

        if let Err(e) = self.engine.connect(&self.device).await {
            debug!("engine connect deferred: {}", e);
        }

        Ok(UdpServices {
            endpoint,
            rx_loop,
            stats,
        })
    }

    /// Stop the stats reporter, forcibly stop the receive loop (the task
    /// may be blocked in the receive call), then close the socket.
    async fn stop_udp_services(device: &TunnelDevice, services: UdpServices) {
        info!("Stopping UDP service...");

        services.stats.stop();
        services.rx_loop.stop().await;
        device.clear_endpoint();
        services.endpoint.close();
    }
}

//! wg-bridge: WireGuard tunnel data-path bridge
//!
//! This crate bridges a userspace WireGuard engine to a UDP socket: it
//! receives encrypted datagrams from the network, hands them to the engine
//! for decryption, and carries outbound IP packets from a virtual tunnel
//! interface back through the engine onto the wire.
//!
//! # Features
//!
//! - **Receive loop**: dedicated task pumping datagrams from the tunnel
//!   socket into the engine
//! - **Virtual interface send path**: per-packet validation and handoff of
//!   outbound IP packets
//! - **Lifecycle coordination**: link-driven startup and forced teardown of
//!   the data path
//! - **Traffic stats**: periodic throughput reporting from an atomic counter
//! - **IPC Control**: Unix socket-based runtime control
//!
//! # Architecture
//!
//! ```text
//! UDP socket → receive loop → engine (decrypt) → tunnel interface
//! tunnel interface → engine (encrypt) → UDP socket → peer
//!                        ↑
//!               lifecycle coordinator
//!          (link events, quit, stats, timer)
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use wg_bridge::config::load_config;
//! use wg_bridge::device::TunnelDevice;
//! use wg_bridge::engine::WireGuardEngine;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("/etc/wg-bridge/config.json")?;
//!
//! let device = Arc::new(TunnelDevice::new(
//!     config.tunnel.address,
//!     config.tunnel.netmask,
//! ));
//! let engine = Arc::new(WireGuardEngine::new(&config.tunnel)?);
//!
//! // Wire up the coordinator and run...
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration types and loading
//! - [`device`]: Tunnel device and virtual interface send path
//! - [`engine`]: Tunnel engine trait, WireGuard adapter, and timer
//! - [`error`]: Error types
//! - [`ipc`]: IPC server and protocol
//! - [`lifecycle`]: Lifecycle coordinator
//! - [`link`]: Connectivity events
//! - [`packet`]: IP packet views
//! - [`stats`]: Traffic accounting and reporting
//! - [`transport`]: UDP endpoint and receive loop

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod lifecycle;
pub mod link;
pub mod packet;
pub mod stats;
pub mod transport;

// Re-export commonly used types at the crate root
pub use config::{Config, ListenConfig, TunnelConfig};
pub use device::{SendVerdict, TunnelDevice, VirtualTunIface};
pub use engine::{TunnelEngine, WireGuardEngine};
pub use error::{
    BridgeError, ConfigError, EngineError, IpcError, TransportError, WgBridgeError,
};
pub use ipc::{IpcClient, IpcCommand, IpcResponse, IpcServer};
pub use lifecycle::{Coordinator, CoordinatorState, Phase};
pub use link::{event_channel, LinkEvent, LinkEventSender};
pub use stats::{StatsReporter, TrafficCounter};
pub use transport::{ReceiveLoop, TransportEndpoint, WG_PORT};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}

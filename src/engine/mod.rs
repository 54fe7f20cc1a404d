//! Tunnel engine boundary
//!
//! The engine implements the encrypted-tunnel protocol state machine:
//! handshakes, session keys, packet encryption and decryption. The bridge
//! treats it as an external collaborator behind the [`TunnelEngine`] trait;
//! the receive loop feeds it raw datagrams, the virtual-interface send path
//! feeds it plaintext packets, and a periodic timer drives its
//! retransmission and keepalive machinery.

mod timer;
pub mod wireguard;

#[cfg(test)]
pub(crate) mod testing;

use std::net::Ipv4Addr;

use async_trait::async_trait;

pub use timer::{EngineTimer, ENGINE_TIMER_PERIOD_MS};
pub use wireguard::WireGuardEngine;

use crate::device::TunnelDevice;
use crate::error::EngineError;
use crate::packet::PacketView;

/// The tunnel-protocol engine as seen by the data path.
///
/// `deliver_inbound` and `deliver_outbound` are assumed non-blocking and
/// bounded; the receive loop calls them inline between datagrams.
#[async_trait]
pub trait TunnelEngine: Send + Sync {
    /// Hand a received transport datagram to the engine for decryption or
    /// handshake processing. Failures are the engine's concern; no result
    /// is consumed by the data path.
    async fn deliver_inbound(
        &self,
        device: &TunnelDevice,
        packet: PacketView<'_>,
        src_addr: Ipv4Addr,
        src_port: u16,
    );

    /// Hand an outbound plaintext packet to the engine for encryption and
    /// transmission through the device's transport endpoint.
    ///
    /// # Errors
    ///
    /// Engine errors are per-packet; the send path logs and drops, never
    /// escalates.
    async fn deliver_outbound(
        &self,
        device: &TunnelDevice,
        packet: PacketView<'_>,
        dst_addr: Ipv4Addr,
    ) -> Result<(), EngineError>;

    /// Begin an outbound session with the configured peer. Called by the
    /// coordinator once the transport endpoint exists.
    ///
    /// # Errors
    ///
    /// A failure here is retried by the engine timer, not by the caller.
    async fn connect(&self, device: &TunnelDevice) -> Result<(), EngineError> {
        let _ = device;
        Ok(())
    }

    /// Periodic timer entry point for retransmission and keepalive.
    async fn tick(&self, device: &TunnelDevice);
}

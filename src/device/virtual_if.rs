//! Virtual-interface send path
//!
//! Invoked synchronously whenever the virtual tunnel interface has an
//! outbound network-layer packet ready to leave the tunnel. The packet is
//! validated, its destination is read from the IPv4 header, and it is
//! handed to the tunnel engine for encryption and transmission. The
//! caller's buffer is borrowed for the duration of the call only; nothing
//! is retained on any branch.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::TunnelDevice;
use crate::engine::TunnelEngine;
use crate::error::BridgeError;
use crate::packet::{ipv4_destination, ipv4_source, PacketView};

/// Default MTU of the virtual tunnel interface.
pub const WIREGUARD_MTU: usize = 1420;

/// Ceiling on a single outbound packet. Anything larger is dropped
/// without forwarding.
pub const MAX_TUN_PACKET: usize = 4096;

/// Capacity of the decrypted-inbound channel. A slow consumer sheds
/// packets rather than backpressuring the receive loop.
const INBOUND_CHANNEL_CAPACITY: usize = 64;

/// Verdict returned to the virtual-interface layer after a send.
///
/// `Continue` tells the caller the packet has been fully consumed by this
/// path, whether it was forwarded or dropped by the size guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendVerdict {
    /// Processing is complete; the caller releases the packet.
    Continue,
}

/// The decrypted-side interface of the tunnel.
pub struct VirtualTunIface {
    name: String,
    device: Arc<TunnelDevice>,
    engine: Arc<dyn TunnelEngine>,
}

impl VirtualTunIface {
    /// Create the interface over the given device and engine.
    ///
    /// Also returns the decrypted-inbound receiver: the engine hands
    /// decrypted packets to the device, which forwards them onto this
    /// channel for the network-layer consumer.
    #[must_use]
    pub fn new(
        device: Arc<TunnelDevice>,
        engine: Arc<dyn TunnelEngine>,
    ) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        device.set_inbound_sink(tx);
        (
            Self {
                name: "zwg0".into(),
                device,
                engine,
            },
            rx,
        )
    }

    /// Interface name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Forward an outbound network-layer packet into the tunnel.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotAttached`] when the device has no physical
    /// link, and [`BridgeError::Truncated`] for packets too short to carry
    /// an IPv4 header. Both are per-packet: the caller drops the packet
    /// and the pipeline keeps running.
    pub async fn send(&self, packet: &[u8]) -> Result<SendVerdict, BridgeError> {
        if !self.device.is_attached() {
            return Err(BridgeError::NotAttached);
        }

        let r = packet.len();
        if r > MAX_TUN_PACKET {
            debug!("dropping oversized outbound packet ({} bytes)", r);
            return Ok(SendVerdict::Continue);
        }

        let dst = ipv4_destination(packet).ok_or(BridgeError::Truncated { len: r })?;
        trace!(
            "sending a VPN message: size {} from {:?} to {}",
            r,
            ipv4_source(packet),
            dst
        );

        let view = PacketView::new(packet);
        if let Err(e) = self.engine.deliver_outbound(&self.device, view, dst).await {
            // Per-packet: the engine's failure does not stop the pipeline.
            debug!("outbound delivery to {} failed: {}", dst, e);
        }

        Ok(SendVerdict::Continue)
    }
}

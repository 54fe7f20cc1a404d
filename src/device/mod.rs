//! Tunnel device handle and the virtual-interface bridge
//!
//! The [`TunnelDevice`] is the join point between the tunnel engine, the
//! transport endpoint, and the two network interfaces: the physical link
//! the encrypted datagrams travel on and the virtual interface carrying
//! the decrypted side. One instance is created at startup and lives for
//! the whole process; the lifecycle coordinator is its only writer, the
//! receive loop and send path read it.

mod virtual_if;

use std::net::Ipv4Addr;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{info, trace};

pub use virtual_if::{SendVerdict, VirtualTunIface, MAX_TUN_PACKET, WIREGUARD_MTU};

use crate::link::LinkInterface;
use crate::transport::TransportEndpoint;

/// Process-wide handle binding the physical link, the virtual tunnel
/// interface's address, and the transport endpoint together.
#[derive(Debug)]
pub struct TunnelDevice {
    address: Ipv4Addr,
    netmask: Ipv4Addr,
    link: RwLock<Option<LinkInterface>>,
    endpoint: RwLock<Option<Arc<TransportEndpoint>>>,
    inbound: RwLock<Option<mpsc::Sender<Vec<u8>>>>,
}

impl TunnelDevice {
    /// Create the device with the local tunnel address and netmask.
    /// The values are assumed already validated by configuration loading.
    #[must_use]
    pub fn new(address: Ipv4Addr, netmask: Ipv4Addr) -> Self {
        Self {
            address,
            netmask,
            link: RwLock::new(None),
            endpoint: RwLock::new(None),
            inbound: RwLock::new(None),
        }
    }

    /// Local tunnel IPv4 address.
    #[must_use]
    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    /// Local tunnel netmask.
    #[must_use]
    pub fn netmask(&self) -> Ipv4Addr {
        self.netmask
    }

    /// Attach the virtual tunnel interface on top of the physical link.
    /// Expected exactly once during startup; a repeat attach replaces the
    /// previous reference, mirroring a link re-announcement.
    pub fn attach_link(&self, link: LinkInterface) {
        info!("tunnel interface attached to {}", link.name());
        *self.link.write() = Some(link);
    }

    /// The attached physical link, if any.
    #[must_use]
    pub fn link(&self) -> Option<LinkInterface> {
        self.link.read().clone()
    }

    /// Whether a physical link is attached. Packets cannot leave the
    /// tunnel without one.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.link.read().is_some()
    }

    /// Install the transport endpoint. Called by the coordinator when the
    /// UDP pipeline starts.
    pub fn set_endpoint(&self, endpoint: Arc<TransportEndpoint>) {
        *self.endpoint.write() = Some(endpoint);
    }

    /// Remove the transport endpoint, returning it for teardown.
    pub fn clear_endpoint(&self) -> Option<Arc<TransportEndpoint>> {
        self.endpoint.write().take()
    }

    /// The installed transport endpoint, if any.
    #[must_use]
    pub fn endpoint(&self) -> Option<Arc<TransportEndpoint>> {
        self.endpoint.read().as_ref().map(Arc::clone)
    }

    /// The endpoint's socket handle, if the endpoint exists and is open.
    /// Used by the engine to transmit encrypted datagrams.
    #[must_use]
    pub fn socket(&self) -> Option<Arc<UdpSocket>> {
        self.endpoint().and_then(|ep| ep.socket().ok())
    }

    /// Install the sink decrypted inbound packets are handed to. Installed
    /// by the virtual interface when it is created.
    pub fn set_inbound_sink(&self, tx: mpsc::Sender<Vec<u8>>) {
        *self.inbound.write() = Some(tx);
    }

    /// Hand a decrypted inbound packet to the virtual-interface side.
    ///
    /// Datagram semantics apply: the packet is dropped when no sink is
    /// installed or the consumer is behind.
    pub fn deliver_plaintext(&self, packet: &[u8]) {
        match self.inbound.read().as_ref() {
            Some(tx) => {
                if tx.try_send(packet.to_vec()).is_err() {
                    trace!(
                        "dropping {} decrypted bytes: consumer is behind or gone",
                        packet.len()
                    );
                }
            }
            None => trace!("dropping {} decrypted bytes: no inbound sink", packet.len()),
        }
    }
}

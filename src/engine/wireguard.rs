//! boringtun-backed WireGuard engine
//!
//! Wraps a single-peer boringtun [`Tunn`] behind the [`TunnelEngine`]
//! trait. Inbound datagrams are decapsulated; handshake responses the
//! protocol wants on the wire go straight back out through the device's
//! transport endpoint. Outbound plaintext packets are encapsulated and
//! sent to the configured peer endpoint. The engine timer drives
//! retransmission and keepalive via `update_timers`.
//!
//! Allowed-IP routing policy is not enforced here; a single peer receives
//! all traffic.

use std::net::{Ipv4Addr, SocketAddr};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use boringtun::noise::{Tunn, TunnResult};
use boringtun::x25519::{PublicKey, StaticSecret};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use super::TunnelEngine;
use crate::config::TunnelConfig;
use crate::device::TunnelDevice;
use crate::error::EngineError;
use crate::packet::PacketView;

/// Scratch-buffer size for engine output. Large enough for the biggest
/// outbound packet the send path admits (4096) plus transport overhead,
/// and for every handshake message.
const ENGINE_BUF_SIZE: usize = 4096 + 128;

/// Single-peer WireGuard engine.
pub struct WireGuardEngine {
    tunn: Mutex<Box<Tunn>>,
    peer_endpoint: Option<SocketAddr>,
}

impl std::fmt::Debug for WireGuardEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireGuardEngine")
            .field("peer_endpoint", &self.peer_endpoint)
            .finish_non_exhaustive()
    }
}

impl WireGuardEngine {
    /// Build the engine from the tunnel configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Key`] for malformed keys and
    /// [`EngineError::Protocol`] if the underlying tunnel cannot be
    /// created. Both are fatal to startup.
    pub fn new(config: &TunnelConfig) -> Result<Self, EngineError> {
        let static_private = decode_private_key(&config.private_key)?;
        let peer_public = decode_public_key(&config.peer.public_key)?;

        let tunn = Tunn::new(
            static_private,
            peer_public,
            None,
            config.peer.keepalive,
            0,
            None,
        )
        .map_err(|e| EngineError::Protocol(format!("failed to create tunnel: {e}")))?;

        Ok(Self {
            tunn: Mutex::new(Box::new(tunn)),
            peer_endpoint: config.peer.endpoint,
        })
    }

    /// Send engine output through the device's transport endpoint.
    async fn send(
        &self,
        device: &TunnelDevice,
        data: &[u8],
        dst: SocketAddr,
    ) -> Result<(), EngineError> {
        let socket = device.socket().ok_or(EngineError::NotReady)?;
        socket.send_to(data, dst).await?;
        Ok(())
    }

    /// Drain datagrams the protocol queued while processing the previous
    /// one (cookie replies, buffered session packets).
    async fn flush_queued(&self, device: &TunnelDevice, dst: SocketAddr) {
        loop {
            let mut buf = [0u8; ENGINE_BUF_SIZE];
            let result = {
                let mut tunn = self.tunn.lock();
                tunn.decapsulate(None, &[], &mut buf)
            };
            match result {
                TunnResult::WriteToNetwork(data) => {
                    if let Err(e) = self.send(device, data, dst).await {
                        debug!("failed to flush queued datagram: {}", e);
                        return;
                    }
                }
                _ => return,
            }
        }
    }
}

#[async_trait]
impl TunnelEngine for WireGuardEngine {
    async fn deliver_inbound(
        &self,
        device: &TunnelDevice,
        packet: PacketView<'_>,
        src_addr: Ipv4Addr,
        src_port: u16,
    ) {
        let peer = SocketAddr::from((src_addr, src_port));
        let mut buf = [0u8; ENGINE_BUF_SIZE];

        let result = {
            let mut tunn = self.tunn.lock();
            tunn.decapsulate(None, packet.payload(), &mut buf)
        };

        match result {
            TunnResult::WriteToNetwork(data) => {
                // Handshake response or cookie destined for the sender.
                if let Err(e) = self.send(device, data, peer).await {
                    debug!("failed to answer {}: {}", peer, e);
                    return;
                }
                self.flush_queued(device, peer).await;
            }
            TunnResult::WriteToTunnelV4(data, src) => {
                trace!(
                    "tunnel rx: {} plaintext bytes from {} via {}",
                    data.len(),
                    src,
                    peer
                );
                device.deliver_plaintext(data);
            }
            TunnResult::WriteToTunnelV6(data, _) => {
                debug!("dropping {} IPv6 bytes: IPv4-only deployment", data.len());
            }
            TunnResult::Done => {}
            TunnResult::Err(e) => {
                debug!("decapsulate failed for {} bytes from {}: {:?}", packet.len(), peer, e);
            }
        }
    }

    async fn deliver_outbound(
        &self,
        device: &TunnelDevice,
        packet: PacketView<'_>,
        dst_addr: Ipv4Addr,
    ) -> Result<(), EngineError> {
        let Some(peer) = self.peer_endpoint else {
            return Err(EngineError::InvalidConfig(
                "no peer endpoint configured".into(),
            ));
        };
        let mut buf = [0u8; ENGINE_BUF_SIZE];

        let result = {
            let mut tunn = self.tunn.lock();
            tunn.encapsulate(packet.payload(), &mut buf)
        };

        match result {
            TunnResult::WriteToNetwork(data) => {
                trace!(
                    "tunnel tx: {} bytes for {} -> {} encrypted bytes to {}",
                    packet.len(),
                    dst_addr,
                    data.len(),
                    peer
                );
                self.send(device, data, peer).await
            }
            TunnResult::Done => {
                // No session yet; the packet is queued behind the handshake.
                trace!("tunnel tx queued: no session with {} yet", peer);
                Ok(())
            }
            TunnResult::Err(e) => Err(EngineError::Protocol(format!(
                "encapsulate failed: {e:?}"
            ))),
            _ => {
                warn!("unexpected encapsulate result");
                Ok(())
            }
        }
    }

    async fn connect(&self, device: &TunnelDevice) -> Result<(), EngineError> {
        let Some(peer) = self.peer_endpoint else {
            debug!("no peer endpoint configured; waiting for inbound handshake");
            return Ok(());
        };

        let mut buf = [0u8; ENGINE_BUF_SIZE];
        let result = {
            let mut tunn = self.tunn.lock();
            tunn.format_handshake_initiation(&mut buf, false)
        };

        match result {
            TunnResult::WriteToNetwork(data) => {
                self.send(device, data, peer).await?;
                info!("sent handshake initiation ({} bytes) to {}", data.len(), peer);
                Ok(())
            }
            TunnResult::Done => Ok(()),
            TunnResult::Err(e) => Err(EngineError::Protocol(format!(
                "handshake initiation failed: {e:?}"
            ))),
            _ => Ok(()),
        }
    }

    async fn tick(&self, device: &TunnelDevice) {
        let Some(peer) = self.peer_endpoint else {
            return;
        };
        let mut buf = [0u8; ENGINE_BUF_SIZE];

        let result = {
            let mut tunn = self.tunn.lock();
            tunn.update_timers(&mut buf)
        };

        match result {
            TunnResult::WriteToNetwork(data) => {
                if let Err(e) = self.send(device, data, peer).await {
                    debug!("timer transmit to {} failed: {}", peer, e);
                }
            }
            TunnResult::Err(e) => debug!("timer update failed: {:?}", e),
            _ => {}
        }
    }
}

/// Decode a base64 x25519 private key.
fn decode_private_key(key: &str) -> Result<StaticSecret, EngineError> {
    let bytes = BASE64
        .decode(key)
        .map_err(|e| EngineError::Key(format!("invalid private key base64: {e}")))?;

    if bytes.len() != 32 {
        return Err(EngineError::Key(format!(
            "private key must be 32 bytes, got {}",
            bytes.len()
        )));
    }

    let mut key_array = [0u8; 32];
    key_array.copy_from_slice(&bytes);
    Ok(StaticSecret::from(key_array))
}

/// Decode a base64 x25519 public key.
fn decode_public_key(key: &str) -> Result<PublicKey, EngineError> {
    let bytes = BASE64
        .decode(key)
        .map_err(|e| EngineError::Key(format!("invalid public key base64: {e}")))?;

    if bytes.len() != 32 {
        return Err(EngineError::Key(format!(
            "public key must be 32 bytes, got {}",
            bytes.len()
        )));
    }

    let mut key_array = [0u8; 32];
    key_array.copy_from_slice(&bytes);
    Ok(PublicKey::from(key_array))
}

//! Transport endpoint: exclusive owner of the tunnel's UDP socket

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::error::TransportError;

/// Fixed tunnel port datagrams are exchanged on.
pub const WG_PORT: u16 = 52840;

/// Lifecycle of the endpoint's socket handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EndpointState {
    /// No socket has been created yet.
    Unbound = 0,
    /// Socket is created and bound; receive and send are possible.
    Bound = 1,
    /// Socket has been closed; the handle is gone for good.
    Closed = 2,
}

impl EndpointState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Bound,
            2 => Self::Closed,
            _ => Self::Unbound,
        }
    }
}

/// Owner of the single UDP socket for one address family.
///
/// Created by the lifecycle coordinator when the pipeline starts and closed
/// when it stops; the receive loop and send path hold it by `Arc` and never
/// mutate its lifecycle. `close` does not interrupt a blocked receive on
/// its own: the coordinator aborts the receive task first, and `close`
/// then drops this handle so the descriptor is released once the last
/// outstanding clone goes away.
#[derive(Debug)]
pub struct TransportEndpoint {
    local_addr: SocketAddr,
    socket: RwLock<Option<Arc<UdpSocket>>>,
    state: AtomicU8,
}

impl TransportEndpoint {
    /// Create an IPv4 datagram socket and bind it to `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::SocketCreation`] or [`TransportError::Bind`]
    /// carrying the underlying system error. Both are fatal to startup;
    /// there is no automatic retry.
    pub fn bind(addr: SocketAddrV4) -> Result<Self, TransportError> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(TransportError::SocketCreation)?;
        socket
            .set_nonblocking(true)
            .map_err(TransportError::SocketCreation)?;
        socket
            .bind(&SocketAddr::V4(addr).into())
            .map_err(|e| TransportError::bind(SocketAddr::V4(addr), e))?;

        let std_socket: std::net::UdpSocket = socket.into();
        let socket = UdpSocket::from_std(std_socket).map_err(TransportError::SocketCreation)?;
        let local_addr = socket.local_addr().map_err(TransportError::SocketCreation)?;

        info!("UDP endpoint bound to {}", local_addr);

        Ok(Self {
            local_addr,
            socket: RwLock::new(Some(Arc::new(socket))),
            state: AtomicU8::new(EndpointState::Bound as u8),
        })
    }

    /// Bind to the fixed tunnel port on all IPv4 interfaces.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`TransportEndpoint::bind`].
    pub fn bind_tunnel_port(port: u16) -> Result<Self, TransportError> {
        Self::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port))
    }

    /// The address the socket is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EndpointState {
        EndpointState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Borrow the socket handle, if still open.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] once [`close`](Self::close) has run.
    pub fn socket(&self) -> Result<Arc<UdpSocket>, TransportError> {
        self.socket
            .read()
            .as_ref()
            .map(Arc::clone)
            .ok_or(TransportError::Closed)
    }

    /// Close the socket. Idempotent: closing an already-closed endpoint is
    /// a no-op. The file descriptor is released when the last outstanding
    /// `Arc` clone drops, which is why the receive task must already be
    /// aborted when this is called.
    pub fn close(&self) {
        let taken = self.socket.write().take();
        if taken.is_some() {
            self.state
                .store(EndpointState::Closed as u8, Ordering::Release);
            debug!("UDP endpoint {} closed", self.local_addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_ephemeral() {
        let ep = TransportEndpoint::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)).unwrap();
        assert_eq!(ep.state(), EndpointState::Bound);
        assert_ne!(ep.local_addr().port(), 0);
        assert!(ep.socket().is_ok());
    }

    #[tokio::test]
    async fn test_bind_conflict_is_fatal() {
        let first = TransportEndpoint::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = match first.local_addr() {
            SocketAddr::V4(a) => a.port(),
            SocketAddr::V6(_) => unreachable!(),
        };

        let second = TransportEndpoint::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port));
        match second {
            Err(e @ TransportError::Bind { .. }) => assert!(!e.is_recoverable()),
            other => panic!("expected bind error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let ep = TransportEndpoint::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)).unwrap();
        ep.close();
        assert_eq!(ep.state(), EndpointState::Closed);
        assert!(matches!(ep.socket(), Err(TransportError::Closed)));

        // Second close is a no-op
        ep.close();
        assert_eq!(ep.state(), EndpointState::Closed);
    }

    #[tokio::test]
    async fn test_socket_usable_for_io() {
        let ep = TransportEndpoint::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)).unwrap();
        let sock = ep.socket().unwrap();

        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        peer.send_to(b"ping", ep.local_addr()).await.unwrap();

        let mut buf = [0u8; 16];
        let (n, _from) = sock.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping");
    }
}

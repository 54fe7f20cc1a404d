//! UDP transport: socket ownership and the inbound receive loop
//!
//! The transport endpoint owns the single UDP socket bound to the tunnel
//! port. The receive loop blocks on it indefinitely and forwards every
//! datagram into the tunnel engine. The two are created and destroyed
//! together: the socket handle is valid exactly while the receive loop is
//! runnable.

mod endpoint;
mod receiver;

pub use endpoint::{EndpointState, TransportEndpoint, WG_PORT};
pub use receiver::{ReceiveLoop, RECV_BUFFER_SIZE};

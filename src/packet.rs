//! Transient packet descriptors for component hand-offs
//!
//! A [`PacketView`] is a non-owning view over a buffer with a logical length
//! and a total length. The total length exists to describe multi-segment
//! packets; this bridge only ever produces single-segment ones, so the two
//! are always equal here. A view never outlives the single hand-off it was
//! created for.

use std::net::Ipv4Addr;

/// Minimum length of an IPv4 header (without options)
pub const IPV4_HEADER_LEN: usize = 20;

/// A transient, non-owning packet descriptor.
#[derive(Debug, Clone, Copy)]
pub struct PacketView<'a> {
    payload: &'a [u8],
    len: usize,
    tot_len: usize,
}

impl<'a> PacketView<'a> {
    /// Create a single-segment view over `payload`.
    ///
    /// Length and total length both equal the payload length.
    #[must_use]
    pub fn new(payload: &'a [u8]) -> Self {
        Self {
            payload,
            len: payload.len(),
            tot_len: payload.len(),
        }
    }

    /// The payload bytes of this segment.
    #[must_use]
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Logical length of this segment.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Total length of the packet across all segments.
    #[must_use]
    pub fn total_len(&self) -> usize {
        self.tot_len
    }

    /// Whether the view is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Extract the destination address from an IPv4 header.
///
/// Returns `None` if the buffer is too short to carry a full header.
#[must_use]
pub fn ipv4_destination(packet: &[u8]) -> Option<Ipv4Addr> {
    if packet.len() < IPV4_HEADER_LEN {
        return None;
    }
    Some(Ipv4Addr::new(
        packet[16], packet[17], packet[18], packet[19],
    ))
}

/// Extract the source address from an IPv4 header.
///
/// Returns `None` if the buffer is too short to carry a full header.
#[must_use]
pub fn ipv4_source(packet: &[u8]) -> Option<Ipv4Addr> {
    if packet.len() < IPV4_HEADER_LEN {
        return None;
    }
    Some(Ipv4Addr::new(
        packet[12], packet[13], packet[14], packet[15],
    ))
}

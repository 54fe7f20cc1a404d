//! Recording engine used by unit tests across the crate.

use std::net::Ipv4Addr;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::TunnelEngine;
use crate::device::TunnelDevice;
use crate::error::EngineError;
use crate::packet::PacketView;

/// One recorded inbound hand-off.
#[derive(Debug, Clone)]
pub struct InboundRecord {
    pub payload: Vec<u8>,
    pub src_addr: Ipv4Addr,
    pub src_port: u16,
}

/// One recorded outbound hand-off.
#[derive(Debug, Clone)]
pub struct OutboundRecord {
    pub payload: Vec<u8>,
    pub dst_addr: Ipv4Addr,
}

/// A [`TunnelEngine`] that records every hand-off instead of encrypting.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    inbound: Mutex<Vec<InboundRecord>>,
    outbound: Mutex<Vec<OutboundRecord>>,
    connects: Mutex<u32>,
    ticks: Mutex<u32>,
    fail: bool,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine whose outbound entry point always fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn inbound(&self) -> Vec<InboundRecord> {
        self.inbound.lock().clone()
    }

    pub fn inbound_count(&self) -> usize {
        self.inbound.lock().len()
    }

    pub fn outbound(&self) -> Vec<OutboundRecord> {
        self.outbound.lock().clone()
    }

    pub fn outbound_count(&self) -> usize {
        self.outbound.lock().len()
    }

    pub fn connect_count(&self) -> u32 {
        *self.connects.lock()
    }

    pub fn tick_count(&self) -> u32 {
        *self.ticks.lock()
    }
}

#[async_trait]
impl TunnelEngine for RecordingEngine {
    async fn deliver_inbound(
        &self,
        _device: &TunnelDevice,
        packet: PacketView<'_>,
        src_addr: Ipv4Addr,
        src_port: u16,
    ) {
        self.inbound.lock().push(InboundRecord {
            payload: packet.payload().to_vec(),
            src_addr,
            src_port,
        });
    }

    async fn deliver_outbound(
        &self,
        _device: &TunnelDevice,
        packet: PacketView<'_>,
        dst_addr: Ipv4Addr,
    ) -> Result<(), EngineError> {
        self.outbound.lock().push(OutboundRecord {
            payload: packet.payload().to_vec(),
            dst_addr,
        });
        if self.fail {
            return Err(EngineError::Protocol("recording engine set to fail".into()));
        }
        Ok(())
    }

    async fn connect(&self, _device: &TunnelDevice) -> Result<(), EngineError> {
        *self.connects.lock() += 1;
        Ok(())
    }

    async fn tick(&self, _device: &TunnelDevice) {
        *self.ticks.lock() += 1;
    }
}

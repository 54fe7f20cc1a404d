//! End-to-end lifecycle tests over the public API
//!
//! Drives the coordinator with synthetic link events and a mock engine,
//! checking startup, flap tolerance, and forced teardown.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;

use wg_bridge::device::TunnelDevice;
use wg_bridge::engine::TunnelEngine;
use wg_bridge::error::EngineError;
use wg_bridge::lifecycle::{Coordinator, Phase};
use wg_bridge::link::{event_channel, LinkEventSender};
use wg_bridge::packet::PacketView;
use wg_bridge::stats::TrafficCounter;
use wg_bridge::transport::EndpointState;

/// Engine double that counts deliveries and echoes nothing.
#[derive(Default)]
struct CountingEngine {
    inbound: AtomicUsize,
    connects: AtomicUsize,
}

#[async_trait]
impl TunnelEngine for CountingEngine {
    async fn deliver_inbound(
        &self,
        _device: &TunnelDevice,
        _packet: PacketView<'_>,
        _src_addr: Ipv4Addr,
        _src_port: u16,
    ) {
        self.inbound.fetch_add(1, Ordering::SeqCst);
    }

    async fn deliver_outbound(
        &self,
        _device: &TunnelDevice,
        _packet: PacketView<'_>,
        _dst_addr: Ipv4Addr,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    async fn connect(&self, _device: &TunnelDevice) -> Result<(), EngineError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn tick(&self, _device: &TunnelDevice) {}
}

struct Fixture {
    device: Arc<TunnelDevice>,
    engine: Arc<CountingEngine>,
    counter: Arc<TrafficCounter>,
    events: LinkEventSender,
}

fn start() -> (
    Fixture,
    Arc<wg_bridge::lifecycle::CoordinatorState>,
    tokio::task::JoinHandle<Result<(), wg_bridge::WgBridgeError>>,
) {
    let device = Arc::new(TunnelDevice::new(
        Ipv4Addr::new(10, 1, 1, 50),
        Ipv4Addr::new(255, 255, 255, 0),
    ));
    let engine = Arc::new(CountingEngine::default());
    let counter = Arc::new(TrafficCounter::new());
    let (tx, rx) = event_channel();

    let coordinator = Coordinator::new(
        Arc::clone(&device),
        Arc::clone(&engine) as Arc<dyn TunnelEngine>,
        Arc::clone(&counter),
        None,
        rx,
        tx.clone(),
        0,
        Duration::from_secs(60),
    );
    let state = coordinator.state_handle();
    let handle = tokio::spawn(coordinator.run());

    (
        Fixture {
            device,
            engine,
            counter,
            events: tx,
        },
        state,
        handle,
    )
}

async fn wait_for(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn quit_before_link_up_leaves_socket_unbound() {
    let (fixture, state, handle) = start();

    fixture.events.request_quit();
    handle.await.unwrap().unwrap();

    assert_eq!(state.phase(), Phase::Stopped);
    assert!(fixture.device.endpoint().is_none());
    assert_eq!(fixture.engine.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn datagrams_flow_to_engine_while_running() {
    let (fixture, state, handle) = start();

    fixture.events.link_up();
    wait_for(|| state.phase() == Phase::Running).await;

    let endpoint = fixture.device.endpoint().expect("endpoint installed");
    let local = endpoint.local_addr();

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.send_to(b"encrypted", local).await.unwrap();
    sender.send_to(b"payload", local).await.unwrap();

    let engine = Arc::clone(&fixture.engine);
    wait_for(move || engine.inbound.load(Ordering::SeqCst) == 2).await;
    assert_eq!(fixture.counter.total(), 16);

    fixture.events.request_quit();
    handle.await.unwrap().unwrap();
    assert_eq!(endpoint.state(), EndpointState::Closed);
}

#[tokio::test]
async fn link_flap_keeps_pipeline_alive() {
    let (fixture, state, handle) = start();

    fixture.events.link_up();
    wait_for(|| state.phase() == Phase::Running).await;
    let endpoint = fixture.device.endpoint().expect("endpoint installed");

    fixture.events.link_down();
    wait_for(|| !state.is_connected()).await;
    assert_eq!(endpoint.state(), EndpointState::Bound);

    // Traffic still reaches the engine with the link flagged down.
    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.send_to(b"late", endpoint.local_addr()).await.unwrap();
    let engine = Arc::clone(&fixture.engine);
    wait_for(move || engine.inbound.load(Ordering::SeqCst) == 1).await;

    fixture.events.link_up();
    wait_for(|| state.phase() == Phase::Running).await;
    let second = fixture.device.endpoint().expect("endpoint still installed");
    assert!(Arc::ptr_eq(&endpoint, &second));
    assert_eq!(fixture.engine.connects.load(Ordering::SeqCst), 1);

    fixture.events.request_quit();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn quit_while_receiver_blocked_unblocks_teardown() {
    let (fixture, state, handle) = start();

    fixture.events.link_up();
    wait_for(|| state.phase() == Phase::Running).await;
    let endpoint = fixture.device.endpoint().expect("endpoint installed");

    // No traffic at all: the receive task is parked in the socket read.
    fixture.events.request_quit();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("teardown must not hang");
    result.unwrap().unwrap();

    assert_eq!(state.phase(), Phase::Stopped);
    assert_eq!(endpoint.state(), EndpointState::Closed);
    assert!(fixture.device.endpoint().is_none());
}

#[tokio::test]
async fn repeated_quit_requests_are_harmless() {
    let (fixture, state, handle) = start();

    fixture.events.link_up();
    wait_for(|| state.phase() == Phase::Running).await;

    fixture.events.request_quit();
    fixture.events.request_quit();
    handle.await.unwrap().unwrap();

    // A quit after the coordinator stopped is silently dropped.
    fixture.events.request_quit();
    assert_eq!(state.phase(), Phase::Stopped);
}

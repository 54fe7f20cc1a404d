//! Recurring engine timer
//!
//! Drives the tunnel engine's retransmission and keepalive machinery at a
//! fixed period. Started during setup, stopped by the lifecycle
//! coordinator during quit teardown.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use super::TunnelEngine;
use crate::device::TunnelDevice;

/// Default engine timer period in milliseconds.
pub const ENGINE_TIMER_PERIOD_MS: u64 = 400;

/// Handle to the running periodic timer task.
pub struct EngineTimer {
    handle: JoinHandle<()>,
}

impl EngineTimer {
    /// Spawn the timer, ticking the engine every `period`.
    #[must_use]
    pub fn spawn(
        engine: Arc<dyn TunnelEngine>,
        device: Arc<TunnelDevice>,
        period: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                engine.tick(&device).await;
            }
        });
        debug!("engine timer started (period {:?})", period);
        Self { handle }
    }

    /// Stop the timer.
    pub fn stop(self) {
        self.handle.abort();
        debug!("engine timer stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::engine::testing::RecordingEngine;

    #[tokio::test(start_paused = true)]
    async fn test_timer_ticks_engine_periodically() {
        let engine = Arc::new(RecordingEngine::new());
        let device = Arc::new(TunnelDevice::new(
            Ipv4Addr::new(10, 1, 1, 50),
            Ipv4Addr::new(255, 255, 255, 0),
        ));

        let timer = EngineTimer::spawn(
            Arc::clone(&engine) as Arc<dyn TunnelEngine>,
            device,
            Duration::from_millis(400),
        );

        tokio::time::sleep(Duration::from_millis(1300)).await;
        assert!(engine.tick_count() >= 3);

        timer.stop();
        let ticks_after_stop = engine.tick_count();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(engine.tick_count(), ticks_after_stop);
    }
}

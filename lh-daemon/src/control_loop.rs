//! Main control loop
//!
//! Polls the RF decoder and the actuator link once per tick and feeds what
//! it finds to the router. Sensor datagrams are only read while at least one
//! motion sensor is reachable; otherwise they stay queued in the socket.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use lh_core::constants::timing::SLOW_TICK_WARN;
use lh_core::link::Inbound;
use lh_core::{
    EventRouter, HealthMonitor, HubContext, Outcome, RemoteDecoder, SensorSource, UdpLink,
};
use lh_protocol::Event;

/// Upper bound on sensor datagrams handled in one tick
const MAX_DATAGRAMS_PER_TICK: usize = 16;

pub struct ControlLoop {
    ctx: HubContext,
    router: EventRouter,
    decoder: RemoteDecoder,
    link: Arc<UdpLink>,
    tick: Duration,
    slow_threshold: Duration,
    iterations: u64,
    slow_ticks: u64,
}

impl ControlLoop {
    pub fn new(
        ctx: HubContext,
        router: EventRouter,
        decoder: RemoteDecoder,
        link: Arc<UdpLink>,
    ) -> Self {
        let tick = ctx.config.timing.tick();
        let slow_threshold = SLOW_TICK_WARN + ctx.config.timing.settle();
        Self {
            ctx,
            router,
            decoder,
            link,
            tick,
            slow_threshold,
            iterations: 0,
            slow_ticks: 0,
        }
    }

    pub async fn run(mut self, shutdown: Arc<AtomicBool>) {
        info!("Control loop starting (tick {:?})", self.tick);

        while !shutdown.load(Ordering::SeqCst) {
            let started = Instant::now();
            self.iteration().await;

            let elapsed = started.elapsed();
            if elapsed > self.slow_threshold {
                self.slow_ticks += 1;
                warn!(elapsed_ms = elapsed.as_millis() as u64, "Slow control loop iteration");
            }
            tokio::time::sleep(self.tick).await;
        }

        info!(
            iterations = self.iterations,
            slow_ticks = self.slow_ticks,
            "Control loop stopped"
        );
    }

    /// One poll of every input
    pub async fn iteration(&mut self) -> Vec<Outcome> {
        self.iterations += 1;
        let mut outcomes = Vec::new();

        if let Some(symbol) = self.decoder.poll() {
            let outcome = self.router.handle(Event::Remote(symbol), SensorSource::Other).await;
            outcomes.push(outcome);
        }

        if HealthMonitor::any_sensor_reachable(&self.ctx.directory, &self.ctx.reachability) {
            for _ in 0..MAX_DATAGRAMS_PER_TICK {
                let Some(inbound) = self.link.try_recv() else {
                    break;
                };
                if let Some(outcome) = self.dispatch(inbound).await {
                    outcomes.push(outcome);
                }
            }
        }

        self.router.tick().await;
        outcomes
    }

    async fn dispatch(&mut self, inbound: Inbound) -> Option<Outcome> {
        let event = Event::parse(&inbound.line)?;
        let outcome = self.router.handle(event, inbound.source).await;
        debug!(from = %inbound.from, ?outcome, "Datagram handled");
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lh_core::alert::SilentAlerts;
    use lh_core::{ActuatorDirectory, HubConfig, LightingState, Reachability, RfReading, RfSource, StateStore};
    use std::collections::{HashMap, VecDeque};
    use tokio::net::UdpSocket;

    struct Scripted(VecDeque<RfReading>);

    impl RfSource for Scripted {
        fn poll(&mut self) -> Option<RfReading> {
            self.0.pop_front()
        }
    }

    async fn control_loop(
        script: Vec<RfReading>,
    ) -> (ControlLoop, HubContext, tempfile::TempDir) {
        let mut config = HubConfig::default();
        config.network.bind_address = "127.0.0.1:0".parse().unwrap();
        config.timing.settle_ms = 1;
        let dir = tempfile::tempdir().unwrap();
        let state = StateStore::new(dir.path().join("settings.json"), LightingState::default());

        let directory = ActuatorDirectory::from_config(&config);
        let reachability = Reachability::new();
        let link = Arc::new(
            UdpLink::bind(config.network.bind_address, directory.clone(), reachability.clone())
                .await
                .unwrap(),
        );
        let ctx = HubContext::with_network(
            config,
            state,
            directory,
            reachability,
            link.clone(),
            Arc::new(SilentAlerts),
        );
        let decoder = RemoteDecoder::new(Box::new(Scripted(script.into())), HashMap::new());
        let router = EventRouter::new(ctx.clone());
        (ControlLoop::new(ctx.clone(), router, decoder, link), ctx, dir)
    }

    #[tokio::test]
    async fn test_rf_code_routed() {
        let (mut cl, ctx, _dir) =
            control_loop(vec![RfReading { code: 59139, timestamp: 1 }]).await;

        assert_eq!(cl.iteration().await, vec![Outcome::Accepted]);
        assert!(!ctx.state.snapshot().motion_enabled);
        assert!(cl.iteration().await.is_empty());
    }

    #[tokio::test]
    async fn test_datagrams_gated_on_sensor_reachability() {
        let (mut cl, ctx, _dir) = control_loop(Vec::new()).await;
        let sensor = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let hub = cl.link.local_addr().unwrap();
        sensor.send_to(b"Moving target: 90cm", hub).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // No sensor reachable: the datagram stays queued
        assert!(cl.iteration().await.is_empty());

        ctx.directory.set_address("motion", sensor.local_addr().unwrap().ip());
        ctx.reachability.set("motion", true);
        assert_eq!(cl.iteration().await, vec![Outcome::Diagnostic]);
    }
}

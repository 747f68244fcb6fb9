//! simulation.rs
//! Wires a transmitting node and a receiving node over a loopback radio and
//! runs them on threads for a fixed time.
//!
//! Transmitting node: Sampler + Transmitter sharing one batch.
//! Receiving node: FrameReceiver publishing to the given sink.
//! Each node keeps its own counters and event log, as two devices would.

use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use log::{info, warn};

use crate::component_a::{sampler::Sampler, sensor::SensorSource, transmitter::Transmitter};
use crate::component_b::{publisher::Publisher, receiver::FrameReceiver};
use crate::config::NodeConfig;
use crate::link::loopback::{LoopbackConfig, LoopbackLink};
use crate::protocol::batch::shared_batch;
use crate::utils::{
    export::run_exports,
    metrics::{EventRecorder, LinkMetrics, MetricsSnapshot, SharedMetrics},
};

/// Counters and event logs of both nodes after a run.
pub struct SimulationReport {
    pub tx_metrics: SharedMetrics,
    pub rx_metrics: SharedMetrics,
    pub tx_events: Arc<EventRecorder>,
    pub rx_events: Arc<EventRecorder>,
}

impl SimulationReport {
    pub fn tx(&self) -> MetricsSnapshot {
        self.tx_metrics.snapshot()
    }

    pub fn rx(&self) -> MetricsSnapshot {
        self.rx_metrics.snapshot()
    }

    /// Writes each node's summary and event log under `dir/tx` and `dir/rx`.
    pub fn export(&self, dir: &Path) {
        run_exports(&self.tx_metrics, &self.tx_events, &dir.join("tx"));
        run_exports(&self.rx_metrics, &self.rx_events, &dir.join("rx"));
    }
}

pub fn run_loopback<S, P>(
    config: &NodeConfig,
    link_config: LoopbackConfig,
    sensor: S,
    publisher: P,
    duration: Duration,
) -> SimulationReport
where
    S: SensorSource + 'static,
    P: Publisher + 'static,
{
    for w in config.validate() {
        warn!("[Simulation] {}", w);
    }

    let rx_config = config.receiver();
    let (tx_link, rx_link) = LoopbackLink::pair(
        config.local_address,
        rx_config.local_address,
        config.channel,
        LoopbackConfig {
            timeout: config.link_timeout,
            ..link_config
        },
    );

    let running = Arc::new(AtomicBool::new(true));
    let batch = shared_batch();
    let tx_metrics = LinkMetrics::new_shared();
    let rx_metrics = LinkMetrics::new_shared();
    let tx_events = Arc::new(EventRecorder::new());
    let rx_events = Arc::new(EventRecorder::new());

    let sampler = Sampler::new(
        sensor,
        batch.clone(),
        config.sample_period,
        running.clone(),
        tx_metrics.clone(),
        tx_events.clone(),
    )
    .pinned_to(config.pin_core)
    .spawn();

    let transmitter = Transmitter::new(
        tx_link,
        batch,
        config,
        running.clone(),
        tx_metrics.clone(),
        tx_events.clone(),
    )
    .spawn();

    let receiver = FrameReceiver::new(
        rx_link,
        publisher,
        rx_config.rx_poll_period,
        running.clone(),
        rx_metrics.clone(),
        rx_events.clone(),
    )
    .pinned_to(rx_config.pin_core)
    .spawn();

    info!("[Simulation] running for {:?}", duration);
    thread::sleep(duration);
    running.store(false, Ordering::Release);

    for (name, handle) in [("sampler", sampler), ("transmitter", transmitter), ("receiver", receiver)] {
        if handle.join().is_err() {
            warn!("[Simulation] {} thread panicked", name);
        }
    }

    info!("[Simulation] complete");
    SimulationReport {
        tx_metrics,
        rx_metrics,
        tx_events,
        rx_events,
    }
}

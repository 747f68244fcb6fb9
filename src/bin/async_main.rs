//! Async transmitting node over the loopback link (async_node binary).
//!
//! Sampler and transmitter run as tokio tasks; the receiving node runs on a
//! plain thread, as it would on a separate device.
//!
//! **Execution:**
//! 1. Build config (3 s frames) and the loopback radio pair
//! 2. Spawn async sampler + transmitter
//! 3. Spawn receiver thread publishing to the log
//! 4. Run for 15 seconds, clear `running`, join everything
//! 5. Export counters and event logs under data/async/

use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{error, info};
use tokio::time::Duration;

use lora_batch::{
    advanced::async_node::spawn_async_node,
    component_a::sensor::SimulatedSensor,
    component_b::{publisher::LogPublisher, receiver::FrameReceiver},
    config::NodeConfig,
    link::loopback::{LoopbackConfig, LoopbackLink},
    protocol::batch::shared_batch,
    utils::{
        export::run_exports,
        metrics::{EventRecorder, LinkMetrics},
    },
};

const SIMULATION_DURATION_SECS: u64 = 15;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() {
    env_logger::init();
    println!("=== ASYNC NODE START ===");

    let config = NodeConfig::with_tx_period(Duration::from_secs(3));
    let rx_config = config.receiver();

    let (tx_link, rx_link) = LoopbackLink::pair(
        config.local_address,
        rx_config.local_address,
        config.channel,
        LoopbackConfig {
            timeout: config.link_timeout,
            ..LoopbackConfig::default()
        },
    );

    let running = Arc::new(AtomicBool::new(true));
    let tx_metrics = LinkMetrics::new_shared();
    let rx_metrics = LinkMetrics::new_shared();
    let tx_events = Arc::new(EventRecorder::new());
    let rx_events = Arc::new(EventRecorder::new());

    let (sampler, transmitter) = spawn_async_node(
        &config,
        SimulatedSensor::new(),
        tx_link,
        shared_batch(),
        running.clone(),
        tx_metrics.clone(),
        tx_events.clone(),
    );

    let receiver = FrameReceiver::new(
        rx_link,
        LogPublisher::new(rx_config.topic.clone()),
        rx_config.rx_poll_period,
        running.clone(),
        rx_metrics.clone(),
        rx_events.clone(),
    )
    .spawn();

    println!("Running async node for {} seconds...", SIMULATION_DURATION_SECS);
    tokio::time::sleep(Duration::from_secs(SIMULATION_DURATION_SECS)).await;

    println!("Stopping async node...");
    running.store(false, Ordering::Relaxed);

    for (name, handle) in [("sampler", sampler), ("transmitter", transmitter)] {
        if let Err(e) = handle.await {
            error!("{} task failed: {}", name, e);
        }
    }
    if !matches!(tokio::task::spawn_blocking(move || receiver.join()).await, Ok(Ok(()))) {
        error!("receiver thread join failed");
    }

    let out = Path::new("data/async");
    run_exports(&tx_metrics, &tx_events, &out.join("tx"));
    run_exports(&rx_metrics, &rx_events, &out.join("rx"));

    info!("tx: {:?}", tx_metrics.snapshot());
    info!("rx: {:?}", rx_metrics.snapshot());
    println!("=== ASYNC NODE FINISHED ===");
}

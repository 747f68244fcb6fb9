//! Async transmitting node: the sampling and transmission loops as tokio tasks.
//!
//! Same Sampler/Transmitter ticks as the threaded node, driven by
//! `tokio::time::interval` instead of a spin-sleep pacer. The batch lock is
//! only taken inside a tick, never across an `.await`. The link send can block
//! up to its timeout, so each transmission tick runs on the blocking pool.
//! Every wait on the interval is raced against a cleared `running` flag.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use log::{debug, error, info};
use tokio::{
    task::JoinHandle,
    time::{self, Duration, Instant, MissedTickBehavior},
};

use crate::component_a::{sampler::Sampler, sensor::SensorSource, transmitter::Transmitter};
use crate::config::NodeConfig;
use crate::link::LinkLayer;
use crate::protocol::batch::SharedBatch;
use crate::utils::{
    metrics::{EventRecorder, SharedMetrics},
    pacing::SHUTDOWN_SLICE,
};

/// Resolves once `running` is cleared; the flag is checked every
/// `SHUTDOWN_SLICE`, so a long period never delays shutdown.
async fn stopped(running: &AtomicBool) {
    while running.load(Ordering::Relaxed) {
        time::sleep(SHUTDOWN_SLICE).await;
    }
}

/// Samples immediately, then every `period`, until `running` is cleared.
pub async fn async_sampler<S: SensorSource + 'static>(
    mut sampler: Sampler<S>,
    period: Duration,
    running: Arc<AtomicBool>,
) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while running.load(Ordering::Relaxed) {
        tokio::select! {
            _ = interval.tick() => {}
            _ = stopped(&running) => break,
        }
        if !running.load(Ordering::Relaxed) {
            break;
        }
        sampler.tick();
    }
    debug!("async sampler exited");
}

/// First send one full period after start, then every `period`.
pub async fn async_transmitter<L: LinkLayer + 'static>(
    transmitter: Transmitter<L>,
    period: Duration,
    running: Arc<AtomicBool>,
) {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut transmitter = Some(transmitter);

    while running.load(Ordering::Relaxed) {
        tokio::select! {
            _ = interval.tick() => {}
            _ = stopped(&running) => break,
        }
        if !running.load(Ordering::Relaxed) {
            break;
        }
        let Some(mut t) = transmitter.take() else {
            break;
        };
        match tokio::task::spawn_blocking(move || {
            let outcome = t.tick();
            (t, outcome)
        })
        .await
        {
            Ok((t, outcome)) => {
                debug!("async transmitter tick: {:?}", outcome);
                transmitter = Some(t);
            }
            Err(e) => {
                error!("async transmitter tick panicked: {}", e);
                break;
            }
        }
    }
    debug!("async transmitter exited");
}

/// Spawns both tasks of a transmitting node on the current runtime.
///
/// Tasks are detached from each other; the caller stops them by clearing
/// `running` and awaiting the handles.
pub fn spawn_async_node<S, L>(
    config: &NodeConfig,
    sensor: S,
    link: L,
    batch: SharedBatch,
    running: Arc<AtomicBool>,
    metrics: SharedMetrics,
    event_recorder: Arc<EventRecorder>,
) -> (JoinHandle<()>, JoinHandle<()>)
where
    S: SensorSource + 'static,
    L: LinkLayer + 'static,
{
    info!(
        "[AsyncNode] sampling every {:?}, transmitting every {:?}",
        config.sample_period, config.tx_period
    );

    let sampler = Sampler::new(
        sensor,
        batch.clone(),
        config.sample_period,
        running.clone(),
        metrics.clone(),
        event_recorder.clone(),
    );
    let transmitter = Transmitter::new(
        link,
        batch,
        config,
        running.clone(),
        metrics,
        event_recorder,
    );

    let sample_handle = tokio::spawn(async_sampler(sampler, config.sample_period, running.clone()));
    let tx_handle = tokio::spawn(async_transmitter(transmitter, config.tx_period, running));
    (sample_handle, tx_handle)
}

//! transmitter.rs
//! Consumer task: once per period, ship the current batch as one frame.
//! - snapshot + sequence advance + clear happen in one critical section
//! - the frame is sent after the lock is released
//! - fire-and-forget: a failed send is logged and counted, never retried;
//!   the batch has already been reset either way

use std::{
    sync::{Arc, atomic::AtomicBool},
    thread,
    time::Duration,
};

use log::{debug, error, info};

use crate::config::NodeConfig;
use crate::link::{LinkAddress, LinkError, LinkLayer};
use crate::protocol::batch::{Batch, SharedBatch};
use crate::utils::{
    metrics::{Event, EventRecorder, LinkMetrics, SharedMetrics},
    pacing::{Pacer, Release, pin_current_thread},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    Sent { sequence: u32, readings: u8 },
    Failed { sequence: u32, readings: u8, error: LinkError },
}

impl TxOutcome {
    pub fn sequence(&self) -> u32 {
        match self {
            TxOutcome::Sent { sequence, .. } | TxOutcome::Failed { sequence, .. } => *sequence,
        }
    }
}

pub struct Transmitter<L: LinkLayer> {
    link: L,
    batch: SharedBatch,
    destination: LinkAddress,
    channel: u8,
    period: Duration,
    running: Arc<AtomicBool>,
    metrics: SharedMetrics,
    event_recorder: Arc<EventRecorder>,
    pin_core: Option<usize>,
}

impl<L: LinkLayer + 'static> Transmitter<L> {
    pub fn new(
        link: L,
        batch: SharedBatch,
        config: &NodeConfig,
        running: Arc<AtomicBool>,
        metrics: SharedMetrics,
        event_recorder: Arc<EventRecorder>,
    ) -> Self {
        Self {
            link,
            batch,
            destination: config.destination,
            channel: config.channel,
            period: config.tx_period,
            running,
            metrics,
            event_recorder,
            pin_core: config.pin_core,
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Encodes `batch` into one frame and hands it to the link.
    pub fn send_frame(&mut self, batch: &Batch) -> Result<(), LinkError> {
        let frame = batch.encode();
        self.link.send(self.destination, self.channel, &frame)
    }

    /// One transmission release.
    pub fn tick(&mut self) -> TxOutcome {
        let outgoing = self.batch.lock().take_for_transmit();
        let sequence = outgoing.sequence();
        let readings = outgoing.len() as u8;
        let ts_ns = self.event_recorder.now_ns();

        match self.send_frame(&outgoing) {
            Ok(()) => {
                LinkMetrics::bump(&self.metrics.frames_sent);
                self.event_recorder.record(Event::FrameSent {
                    sequence,
                    readings,
                    ts_ns,
                });
                debug!(
                    "[Transmitter] frame {} sent to {} ch {} ({} readings)",
                    sequence, self.destination, self.channel, readings
                );
                TxOutcome::Sent { sequence, readings }
            }
            Err(e) => {
                LinkMetrics::bump(&self.metrics.send_failures);
                self.event_recorder.record(Event::SendFailed {
                    sequence,
                    readings,
                    code: e.code(),
                    ts_ns,
                });
                error!(
                    "[Transmitter] frame {} failed to send, {} readings lost: {}",
                    sequence, readings, e
                );
                TxOutcome::Failed {
                    sequence,
                    readings,
                    error: e,
                }
            }
        }
    }

    /// Waits one full period before the first send so the batch can fill.
    pub fn run(&mut self) {
        if let Some(core) = self.pin_core {
            pin_current_thread("Transmitter", core);
        }
        info!(
            "[Transmitter] started, period {:?}, destination {} ch {}",
            self.period, self.destination, self.channel
        );

        let mut pacer = Pacer::new(self.period);
        loop {
            match pacer.wait(&self.running) {
                Release::Stopped => break,
                Release::Late => LinkMetrics::bump(&self.metrics.deadline_misses),
                Release::OnTime => {}
            }
            self.tick();
        }

        info!("[Transmitter] stopped.");
    }

    pub fn spawn(mut self) -> thread::JoinHandle<()> {
        thread::spawn(move || self.run())
    }
}

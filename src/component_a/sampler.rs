//! sampler.rs
//! Producer task: one reading per period into the shared batch.
//! - full batch → sample skipped and counted as saturation (no sensor read)
//! - sensor unavailable → tick skipped and counted
//! - full-check and append each run under the batch lock; the sensor read does not

use std::{
    sync::{Arc, atomic::AtomicBool},
    thread,
    time::Duration,
};

use log::{debug, info, warn};

use crate::component_a::sensor::{SensorError, SensorSource};
use crate::protocol::batch::SharedBatch;
use crate::utils::{
    metrics::{Event, EventRecorder, LinkMetrics, SharedMetrics},
    pacing::{Pacer, Release, pin_current_thread},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleOutcome {
    /// Reading stored at `index` of the batch with this `sequence`.
    Appended { sequence: u32, index: u8 },
    Saturated { sequence: u32 },
    SensorUnavailable(SensorError),
}

pub struct Sampler<S: SensorSource> {
    sensor: S,
    batch: SharedBatch,
    period: Duration,
    running: Arc<AtomicBool>,
    metrics: SharedMetrics,
    event_recorder: Arc<EventRecorder>,
    pin_core: Option<usize>,
}

impl<S: SensorSource + 'static> Sampler<S> {
    pub fn new(
        sensor: S,
        batch: SharedBatch,
        period: Duration,
        running: Arc<AtomicBool>,
        metrics: SharedMetrics,
        event_recorder: Arc<EventRecorder>,
    ) -> Self {
        Self {
            sensor,
            batch,
            period,
            running,
            metrics,
            event_recorder,
            pin_core: None,
        }
    }

    pub fn pinned_to(mut self, core: Option<usize>) -> Self {
        self.pin_core = core;
        self
    }

    /// One sampling release.
    pub fn tick(&mut self) -> SampleOutcome {
        let (full, sequence) = {
            let b = self.batch.lock();
            (b.is_full(), b.sequence())
        };

        if full {
            return self.saturated(sequence);
        }

        let reading = match self.sensor.sample() {
            Ok(r) => r,
            Err(e) => {
                LinkMetrics::bump(&self.metrics.sensor_unavailable);
                self.event_recorder.record(Event::SensorUnavailable {
                    ts_ns: self.event_recorder.now_ns(),
                });
                warn!("[Sampler] {}", e);
                return SampleOutcome::SensorUnavailable(e);
            }
        };

        let (appended, sequence, len) = {
            let mut b = self.batch.lock();
            let ok = b.append(reading);
            (ok, b.sequence(), b.len())
        };

        if !appended {
            return self.saturated(sequence);
        }

        let index = (len - 1) as u8;
        LinkMetrics::bump(&self.metrics.samples_appended);
        self.event_recorder.record(Event::SampleAppended {
            sequence,
            index,
            ts_ns: self.event_recorder.now_ns(),
        });
        debug!(
            "[Sampler] T: {:.1} H: {:.1} -> batch {} slot {}",
            reading.temperature, reading.humidity, sequence, index
        );
        SampleOutcome::Appended { sequence, index }
    }

    fn saturated(&self, sequence: u32) -> SampleOutcome {
        LinkMetrics::bump(&self.metrics.saturation_drops);
        self.event_recorder.record(Event::Saturated {
            sequence,
            ts_ns: self.event_recorder.now_ns(),
        });
        debug!("[Sampler] batch {} is full, sample dropped", sequence);
        SampleOutcome::Saturated { sequence }
    }

    /// Samples immediately, then once per period until `running` is cleared.
    pub fn run(&mut self) {
        if let Some(core) = self.pin_core {
            pin_current_thread("Sampler", core);
        }
        info!("[Sampler] started, period {:?}", self.period);

        let mut pacer = Pacer::immediate(self.period);
        loop {
            match pacer.wait(&self.running) {
                Release::Stopped => break,
                Release::Late => LinkMetrics::bump(&self.metrics.deadline_misses),
                Release::OnTime => {}
            }
            self.tick();
        }

        info!("[Sampler] stopped.");
    }

    pub fn spawn(mut self) -> thread::JoinHandle<()> {
        thread::spawn(move || self.run())
    }
}

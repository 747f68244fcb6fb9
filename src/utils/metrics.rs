//! Counters and event recording for the batching link.
//!
//! Two independent paths:
//! - **LinkMetrics:** Atomic counters, safe to bump from any task without locking.
//! - **EventRecorder:** Lock-free queue (16K capacity) → background CSV export (nanosecond precision).
//!
//! Event tracing covers: sample appended/dropped → frame sent/failed → frame received/rejected.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    fs::File,
    io::BufWriter,
    thread,
    time::{Duration, Instant},
};
use crossbeam_queue::ArrayQueue;
use csv::Writer;
use log::error;
use serde::Serialize;

/// Event lifecycle: sampling through publication.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Reading written into the batch at `index`.
    SampleAppended {
        sequence: u32,
        index: u8,
        ts_ns: u64,
    },
    /// Batch full, sample dropped.
    Saturated {
        sequence: u32,
        ts_ns: u64,
    },
    /// Sensor had nothing for this tick.
    SensorUnavailable {
        ts_ns: u64,
    },
    FrameSent {
        sequence: u32,
        readings: u8,
        ts_ns: u64,
    },
    SendFailed {
        sequence: u32,
        readings: u8,
        code: u8,
        ts_ns: u64,
    },
    FrameReceived {
        sequence: u32,
        readings: u8,
        rssi: u8,
        ts_ns: u64,
    },
    ReceiveFailed {
        code: u8,
        ts_ns: u64,
    },
    /// Frame arrived but failed to decode.
    FrameRejected {
        ts_ns: u64,
    },
}

#[derive(Debug, Serialize)]
struct EventRow {
    ts_ns: u64,
    component: &'static str,
    event: &'static str,
    sequence: Option<u32>,
    readings: Option<u8>,
    code: Option<u8>,
    rssi: Option<u8>,
}

impl Event {
    fn to_row(&self) -> EventRow {
        let row = |ts_ns, component, event| EventRow {
            ts_ns,
            component,
            event,
            sequence: None,
            readings: None,
            code: None,
            rssi: None,
        };
        match *self {
            Event::SampleAppended { sequence, index, ts_ns } => EventRow {
                sequence: Some(sequence),
                readings: Some(index.saturating_add(1)),
                ..row(ts_ns, "sampler", "SampleAppended")
            },
            Event::Saturated { sequence, ts_ns } => EventRow {
                sequence: Some(sequence),
                ..row(ts_ns, "sampler", "Saturated")
            },
            Event::SensorUnavailable { ts_ns } => row(ts_ns, "sampler", "SensorUnavailable"),
            Event::FrameSent { sequence, readings, ts_ns } => EventRow {
                sequence: Some(sequence),
                readings: Some(readings),
                ..row(ts_ns, "transmitter", "FrameSent")
            },
            Event::SendFailed { sequence, readings, code, ts_ns } => EventRow {
                sequence: Some(sequence),
                readings: Some(readings),
                code: Some(code),
                ..row(ts_ns, "transmitter", "SendFailed")
            },
            Event::FrameReceived { sequence, readings, rssi, ts_ns } => EventRow {
                sequence: Some(sequence),
                readings: Some(readings),
                rssi: Some(rssi),
                ..row(ts_ns, "receiver", "FrameReceived")
            },
            Event::ReceiveFailed { code, ts_ns } => EventRow {
                code: Some(code),
                ..row(ts_ns, "receiver", "ReceiveFailed")
            },
            Event::FrameRejected { ts_ns } => row(ts_ns, "receiver", "FrameRejected"),
        }
    }
}

const EVENT_QUEUE_CAPACITY: usize = 16_384;

/// Non-blocking event recorder with background CSV export.
///
/// `record()` appends to a lock-free queue and returns immediately; if the
/// queue is full the event is dropped.
pub struct EventRecorder {
    queue: Arc<ArrayQueue<Event>>,
    run_start: Instant,
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRecorder {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(EVENT_QUEUE_CAPACITY)),
            run_start: Instant::now(),
        }
    }

    #[inline]
    pub fn record(&self, event: Event) {
        let _ = self.queue.push(event);
    }

    /// Nanosecond timestamp since recorder creation.
    #[inline]
    pub fn now_ns(&self) -> u64 {
        self.run_start.elapsed().as_nanos() as u64
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Pops everything recorded so far, oldest first.
    pub fn drain(&self) -> Vec<Event> {
        let mut out = Vec::with_capacity(self.queue.len());
        while let Some(e) = self.queue.pop() {
            out.push(e);
        }
        out
    }

    /// Spawns a thread draining the queue into a CSV file.
    /// Exits once the queue stays empty for one poll interval.
    pub fn start_exporter(&self, output_csv: String) -> thread::JoinHandle<()> {
        let queue = self.queue.clone();

        thread::spawn(move || {
            let file = match File::create(&output_csv) {
                Ok(f) => f,
                Err(e) => {
                    error!("Failed to create event CSV {}: {}", output_csv, e);
                    return;
                }
            };
            let mut wtr = Writer::from_writer(BufWriter::new(file));

            loop {
                match queue.pop() {
                    Some(event) => {
                        if let Err(e) = wtr.serialize(event.to_row()) {
                            error!("Failed to write event row: {}", e);
                        }
                    }
                    None => {
                        thread::sleep(Duration::from_millis(10));
                        if queue.is_empty() {
                            break;
                        }
                    }
                }
            }

            let _ = wtr.flush();
        })
    }
}

impl Clone for EventRecorder {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            run_start: self.run_start,
        }
    }
}

/// Loss and throughput counters for one node.
#[derive(Debug, Default)]
pub struct LinkMetrics {
    pub samples_appended: AtomicU64,
    pub saturation_drops: AtomicU64,
    pub sensor_unavailable: AtomicU64,
    pub frames_sent: AtomicU64,
    pub send_failures: AtomicU64,
    pub frames_received: AtomicU64,
    pub receive_failures: AtomicU64,
    pub frames_rejected: AtomicU64,
    pub no_data_polls: AtomicU64,
    pub sequence_gaps: AtomicU64,
    pub deadline_misses: AtomicU64,
}

pub type SharedMetrics = Arc<LinkMetrics>;

/// Point-in-time copy of [`LinkMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub samples_appended: u64,
    pub saturation_drops: u64,
    pub sensor_unavailable: u64,
    pub frames_sent: u64,
    pub send_failures: u64,
    pub frames_received: u64,
    pub receive_failures: u64,
    pub frames_rejected: u64,
    pub no_data_polls: u64,
    pub sequence_gaps: u64,
    pub deadline_misses: u64,
}

impl LinkMetrics {
    pub fn new_shared() -> SharedMetrics {
        Arc::new(Self::default())
    }

    #[inline]
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let ld = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            samples_appended: ld(&self.samples_appended),
            saturation_drops: ld(&self.saturation_drops),
            sensor_unavailable: ld(&self.sensor_unavailable),
            frames_sent: ld(&self.frames_sent),
            send_failures: ld(&self.send_failures),
            frames_received: ld(&self.frames_received),
            receive_failures: ld(&self.receive_failures),
            frames_rejected: ld(&self.frames_rejected),
            no_data_polls: ld(&self.no_data_polls),
            sequence_gaps: ld(&self.sequence_gaps),
            deadline_misses: ld(&self.deadline_misses),
        }
    }
}

impl MetricsSnapshot {
    /// (name, value, description) rows for the summary export.
    pub fn rows(&self) -> Vec<(&'static str, u64, &'static str)> {
        vec![
            ("samples_appended", self.samples_appended, "Readings written into a batch"),
            ("saturation_drops", self.saturation_drops, "Samples dropped because the batch was full"),
            ("sensor_unavailable", self.sensor_unavailable, "Ticks skipped for lack of a reading"),
            ("frames_sent", self.frames_sent, "Frames accepted by the link"),
            ("send_failures", self.send_failures, "Frames the link failed to send (not retried)"),
            ("frames_received", self.frames_received, "Frames decoded and published"),
            ("receive_failures", self.receive_failures, "Link failures while receiving"),
            ("frames_rejected", self.frames_rejected, "Frames that failed to decode"),
            ("no_data_polls", self.no_data_polls, "Receive polls with nothing waiting"),
            ("sequence_gaps", self.sequence_gaps, "Discontinuities in received sequence numbers"),
            ("deadline_misses", self.deadline_misses, "Periodic releases that woke up late"),
        ]
    }
}

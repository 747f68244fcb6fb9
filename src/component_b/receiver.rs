//! receiver.rs
//! Receiving node: poll the link, decode frames, hand batches to the publisher.
//! - nothing waiting is a normal outcome, not an error
//! - link failures and undecodable frames are logged, counted and dropped;
//!   the last good batch is left as it was
//! - sequence gaps are reported but never block delivery

use std::{
    sync::{Arc, atomic::AtomicBool},
    thread,
    time::Duration,
};

use log::{debug, error, info, warn};

use crate::component_b::publisher::Publisher;
use crate::link::{LinkError, LinkLayer, rssi_dbm};
use crate::protocol::{batch::Batch, error::FrameError};
use crate::utils::{
    metrics::{Event, EventRecorder, LinkMetrics, SharedMetrics},
    pacing::{Pacer, Release, pin_current_thread},
};

#[derive(Debug, Clone, PartialEq)]
pub enum RxOutcome {
    NoData,
    LinkFailure(LinkError),
    Rejected(FrameError),
    Received { batch: Batch, rssi: u8 },
}

pub struct FrameReceiver<L: LinkLayer, P: Publisher> {
    link: L,
    publisher: P,
    poll_period: Duration,
    running: Arc<AtomicBool>,
    metrics: SharedMetrics,
    event_recorder: Arc<EventRecorder>,
    last_batch: Option<Batch>,
    pin_core: Option<usize>,
}

impl<L: LinkLayer + 'static, P: Publisher + 'static> FrameReceiver<L, P> {
    pub fn new(
        link: L,
        publisher: P,
        poll_period: Duration,
        running: Arc<AtomicBool>,
        metrics: SharedMetrics,
        event_recorder: Arc<EventRecorder>,
    ) -> Self {
        Self {
            link,
            publisher,
            poll_period,
            running,
            metrics,
            event_recorder,
            last_batch: None,
            pin_core: None,
        }
    }

    pub fn pinned_to(mut self, core: Option<usize>) -> Self {
        self.pin_core = core;
        self
    }

    /// Most recent successfully decoded batch.
    pub fn last_batch(&self) -> Option<&Batch> {
        self.last_batch.as_ref()
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Pulls at most one frame off the link and decodes it.
    pub fn receive_frame(&mut self) -> RxOutcome {
        if !self.link.available() {
            LinkMetrics::bump(&self.metrics.no_data_polls);
            return RxOutcome::NoData;
        }

        let received = match self.link.receive_with_quality() {
            Ok(r) => r,
            Err(e) => {
                LinkMetrics::bump(&self.metrics.receive_failures);
                self.event_recorder.record(Event::ReceiveFailed {
                    code: e.code(),
                    ts_ns: self.event_recorder.now_ns(),
                });
                error!("[Receiver] link failed to receive: {}", e);
                return RxOutcome::LinkFailure(e);
            }
        };

        let batch = match Batch::decode(&received.frame) {
            Ok(b) => b,
            Err(e) => {
                LinkMetrics::bump(&self.metrics.frames_rejected);
                self.event_recorder.record(Event::FrameRejected {
                    ts_ns: self.event_recorder.now_ns(),
                });
                warn!("[Receiver] frame rejected: {}", e);
                return RxOutcome::Rejected(e);
            }
        };

        if let Some(prev) = &self.last_batch {
            let expected = prev.sequence().wrapping_add(1);
            if batch.sequence() != expected {
                LinkMetrics::bump(&self.metrics.sequence_gaps);
                warn!(
                    "[Receiver] sequence gap: expected {}, got {}",
                    expected,
                    batch.sequence()
                );
            }
        }

        LinkMetrics::bump(&self.metrics.frames_received);
        self.event_recorder.record(Event::FrameReceived {
            sequence: batch.sequence(),
            readings: batch.len() as u8,
            rssi: received.rssi,
            ts_ns: self.event_recorder.now_ns(),
        });
        debug!(
            "[Receiver] frame {} with {} readings, RSSI {} ({} dBm)",
            batch.sequence(),
            batch.len(),
            received.rssi,
            rssi_dbm(received.rssi)
        );

        self.last_batch = Some(batch.clone());
        RxOutcome::Received {
            batch,
            rssi: received.rssi,
        }
    }

    /// One receive poll; a decoded batch is published before returning.
    pub fn poll(&mut self) -> RxOutcome {
        let outcome = self.receive_frame();
        if let RxOutcome::Received { batch, rssi } = &outcome {
            if let Err(e) = self.publisher.publish(batch, *rssi) {
                error!("[Receiver] publish of batch {} failed: {}", batch.sequence(), e);
            }
        }
        outcome
    }

    /// Polls until `running` is cleared. Every waiting frame is drained on
    /// each release.
    pub fn run(&mut self) {
        if let Some(core) = self.pin_core {
            pin_current_thread("Receiver", core);
        }
        info!("[Receiver] started, polling every {:?}", self.poll_period);

        let mut pacer = Pacer::immediate(self.poll_period);
        while pacer.wait(&self.running) != Release::Stopped {
            while let RxOutcome::Received { .. } | RxOutcome::Rejected(_) = self.poll() {}
        }

        info!("[Receiver] stopped.");
    }

    pub fn spawn(mut self) -> thread::JoinHandle<()> {
        thread::spawn(move || self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component_b::publisher::ChannelPublisher;
    use crate::link::{LinkAddress, Received};
    use crate::protocol::{batch::Frame, layout::CAPACITY, reading::Reading};
    use std::collections::VecDeque;

    /// Hands out queued receive results in order.
    struct QueuedLink {
        inbox: VecDeque<Result<Received, LinkError>>,
    }

    impl LinkLayer for QueuedLink {
        fn send(&mut self, _: LinkAddress, _: u8, _: &Frame) -> Result<(), LinkError> {
            Ok(())
        }

        fn available(&self) -> bool {
            !self.inbox.is_empty()
        }

        fn receive_with_quality(&mut self) -> Result<Received, LinkError> {
            self.inbox.pop_front().unwrap_or(Err(LinkError::Disconnected))
        }
    }

    fn frame_of(seq: u32, n: usize) -> Frame {
        let mut b = Batch::with_sequence(seq);
        for i in 0..n {
            b.append(Reading::new(i as f32, 100.0 - i as f32));
        }
        b.encode()
    }

    fn receiver(
        inbox: Vec<Result<Received, LinkError>>,
    ) -> (
        FrameReceiver<QueuedLink, ChannelPublisher>,
        crossbeam::channel::Receiver<crate::component_b::publisher::DecodedBatch>,
        SharedMetrics,
    ) {
        let (publisher, rx) = ChannelPublisher::new(8);
        let metrics = LinkMetrics::new_shared();
        let r = FrameReceiver::new(
            QueuedLink { inbox: inbox.into() },
            publisher,
            Duration::from_millis(1),
            Arc::new(AtomicBool::new(true)),
            metrics.clone(),
            Arc::new(EventRecorder::new()),
        );
        (r, rx, metrics)
    }

    #[test]
    fn idle_link_is_no_data() {
        let (mut r, rx, metrics) = receiver(vec![]);
        assert_eq!(r.poll(), RxOutcome::NoData);
        assert!(rx.try_recv().is_err());
        assert_eq!(metrics.snapshot().no_data_polls, 1);
    }

    #[test]
    fn good_frame_is_published_with_rssi() {
        let (mut r, rx, _) = receiver(vec![Ok(Received {
            frame: frame_of(5, 3),
            rssi: 190,
        })]);

        match r.poll() {
            RxOutcome::Received { batch, rssi } => {
                assert_eq!(batch.sequence(), 5);
                assert_eq!(batch.len(), 3);
                assert_eq!(rssi, 190);
            }
            other => panic!("unexpected {:?}", other),
        }

        let published = rx.try_recv().unwrap();
        assert_eq!(published.sequence, 5);
        assert_eq!(published.rssi, 190);
        assert_eq!(published.readings[2], Reading::new(2.0, 98.0));
    }

    #[test]
    fn failures_keep_previous_batch() {
        let mut bad_index = frame_of(2, 0).as_bytes().to_vec();
        bad_index[4] = CAPACITY as u8 + 5;

        let (mut r, rx, metrics) = receiver(vec![
            Ok(Received { frame: frame_of(1, CAPACITY), rssi: 200 }),
            Err(LinkError::Status { code: 3, description: "crc".into() }),
            Ok(Received { frame: Frame::from_slice(&bad_index).unwrap(), rssi: 200 }),
        ]);

        assert!(matches!(r.poll(), RxOutcome::Received { .. }));
        assert!(matches!(r.poll(), RxOutcome::LinkFailure(LinkError::Status { code: 3, .. })));
        assert!(matches!(r.poll(), RxOutcome::Rejected(FrameError::IndexOutOfRange { .. })));

        let last = r.last_batch().unwrap();
        assert_eq!(last.sequence(), 1);
        assert_eq!(last.len(), CAPACITY);

        assert_eq!(rx.len(), 1);
        let m = metrics.snapshot();
        assert_eq!(m.frames_received, 1);
        assert_eq!(m.receive_failures, 1);
        assert_eq!(m.frames_rejected, 1);
    }

    #[test]
    fn gaps_are_counted_but_delivered() {
        let (mut r, rx, metrics) = receiver(vec![
            Ok(Received { frame: frame_of(7, 1), rssi: 1 }),
            Ok(Received { frame: frame_of(9, 1), rssi: 1 }),
            Ok(Received { frame: frame_of(10, 1), rssi: 1 }),
        ]);
        for _ in 0..3 {
            r.poll();
        }
        assert_eq!(rx.len(), 3);
        assert_eq!(metrics.snapshot().sequence_gaps, 1);
    }

    #[test]
    fn sequence_wrap_is_not_a_gap() {
        let (mut r, rx, metrics) = receiver(vec![
            Ok(Received { frame: frame_of(u32::MAX - 1, 1), rssi: 1 }),
            Ok(Received { frame: frame_of(u32::MAX, 1), rssi: 1 }),
            Ok(Received { frame: frame_of(0, 1), rssi: 1 }),
            Ok(Received { frame: frame_of(1, 1), rssi: 1 }),
        ]);
        for _ in 0..4 {
            assert!(matches!(r.poll(), RxOutcome::Received { .. }));
        }
        assert_eq!(rx.len(), 4);
        assert_eq!(r.last_batch().map(|b| b.sequence()), Some(1));
        assert_eq!(metrics.snapshot().sequence_gaps, 0);
    }
}

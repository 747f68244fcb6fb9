//! publisher.rs
//! Where decoded batches go once a frame has been received.
//!
//! The report format is one header line with the sequence number and RSSI,
//! then one line per reading:
//!
//! ```text
//! Packet Count: 12 , RSSI: 201
//!   c: 0, T: 21.00, H: 48.00
//!   c: 1, T: 21.00, H: 47.00
//! ```

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use log::info;
use std::fmt::Write;
use thiserror::Error;

use crate::protocol::{batch::Batch, reading::Reading};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("publish queue full, batch {0} dropped")]
    Full(u32),
    #[error("publish sink closed")]
    Closed,
}

pub trait Publisher: Send {
    fn publish(&mut self, batch: &Batch, rssi: u8) -> Result<(), PublishError>;
}

pub fn render_report(batch: &Batch, rssi: u8) -> String {
    let mut out = String::with_capacity(32 + batch.len() * 28);
    let _ = writeln!(out, "Packet Count: {} , RSSI: {}", batch.sequence(), rssi);
    for (i, r) in batch.readings().iter().enumerate() {
        let _ = writeln!(out, "  c: {}, T: {:.2}, H: {:.2}", i, r.temperature, r.humidity);
    }
    out
}

/// Logs each report under a topic label.
#[derive(Debug, Clone)]
pub struct LogPublisher {
    topic: String,
    published: u64,
}

impl LogPublisher {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            published: 0,
        }
    }

    pub fn published(&self) -> u64 {
        self.published
    }
}

impl Publisher for LogPublisher {
    fn publish(&mut self, batch: &Batch, rssi: u8) -> Result<(), PublishError> {
        self.published += 1;
        info!("[Publisher] {}:\n{}", self.topic, render_report(batch, rssi));
        Ok(())
    }
}

/// Owned copy of what a received frame carried.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBatch {
    pub sequence: u32,
    pub rssi: u8,
    pub readings: Vec<Reading>,
}

/// Forwards decoded batches over a bounded channel without blocking the receiver.
#[derive(Clone)]
pub struct ChannelPublisher {
    tx: Sender<DecodedBatch>,
}

impl ChannelPublisher {
    pub fn new(capacity: usize) -> (Self, Receiver<DecodedBatch>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx }, rx)
    }
}

impl Publisher for ChannelPublisher {
    fn publish(&mut self, batch: &Batch, rssi: u8) -> Result<(), PublishError> {
        let decoded = DecodedBatch {
            sequence: batch.sequence(),
            rssi,
            readings: batch.readings().to_vec(),
        };
        match self.tx.try_send(decoded) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(d)) => Err(PublishError::Full(d.sequence)),
            Err(TrySendError::Disconnected(_)) => Err(PublishError::Closed),
        }
    }
}

//! loopback.rs
//! In-memory radio pair for running both nodes in one process.
//!
//! - bounded crossbeam channel per direction (the radio's on-air buffer)
//! - fixed transmission: a frame reaches the peer only if the destination
//!   address and channel match the peer's; otherwise it is lost in the air
//!   and the sender still sees success, as with a real transceiver
//! - optional failure injection on send/receive and a random RSSI per frame

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use log::debug;
use rand::random_range;
use std::time::Duration;

use crate::link::{LinkAddress, LinkError, LinkLayer, Received};
use crate::protocol::batch::Frame;

pub const STATUS_SEND_FAILED: u8 = 2;
pub const STATUS_RECEIVE_FAILED: u8 = 4;

#[derive(Debug, Clone)]
pub struct LoopbackConfig {
    /// Frames buffered per direction before `send` blocks.
    pub queue_depth: usize,
    /// Upper bound on any blocking send/receive.
    pub timeout: Duration,
    /// Probability in [0, 1] that `send` reports a transmission failure.
    pub send_failure_rate: f64,
    /// Probability in [0, 1] that a received frame comes back as a link failure.
    pub receive_failure_rate: f64,
    /// Inclusive range of the raw RSSI byte attached to delivered frames.
    pub rssi_range: (u8, u8),
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            queue_depth: 16,
            timeout: Duration::from_secs(1),
            send_failure_rate: 0.0,
            receive_failure_rate: 0.0,
            rssi_range: (180, 230),
        }
    }
}

#[derive(Debug, Clone)]
struct Endpoint {
    address: LinkAddress,
    channel: u8,
}

/// One end of the simulated link.
pub struct LoopbackLink {
    local: Endpoint,
    peer: Endpoint,
    tx: Sender<(Frame, u8)>,
    rx: Receiver<(Frame, u8)>,
    config: LoopbackConfig,
    lost_in_air: u64,
}

impl LoopbackLink {
    /// Creates two connected endpoints sharing one channel.
    pub fn pair(
        a: LinkAddress,
        b: LinkAddress,
        channel: u8,
        config: LoopbackConfig,
    ) -> (LoopbackLink, LoopbackLink) {
        let (tx_ab, rx_ab) = bounded(config.queue_depth);
        let (tx_ba, rx_ba) = bounded(config.queue_depth);

        let ea = Endpoint { address: a, channel };
        let eb = Endpoint { address: b, channel };

        let link_a = LoopbackLink {
            local: ea.clone(),
            peer: eb.clone(),
            tx: tx_ab,
            rx: rx_ba,
            config: config.clone(),
            lost_in_air: 0,
        };
        let link_b = LoopbackLink {
            local: eb,
            peer: ea,
            tx: tx_ba,
            rx: rx_ab,
            config,
            lost_in_air: 0,
        };
        (link_a, link_b)
    }

    pub fn address(&self) -> LinkAddress {
        self.local.address
    }

    /// Frames sent to an address/channel nobody listens on.
    pub fn lost_in_air(&self) -> u64 {
        self.lost_in_air
    }

    fn roll(rate: f64) -> bool {
        if rate <= 0.0 {
            false
        } else if rate >= 1.0 {
            true
        } else {
            rand::random_bool(rate)
        }
    }

    fn rssi(&self) -> u8 {
        let (lo, hi) = self.config.rssi_range;
        if lo >= hi { lo } else { random_range(lo..=hi) }
    }
}

impl LinkLayer for LoopbackLink {
    fn send(&mut self, dest: LinkAddress, channel: u8, frame: &Frame) -> Result<(), LinkError> {
        if Self::roll(self.config.send_failure_rate) {
            return Err(LinkError::Status {
                code: STATUS_SEND_FAILED,
                description: "simulated transmission failure".into(),
            });
        }

        if dest != self.peer.address || channel != self.peer.channel {
            self.lost_in_air += 1;
            debug!(
                "[Loopback {}] frame for {} ch {} has no listener",
                self.local.address, dest, channel
            );
            return Ok(());
        }

        let rssi = self.rssi();
        match self.tx.send_timeout((frame.clone(), rssi), self.config.timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(LinkError::Timeout(self.config.timeout)),
            Err(SendTimeoutError::Disconnected(_)) => Err(LinkError::Disconnected),
        }
    }

    fn available(&self) -> bool {
        !self.rx.is_empty()
    }

    fn receive_with_quality(&mut self) -> Result<Received, LinkError> {
        let (frame, rssi) = match self.rx.recv_timeout(self.config.timeout) {
            Ok(item) => item,
            Err(RecvTimeoutError::Timeout) => return Err(LinkError::Timeout(self.config.timeout)),
            Err(RecvTimeoutError::Disconnected) => return Err(LinkError::Disconnected),
        };

        if Self::roll(self.config.receive_failure_rate) {
            return Err(LinkError::Status {
                code: STATUS_RECEIVE_FAILED,
                description: "simulated receive failure".into(),
            });
        }

        Ok(Received { frame, rssi })
    }
}

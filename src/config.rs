//! config.rs
//! Node configuration: task periods, link addressing and timeouts.
//!
//! Defaults mirror the deployed radio setup: transmitter at 00:02, receiver at
//! 00:03, channel 0x04, one frame every two minutes.

use std::time::Duration;

use crate::link::LinkAddress;
use crate::protocol::layout::{CAPACITY, sampling_period};

pub const DEFAULT_TX_PERIOD: Duration = Duration::from_secs(120);
pub const DEFAULT_CHANNEL: u8 = 0x04;
pub const DEFAULT_TX_ADDRESS: LinkAddress = LinkAddress::new(0x00, 0x02);
pub const DEFAULT_RX_ADDRESS: LinkAddress = LinkAddress::new(0x00, 0x03);
pub const DEFAULT_TOPIC: &str = "EPIC_E22/Rx_Packet";

#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Transmission (consumer) period.
    pub tx_period: Duration,
    /// Sampling (producer) period. Expected to be `tx_period / CAPACITY`, rounded up.
    pub sample_period: Duration,
    /// How often the receiver polls the link.
    pub rx_poll_period: Duration,
    /// This node's own address.
    pub local_address: LinkAddress,
    /// Where frames are sent.
    pub destination: LinkAddress,
    pub channel: u8,
    /// Bound on every link-layer call.
    pub link_timeout: Duration,
    /// Label the receiver publishes under.
    pub topic: String,
    /// Pin the periodic threads to this core, if set.
    pub pin_core: Option<usize>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::with_tx_period(DEFAULT_TX_PERIOD)
    }
}

impl NodeConfig {
    /// Config whose sampling period is derived so a batch fills exactly once
    /// per transmission.
    pub fn with_tx_period(tx_period: Duration) -> Self {
        Self {
            tx_period,
            sample_period: sampling_period(tx_period, CAPACITY),
            rx_poll_period: Duration::from_millis(100).min(tx_period),
            local_address: DEFAULT_TX_ADDRESS,
            destination: DEFAULT_RX_ADDRESS,
            channel: DEFAULT_CHANNEL,
            link_timeout: Duration::from_secs(1).min(tx_period / 2),
            topic: DEFAULT_TOPIC.to_string(),
            pin_core: None,
        }
    }

    /// Receiver-side config: addresses swapped.
    pub fn receiver(&self) -> Self {
        Self {
            local_address: self.destination,
            destination: self.local_address,
            ..self.clone()
        }
    }

    /// Sampling releases that land inside one transmission period.
    pub fn samples_per_tx(&self) -> u128 {
        if self.sample_period.is_zero() {
            return u128::MAX;
        }
        self.tx_period.as_nanos().div_ceil(self.sample_period.as_nanos())
    }

    /// Contract problems with the configuration. Empty means the cadence and
    /// timeouts are consistent; none of these stop the node from running.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.sample_period.is_zero() || self.tx_period.is_zero() {
            warnings.push("periods must be non-zero".to_string());
            return warnings;
        }

        let per_tx = self.samples_per_tx();
        if per_tx > CAPACITY as u128 {
            warnings.push(format!(
                "sample period {:?} yields {} samples per {:?} transmission but a batch holds {}; \
                 {} samples per frame will be dropped",
                self.sample_period,
                per_tx,
                self.tx_period,
                CAPACITY,
                per_tx - CAPACITY as u128
            ));
        } else if per_tx < CAPACITY as u128 {
            warnings.push(format!(
                "sample period {:?} fills only {} of {} slots per transmission",
                self.sample_period, per_tx, CAPACITY
            ));
        }

        if self.link_timeout >= self.tx_period {
            warnings.push(format!(
                "link timeout {:?} is not shorter than the transmission period {:?}",
                self.link_timeout, self.tx_period
            ));
        }

        warnings
    }
}

//! Link layer boundary.
//!
//! The radio is treated as an opaque carrier of fixed-length frames with
//! fixed-address transmission (address high/low byte plus channel) and an RSSI
//! byte reported on receive. Implementations must bound every call; nothing in
//! the tasks above retries.

pub mod loopback;

use std::time::Duration;

use thiserror::Error;

use crate::protocol::batch::Frame;

/// Fixed-transmission address (ADDH/ADDL).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkAddress {
    pub high: u8,
    pub low: u8,
}

impl LinkAddress {
    pub const fn new(high: u8, low: u8) -> Self {
        Self { high, low }
    }
}

impl std::fmt::Display for LinkAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02X}:{:02X}", self.high, self.low)
    }
}

/// Link-layer diagnostic. `code()` gives the numeric status the radio would report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("link status {code}: {description}")]
    Status { code: u8, description: String },

    #[error("link call timed out after {0:?}")]
    Timeout(Duration),

    #[error("link peer disconnected")]
    Disconnected,
}

impl LinkError {
    pub const CODE_TIMEOUT: u8 = 0xFE;
    pub const CODE_DISCONNECTED: u8 = 0xFF;

    pub fn code(&self) -> u8 {
        match self {
            LinkError::Status { code, .. } => *code,
            LinkError::Timeout(_) => Self::CODE_TIMEOUT,
            LinkError::Disconnected => Self::CODE_DISCONNECTED,
        }
    }
}

/// A frame pulled off the link together with its signal quality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub frame: Frame,
    pub rssi: u8,
}

/// Converts the radio's raw RSSI byte to dBm.
pub fn rssi_dbm(rssi: u8) -> i16 {
    -(256 - rssi as i16)
}

pub trait LinkLayer: Send {
    /// Fire-and-forget send of one frame to a fixed address/channel.
    fn send(&mut self, dest: LinkAddress, channel: u8, frame: &Frame) -> Result<(), LinkError>;

    /// Whether a frame is waiting to be read.
    fn available(&self) -> bool;

    fn receive_with_quality(&mut self) -> Result<Received, LinkError>;
}

impl<L: LinkLayer + ?Sized> LinkLayer for Box<L> {
    fn send(&mut self, dest: LinkAddress, channel: u8, frame: &Frame) -> Result<(), LinkError> {
        (**self).send(dest, channel, frame)
    }

    fn available(&self) -> bool {
        (**self).available()
    }

    fn receive_with_quality(&mut self) -> Result<Received, LinkError> {
        (**self).receive_with_quality()
    }
}

//! reading.rs
//! One temperature/humidity sample and its fixed 8-byte wire form.
//!
//! Wire layout (little-endian): `temperature f32 | humidity f32`.

/// Encoded size of one [`Reading`] on the wire.
pub const READING_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reading {
    pub temperature: f32,
    pub humidity: f32,
}

impl Reading {
    pub const ZERO: Reading = Reading {
        temperature: 0.0,
        humidity: 0.0,
    };

    pub fn new(temperature: f32, humidity: f32) -> Self {
        Self {
            temperature,
            humidity,
        }
    }

    /// Encoded form: temperature then humidity, each `f32` little-endian.
    #[inline]
    pub fn to_le_bytes(&self) -> [u8; READING_SIZE] {
        let mut out = [0u8; READING_SIZE];
        out[0..4].copy_from_slice(&self.temperature.to_le_bytes());
        out[4..8].copy_from_slice(&self.humidity.to_le_bytes());
        out
    }

    #[inline]
    pub fn from_le_bytes(bytes: [u8; READING_SIZE]) -> Self {
        let [t0, t1, t2, t3, h0, h1, h2, h3] = bytes;
        Self {
            temperature: f32::from_le_bytes([t0, t1, t2, t3]),
            humidity: f32::from_le_bytes([h0, h1, h2, h3]),
        }
    }
}

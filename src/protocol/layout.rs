//! layout.rs
//! Compile-time frame sizing.
//!
//! The radio accepts at most `FRAME_BYTES` per transmission. Everything else
//! (batch capacity, padding, the recommended sampling period) is derived from
//! that budget, the header size and the reading size:
//!
//! ```text
//! capacity      = floor((frame - header) / reading)
//! payload_bytes = capacity * reading
//! padding_bytes = frame - payload_bytes - header
//! ```
//!
//! Rounding is always down, so an encoded batch never exceeds the frame.

use std::time::Duration;

use crate::protocol::reading::READING_SIZE;

/// Hard per-frame byte ceiling of the radio (sub-packet setting 240 B).
pub const FRAME_BYTES: usize = 240;

/// Encoded header: `sequence u32 | next_index u8 | 3 reserved bytes`.
pub const HEADER_SIZE: usize = 8;

/// Sizes derived from one frame budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub frame_bytes: usize,
    pub header_bytes: usize,
    pub reading_bytes: usize,
    pub capacity: usize,
    pub payload_bytes: usize,
    pub padding_bytes: usize,
}

impl FrameLayout {
    /// Derives a layout, or `None` when the header does not fit in the frame
    /// or a reading has zero size.
    pub const fn derive(frame_bytes: usize, header_bytes: usize, reading_bytes: usize) -> Option<Self> {
        if reading_bytes == 0 || header_bytes > frame_bytes {
            return None;
        }
        let capacity = (frame_bytes - header_bytes) / reading_bytes;
        let payload_bytes = capacity * reading_bytes;
        let padding_bytes = frame_bytes - payload_bytes - header_bytes;
        Some(Self {
            frame_bytes,
            header_bytes,
            reading_bytes,
            capacity,
            payload_bytes,
            padding_bytes,
        })
    }

    /// Bytes actually occupied by header and readings.
    pub const fn used_bytes(&self) -> usize {
        self.header_bytes + self.payload_bytes
    }
}

/// Layout for this build's constants.
pub const LAYOUT: FrameLayout = match FrameLayout::derive(FRAME_BYTES, HEADER_SIZE, READING_SIZE) {
    Some(layout) => layout,
    None => panic!("frame budget cannot hold the batch header"),
};

pub const CAPACITY: usize = LAYOUT.capacity;
pub const PAYLOAD_BYTES: usize = LAYOUT.payload_bytes;
pub const PADDING_BYTES: usize = LAYOUT.padding_bytes;

// Build-time guards: the encoded batch is exactly one frame and the
// insertion index fits in its u8 header field.
const _: () = assert!(HEADER_SIZE + PAYLOAD_BYTES + PADDING_BYTES == FRAME_BYTES);
const _: () = assert!(CAPACITY > 0);
const _: () = assert!(CAPACITY <= u8::MAX as usize);

/// Sampling period that fills `capacity` slots in one transmission period,
/// rounded up so the batch is never overfilled by rounding.
pub fn sampling_period(tx_period: Duration, capacity: usize) -> Duration {
    if capacity == 0 {
        return tx_period;
    }
    let tx_ns = tx_period.as_nanos();
    let per = tx_ns.div_ceil(capacity as u128);
    Duration::from_nanos(per.min(u64::MAX as u128) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_budget_fills_frame_exactly() {
        assert_eq!(CAPACITY, 29);
        assert_eq!(PAYLOAD_BYTES, 232);
        assert_eq!(PADDING_BYTES, 0);
    }

    #[test]
    fn alternate_239_byte_budget_rounds_down() {
        let l = FrameLayout::derive(239, 8, 8).unwrap();
        assert_eq!(l.capacity, 28);
        assert_eq!(l.payload_bytes, 224);
        assert_eq!(l.padding_bytes, 7);
    }

    #[test]
    fn never_exceeds_budget() {
        for frame in 0..=512usize {
            for header in [0usize, 1, 2, 5, 8, 12] {
                for reading in 1..=16usize {
                    match FrameLayout::derive(frame, header, reading) {
                        Some(l) => {
                            assert_eq!(l.capacity, (frame - header) / reading);
                            assert!(l.used_bytes() <= frame);
                            assert_eq!(l.used_bytes() + l.padding_bytes, frame);
                            // padding never wastes a whole reading
                            assert!(l.padding_bytes < reading);
                        }
                        None => assert!(header > frame),
                    }
                }
            }
        }
    }

    #[test]
    fn zero_size_reading_is_rejected() {
        assert!(FrameLayout::derive(240, 8, 0).is_none());
    }

    #[test]
    fn sampling_period_rounds_up() {
        // 2 min / 29 = 4137.93.. ms
        let p = sampling_period(Duration::from_secs(120), 29);
        assert!(p * 29 >= Duration::from_secs(120));
        assert!(p * 28 < Duration::from_secs(120));

        assert_eq!(
            sampling_period(Duration::from_millis(290), 29),
            Duration::from_millis(10)
        );
    }
}

//! batch.rs
//! The outbound/inbound batch: a header plus a bounded run of readings,
//! encoded into exactly one radio frame.
//!
//! Wire layout (little-endian, `FRAME_BYTES` total):
//!
//! ```text
//! [0..4)   sequence     u32
//! [4]      next_index   u8
//! [5..8)   reserved     zero
//! [8..)    readings     CAPACITY x (temperature f32, humidity f32)
//! [..end)  padding      zero
//! ```
//!
//! Slots at or beyond `next_index` are carried on the wire but ignored on decode.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::protocol::{
    error::FrameError,
    layout::{CAPACITY, FRAME_BYTES, HEADER_SIZE, PAYLOAD_BYTES},
    reading::{READING_SIZE, Reading},
};

const SEQUENCE_OFFSET: usize = 0;
const INDEX_OFFSET: usize = 4;
const READINGS_OFFSET: usize = HEADER_SIZE;
const PADDING_OFFSET: usize = HEADER_SIZE + PAYLOAD_BYTES;

/// Batch shared between the sampling and transmission tasks.
pub type SharedBatch = Arc<Mutex<Batch>>;

pub fn shared_batch() -> SharedBatch {
    Arc::new(Mutex::new(Batch::new()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchHeader {
    pub sequence: u32,
    pub next_index: u8,
}

/// One encoded batch, exactly as it travels over the link.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame([u8; FRAME_BYTES]);

impl Frame {
    pub fn zeroed() -> Self {
        Frame([0u8; FRAME_BYTES])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Copies raw link bytes into a frame. Anything but `FRAME_BYTES` is rejected.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() != FRAME_BYTES {
            return Err(FrameError::WrongLength {
                expected: FRAME_BYTES,
                actual: bytes.len(),
            });
        }
        let mut buf = [0u8; FRAME_BYTES];
        buf.copy_from_slice(bytes);
        Ok(Frame(buf))
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // hex dump, eight bytes per group
        write!(f, "Frame[")?;
        for (i, chunk) in self.0.chunks(8).enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            for b in chunk {
                write!(f, "{:02X}", b)?;
            }
        }
        write!(f, "]")
    }
}

/// Fixed-capacity, append-only batch of readings.
///
/// `append`, `clear` and `advance_sequence` are the only mutators, so
/// `next_index <= CAPACITY` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    header: BatchHeader,
    readings: [Reading; CAPACITY],
}

impl Default for Batch {
    fn default() -> Self {
        Self::new()
    }
}

impl Batch {
    pub fn new() -> Self {
        Self {
            header: BatchHeader::default(),
            readings: [Reading::ZERO; CAPACITY],
        }
    }

    /// Empty batch that will go out with the given sequence number.
    pub fn with_sequence(sequence: u32) -> Self {
        let mut b = Self::new();
        b.header.sequence = sequence;
        b
    }

    pub const fn capacity() -> usize {
        CAPACITY
    }

    pub fn header(&self) -> BatchHeader {
        self.header
    }

    pub fn sequence(&self) -> u32 {
        self.header.sequence
    }

    pub fn len(&self) -> usize {
        self.header.next_index as usize
    }

    pub fn is_empty(&self) -> bool {
        self.header.next_index == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= CAPACITY
    }

    /// Readings currently held, in append order.
    pub fn readings(&self) -> &[Reading] {
        &self.readings[..self.len()]
    }

    /// Appends at `next_index`. Returns `false` and leaves the batch untouched
    /// when it is already full.
    pub fn append(&mut self, reading: Reading) -> bool {
        if self.is_full() {
            return false;
        }
        self.readings[self.len()] = reading;
        self.header.next_index += 1;
        true
    }

    /// Zeroes every slot and rewinds the insertion index. The sequence is kept.
    pub fn clear(&mut self) {
        self.readings = [Reading::ZERO; CAPACITY];
        self.header.next_index = 0;
    }

    pub fn advance_sequence(&mut self) {
        self.header.sequence = self.header.sequence.wrapping_add(1);
    }

    /// Hands the current contents to the transmitter and resets for the next
    /// period: returns a copy, then advances the sequence and clears.
    pub fn take_for_transmit(&mut self) -> Batch {
        let out = self.clone();
        self.advance_sequence();
        self.clear();
        out
    }

    /// Every slot, including those past `next_index`.
    pub(crate) fn slots(&self) -> &[Reading; CAPACITY] {
        &self.readings
    }

    pub fn encode(&self) -> Frame {
        let mut buf = [0u8; FRAME_BYTES];

        buf[SEQUENCE_OFFSET..SEQUENCE_OFFSET + 4].copy_from_slice(&self.header.sequence.to_le_bytes());
        buf[INDEX_OFFSET] = self.header.next_index;

        for (slot, reading) in buf[READINGS_OFFSET..PADDING_OFFSET]
            .chunks_exact_mut(READING_SIZE)
            .zip(self.readings.iter())
        {
            slot.copy_from_slice(&reading.to_le_bytes());
        }

        Frame(buf)
    }

    /// Decodes a frame, rejecting an insertion index past capacity.
    /// Only the first `next_index` readings are taken; the rest read as zero.
    pub fn decode(frame: &Frame) -> Result<Batch, FrameError> {
        let bytes = &frame.0;

        let mut seq = [0u8; 4];
        seq.copy_from_slice(&bytes[SEQUENCE_OFFSET..SEQUENCE_OFFSET + 4]);
        let next_index = bytes[INDEX_OFFSET];

        if next_index as usize > CAPACITY {
            return Err(FrameError::IndexOutOfRange {
                next_index,
                capacity: CAPACITY,
            });
        }

        let mut batch = Batch::with_sequence(u32::from_le_bytes(seq));
        for chunk in bytes[READINGS_OFFSET..PADDING_OFFSET]
            .chunks_exact(READING_SIZE)
            .take(next_index as usize)
        {
            let mut raw = [0u8; READING_SIZE];
            raw.copy_from_slice(chunk);
            batch.append(Reading::from_le_bytes(raw));
        }
        Ok(batch)
    }

    /// Decodes raw link bytes, checking the length first.
    pub fn decode_bytes(bytes: &[u8]) -> Result<Batch, FrameError> {
        Batch::decode(&Frame::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(i: usize) -> Reading {
        Reading::new(20.0 + i as f32 * 0.5, 40.0 + i as f32)
    }

    fn filled(n: usize) -> Batch {
        let mut b = Batch::new();
        for i in 0..n {
            assert!(b.append(reading(i)));
        }
        b
    }

    #[test]
    fn full_after_capacity_appends() {
        let mut b = filled(CAPACITY);
        assert!(b.is_full());
        assert_eq!(b.len(), CAPACITY);

        let before = b.clone();
        assert!(!b.append(Reading::new(99.0, 99.0)));
        assert_eq!(b, before);
        assert_eq!(b.header().next_index as usize, CAPACITY);
    }

    #[test]
    fn appends_keep_arrival_order() {
        let b = filled(5);
        let got: Vec<f32> = b.readings().iter().map(|r| r.temperature).collect();
        assert_eq!(got, vec![20.0, 20.5, 21.0, 21.5, 22.0]);
    }

    #[test]
    fn clear_zeroes_slots_and_keeps_sequence() {
        let mut b = filled(CAPACITY);
        b.advance_sequence();
        b.advance_sequence();
        b.clear();

        assert!(!b.is_full());
        assert!(b.is_empty());
        assert_eq!(b.sequence(), 2);
        assert!(b.slots().iter().all(|r| *r == Reading::ZERO));
    }

    #[test]
    fn sequence_wraps() {
        let mut b = Batch::with_sequence(u32::MAX);
        b.advance_sequence();
        assert_eq!(b.sequence(), 0);
    }

    #[test]
    fn take_for_transmit_snapshots_then_resets() {
        let mut b = filled(3);
        let sent = b.take_for_transmit();

        assert_eq!(sent.sequence(), 0);
        assert_eq!(sent.len(), 3);
        assert_eq!(b.sequence(), 1);
        assert!(b.is_empty());
    }

    #[test]
    fn encoded_header_layout() {
        let mut b = Batch::with_sequence(0x0403_0201);
        b.append(Reading::new(1.5, 2.5));
        let frame = b.encode();
        let bytes = frame.as_bytes();

        assert_eq!(bytes.len(), FRAME_BYTES);
        assert_eq!(&bytes[0..4], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(bytes[4], 1);
        assert_eq!(&bytes[5..8], &[0, 0, 0]);
        assert_eq!(&bytes[8..12], &1.5f32.to_le_bytes());
        assert_eq!(&bytes[12..16], &2.5f32.to_le_bytes());
        assert!(bytes[PADDING_OFFSET..].iter().all(|b| *b == 0));
    }

    #[test]
    fn decode_restores_header_and_held_readings() {
        for n in [0usize, 1, 7, CAPACITY - 1, CAPACITY] {
            let mut b = filled(n);
            b.header.sequence = 77;
            let back = Batch::decode(&b.encode()).unwrap();
            assert_eq!(back.header(), b.header());
            assert_eq!(back.readings(), b.readings());
        }
    }

    #[test]
    fn decode_rejects_index_past_capacity() {
        let mut bytes = Batch::new().encode().as_bytes().to_vec();
        bytes[INDEX_OFFSET] = CAPACITY as u8 + 1;

        let err = Batch::decode_bytes(&bytes).unwrap_err();
        assert_eq!(
            err,
            FrameError::IndexOutOfRange {
                next_index: CAPACITY as u8 + 1,
                capacity: CAPACITY,
            }
        );
    }

    #[test]
    fn decode_rejects_short_frame() {
        let err = Batch::decode_bytes(&[0u8; FRAME_BYTES - 1]).unwrap_err();
        assert!(matches!(err, FrameError::WrongLength { actual, .. } if actual == FRAME_BYTES - 1));
    }

    #[test]
    fn decode_ignores_stale_slots() {
        let mut b = filled(4);
        let mut bytes = b.encode().as_bytes().to_vec();
        // garbage in slot 4, which the header says is unused
        bytes[READINGS_OFFSET + 4 * READING_SIZE] = 0xAA;
        b = Batch::decode_bytes(&bytes).unwrap();
        assert_eq!(b.len(), 4);
        assert_eq!(b.slots()[4], Reading::ZERO);
    }
}

//! Frame decode failures.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame is {actual} bytes, expected {expected}")]
    WrongLength { expected: usize, actual: usize },

    /// Header claims more readings than a frame can carry.
    #[error("next_index {next_index} exceeds capacity {capacity}")]
    IndexOutOfRange { next_index: u8, capacity: usize },
}

//! # lora_batch
//! Batches periodic temperature/humidity readings into fixed-size radio frames
//! and reassembles them on the receiving side.
//!
//! - `protocol`: reading codec, compile-time frame sizing, the batch and its wire format
//! - `link`: link-layer boundary and an in-memory loopback radio
//! - `component_a`: transmitting node: sensor, sampling task, transmission task
//! - `component_b`: receiving node: frame receiver and publishing sinks
//! - `advanced`: tokio variant of the transmitting node
//! - `utils`: periodic release, counters/event log, CSV export

pub mod protocol;
pub mod link;
pub mod config;
pub mod component_a;
pub mod component_b;
pub mod advanced;
pub mod simulation;
pub mod utils;

// Shared plumbing: periodic release, counters/event log, end-of-run export.

pub mod pacing;
pub mod metrics;
pub mod export;

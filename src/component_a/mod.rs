// Component A: transmitting node
// Samples the sensor on a short period into the shared batch and ships the
// batch as one fixed-size radio frame on a longer period.

pub mod sensor;
pub mod sampler;
pub mod transmitter;

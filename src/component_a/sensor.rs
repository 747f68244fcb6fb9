//! sensor.rs
//! Temperature/humidity source for the sampling task.
//! - `SensorSource` is the driver boundary; a real DHT22 driver would implement it
//! - `SimulatedSensor` produces bounded random readings with optional dropouts

use rand::random_range;
use thiserror::Error;

use crate::protocol::reading::Reading;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    /// Driver returned nothing this tick; the sampler skips it.
    #[error("sensor unavailable: {0}")]
    Unavailable(String),
}

pub trait SensorSource: Send {
    fn sample(&mut self) -> Result<Reading, SensorError>;
}

impl<F> SensorSource for F
where
    F: FnMut() -> Result<Reading, SensorError> + Send,
{
    fn sample(&mut self) -> Result<Reading, SensorError> {
        self()
    }
}

/// Random readings in whole degrees/percent, like a freshly powered DHT22 bench rig.
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    pub temperature_range: (f32, f32),
    pub humidity_range: (f32, f32),
    /// Probability in [0, 1] that a sample comes back unavailable.
    pub dropout_rate: f64,
    samples: u64,
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self {
            temperature_range: (0.0, 40.0),
            humidity_range: (0.0, 100.0),
            dropout_rate: 0.0,
            samples: 0,
        }
    }
}

impl SimulatedSensor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dropout(mut self, rate: f64) -> Self {
        self.dropout_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn samples_taken(&self) -> u64 {
        self.samples
    }

    fn whole(range: (f32, f32)) -> f32 {
        let (lo, hi) = (range.0.floor() as i32, range.1.floor() as i32);
        if lo >= hi {
            return lo as f32;
        }
        random_range(lo..hi) as f32
    }
}

impl SensorSource for SimulatedSensor {
    fn sample(&mut self) -> Result<Reading, SensorError> {
        if self.dropout_rate > 0.0 && rand::random_bool(self.dropout_rate) {
            return Err(SensorError::Unavailable("simulated read timeout".into()));
        }
        self.samples += 1;
        Ok(Reading::new(
            Self::whole(self.temperature_range),
            Self::whole(self.humidity_range),
        ))
    }
}

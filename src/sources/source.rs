//! SignalSource trait and Sample definition

use std::time::Duration;

use crate::error::SourceError;

/// One respiration reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Time since the source started (monotonic)
    pub timestamp: Duration,

    /// Raw amplitude as delivered by the sensor
    pub amplitude: f64,
}

impl Sample {
    pub fn new(timestamp: Duration, amplitude: f64) -> Self {
        Self {
            timestamp,
            amplitude,
        }
    }
}

/// Result of pulling from a source
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceEvent {
    /// A new sample
    Sample(Sample),
    /// Nothing arrived within the poll interval
    Pending,
    /// The recording is exhausted
    End,
}

/// A stream of timestamped respiration samples
pub trait SignalSource: Send {
    /// Get the name of this source
    fn name(&self) -> &str;

    /// Nominal sample rate in Hz
    fn sample_rate(&self) -> f64;

    /// Pull the next sample.
    ///
    /// Live sources return `Pending` when idle and `Err(Disconnected)`
    /// when the producer goes away; they never return `End`.
    fn next_sample(&mut self) -> Result<SourceEvent, SourceError>;

    /// The full set of raw amplitudes, for sources known ahead of time.
    ///
    /// Finite sources return `Some`, which selects exhaustive calibration.
    fn dataset(&self) -> Option<&[f64]> {
        None
    }
}

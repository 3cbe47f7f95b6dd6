//! Calibration window
//!
//! Collects filtered amplitudes and reduces them to the subject's
//! `[min, max]` range. A live source uses a timed window measured on
//! sample timestamps; a recording is scanned end to end.

use std::time::Duration;

use crate::error::CalibrationError;

/// Calibrated amplitude range, `min < max` once built
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationRange {
    min: f64,
    max: f64,
}

impl CalibrationRange {
    /// Build a range, rejecting widths below `min_width`.
    pub fn new(min: f64, max: f64, min_width: f64) -> Result<Self, CalibrationError> {
        let width = max - min;
        if !(width >= min_width) || width <= 0.0 {
            return Err(CalibrationError::FlatSignal {
                width: if width.is_finite() { width } else { 0.0 },
                min_range: min_width,
            });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }
}

/// How the window decides it is complete
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationPolicy {
    /// Complete once sample timestamps span `duration`
    Timed { duration: Duration },
    /// Complete only when the whole dataset has been observed
    Exhaustive,
}

/// Running min/max over the calibration window
#[derive(Debug, Clone)]
pub struct CalibrationWindow {
    policy: CalibrationPolicy,
    min_width: f64,
    start: Option<Duration>,
    last: Duration,
    min: f64,
    max: f64,
    count: usize,
}

impl CalibrationWindow {
    pub fn new(policy: CalibrationPolicy, min_width: f64) -> Self {
        Self {
            policy,
            min_width,
            start: None,
            last: Duration::ZERO,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            count: 0,
        }
    }

    pub fn timed(duration: Duration, min_width: f64) -> Self {
        Self::new(CalibrationPolicy::Timed { duration }, min_width)
    }

    pub fn exhaustive(min_width: f64) -> Self {
        Self::new(CalibrationPolicy::Exhaustive, min_width)
    }

    pub fn policy(&self) -> CalibrationPolicy {
        self.policy
    }

    /// Number of samples observed so far
    pub fn count(&self) -> usize {
        self.count
    }

    /// Time covered by the observed samples
    pub fn elapsed(&self) -> Duration {
        self.start
            .map(|start| self.last.saturating_sub(start))
            .unwrap_or_default()
    }

    /// Observe one filtered sample.
    ///
    /// Returns the finished range when a timed window expires. The window
    /// is strictly elapsed time: it does not wait for a breath cycle to
    /// complete.
    pub fn observe(
        &mut self,
        timestamp: Duration,
        value: f64,
    ) -> Result<Option<CalibrationRange>, CalibrationError> {
        let start = *self.start.get_or_insert(timestamp);
        self.last = self.last.max(timestamp);

        if value.is_finite() {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
            self.count += 1;
        }

        match self.policy {
            CalibrationPolicy::Timed { duration } if timestamp.saturating_sub(start) >= duration => {
                self.range().map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Close the window at the end of the data.
    pub fn finish(&self) -> Result<CalibrationRange, CalibrationError> {
        if let CalibrationPolicy::Timed { duration } = self.policy {
            if self.elapsed() < duration {
                return Err(CalibrationError::Incomplete {
                    observed: self.elapsed(),
                    required: duration,
                });
            }
        }
        self.range()
    }

    fn range(&self) -> Result<CalibrationRange, CalibrationError> {
        if self.count == 0 {
            return Err(CalibrationError::Empty);
        }
        CalibrationRange::new(self.min, self.max, self.min_width)
    }
}

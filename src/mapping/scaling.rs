//! Amplitude to MIDI value scaling

use crate::error::ConfigError;
use crate::signal::CalibrationRange;

/// Output domain of the scaling model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputDomain {
    /// Note numbers `low..=high`
    Notes { low: u8, high: u8 },
    /// Controller values 0-127
    Controller,
}

impl OutputDomain {
    fn bounds(self) -> (u8, u8) {
        match self {
            OutputDomain::Notes { low, high } => (low, high),
            OutputDomain::Controller => (0, 127),
        }
    }
}

/// Immutable mapping from a filtered amplitude to a MIDI value.
///
/// Amplitudes outside the calibrated range clamp to the nearest bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalingModel {
    range: CalibrationRange,
    domain: OutputDomain,
    low: u8,
    high: u8,
}

impl ScalingModel {
    pub fn new(range: CalibrationRange, domain: OutputDomain) -> Result<Self, ConfigError> {
        let (low, high) = domain.bounds();
        if high > 127 {
            return Err(ConfigError::OutOfMidiRange {
                field: "note_high",
                value: high,
            });
        }
        if low > high {
            return Err(ConfigError::NoteBounds { low, high });
        }
        Ok(Self {
            range,
            domain,
            low,
            high,
        })
    }

    pub fn range(&self) -> CalibrationRange {
        self.range
    }

    pub fn domain(&self) -> OutputDomain {
        self.domain
    }

    /// Output bounds, inclusive
    pub fn bounds(&self) -> (u8, u8) {
        (self.low, self.high)
    }

    /// Position of `amplitude` within the calibrated range, clamped to 0..=1
    pub fn normalize(&self, amplitude: f64) -> f64 {
        let t = (amplitude - self.range.min()) / self.range.width();
        if t.is_nan() {
            0.0
        } else {
            t.clamp(0.0, 1.0)
        }
    }

    /// Map a filtered amplitude into the output domain
    pub fn scale(&self, amplitude: f64) -> u8 {
        let t = self.normalize(amplitude);
        let span = f64::from(self.high - self.low);
        self.low + (t * span).round() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn range(min: f64, max: f64) -> CalibrationRange {
        CalibrationRange::new(min, max, 1e-6).unwrap()
    }

    #[test]
    fn test_midpoint_maps_to_middle_note() {
        let model =
            ScalingModel::new(range(0.2, 0.8), OutputDomain::Notes { low: 48, high: 72 }).unwrap();

        assert!((model.normalize(0.5) - 0.5).abs() < 1e-12);
        assert_eq!(model.scale(0.5), 60);
    }

    #[test]
    fn test_out_of_range_clamps() {
        let model =
            ScalingModel::new(range(0.2, 0.8), OutputDomain::Notes { low: 48, high: 72 }).unwrap();

        assert_eq!(model.normalize(1.5), 1.0);
        assert_eq!(model.scale(1.5), 72);
        assert_eq!(model.scale(-3.0), 48);
    }

    #[test]
    fn test_controller_domain() {
        let model = ScalingModel::new(range(-1.0, 1.0), OutputDomain::Controller).unwrap();

        assert_eq!(model.bounds(), (0, 127));
        assert_eq!(model.scale(-1.0), 0);
        assert_eq!(model.scale(1.0), 127);
        assert_eq!(model.scale(0.0), 64); // 63.5 rounds away from zero
    }

    #[test]
    fn test_single_note_domain() {
        let model =
            ScalingModel::new(range(0.0, 1.0), OutputDomain::Notes { low: 60, high: 60 }).unwrap();
        assert_eq!(model.scale(0.0), 60);
        assert_eq!(model.scale(1.0), 60);
    }

    #[test]
    fn test_non_finite_amplitude() {
        let model = ScalingModel::new(range(0.0, 1.0), OutputDomain::Controller).unwrap();
        assert_eq!(model.scale(f64::NAN), 0);
        assert_eq!(model.scale(f64::INFINITY), 127);
        assert_eq!(model.scale(f64::NEG_INFINITY), 0);
    }

    #[test]
    fn test_rejects_bad_bounds() {
        assert!(matches!(
            ScalingModel::new(range(0.0, 1.0), OutputDomain::Notes { low: 72, high: 48 }),
            Err(ConfigError::NoteBounds { .. })
        ));
        assert!(matches!(
            ScalingModel::new(range(0.0, 1.0), OutputDomain::Notes { low: 0, high: 200 }),
            Err(ConfigError::OutOfMidiRange { .. })
        ));
    }

    proptest! {
        #[test]
        fn scaled_notes_stay_in_bounds(
            min in -10.0f64..10.0,
            width in 1e-3f64..10.0,
            low in 0u8..=127,
            span in 0u8..=127,
            input in prop::num::f64::ANY,
        ) {
            let high = low.saturating_add(span).min(127);
            let model = ScalingModel::new(
                range(min, min + width),
                OutputDomain::Notes { low, high },
            ).unwrap();

            let note = model.scale(input);
            prop_assert!(note >= low && note <= high, "{} not in {}..={}", note, low, high);
        }

        #[test]
        fn scaled_controller_stays_in_bounds(
            min in -10.0f64..10.0,
            width in 1e-3f64..10.0,
            input in -1e6f64..1e6,
        ) {
            let model = ScalingModel::new(range(min, min + width), OutputDomain::Controller).unwrap();
            prop_assert!(model.scale(input) <= 127);
        }

        #[test]
        fn scaling_is_monotonic(
            a in -5.0f64..5.0,
            b in -5.0f64..5.0,
        ) {
            let model = ScalingModel::new(range(-1.0, 1.0), OutputDomain::Controller).unwrap();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(model.scale(lo) <= model.scale(hi));
        }
    }
}

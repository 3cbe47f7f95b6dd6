//! Low-pass smoothing for the respiration stream.
//!
//! Second-order Butterworth section (RBJ biquad, Q = 1/sqrt(2)) run in
//! Direct Form II transposed. The first finite input primes the state to
//! steady state, so the output starts at the input level instead of
//! ringing up from zero.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

use tracing::warn;

/// Biquad filter coefficients, normalized by a0
#[derive(Debug, Clone, Copy, PartialEq)]
struct Coefficients {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Coefficients {
    fn low_pass(cutoff: f64, sample_rate: f64) -> Self {
        let omega = 2.0 * PI * cutoff / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let alpha = sin_omega / (2.0 * FRAC_1_SQRT_2);

        let b0 = (1.0 - cos_omega) / 2.0;
        let b1 = 1.0 - cos_omega;
        let b2 = (1.0 - cos_omega) / 2.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_omega;
        let a2 = 1.0 - alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Stateful low-pass filter for one amplitude stream
#[derive(Debug, Clone)]
pub struct Filter {
    sample_rate: f64,
    cutoff: f64,
    coeffs: Coefficients,

    // Filter state (Direct Form II transposed)
    z1: f64,
    z2: f64,
    primed: bool,

    last_output: Option<f64>,
    clamped: u64,
}

impl Filter {
    /// Create a low-pass filter.
    ///
    /// `cutoff` must be positive and below Nyquist; the engine validates
    /// this before constructing one.
    pub fn new(cutoff: f64, sample_rate: f64) -> Self {
        Self {
            sample_rate,
            cutoff,
            coeffs: Coefficients::low_pass(cutoff, sample_rate),
            z1: 0.0,
            z2: 0.0,
            primed: false,
            last_output: None,
            clamped: 0,
        }
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Number of non-finite inputs replaced by the last valid output
    pub fn clamped(&self) -> u64 {
        self.clamped
    }

    /// Forget all history. The next finite input primes the state again.
    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
        self.primed = false;
        self.last_output = None;
        self.clamped = 0;
    }

    /// Filter one raw amplitude.
    ///
    /// A non-finite input yields the last filtered value, or `None` when
    /// no finite input has been seen yet.
    pub fn apply(&mut self, input: f64) -> Option<f64> {
        if !input.is_finite() {
            self.clamped += 1;
            warn!(
                input,
                held = ?self.last_output,
                "non-finite amplitude, holding last filtered value"
            );
            return self.last_output;
        }

        if !self.primed {
            self.prime(input);
        }

        let c = self.coeffs;
        let output = c.b0 * input + self.z1;
        self.z1 = c.b1 * input - c.a1 * output + self.z2;
        self.z2 = c.b2 * input - c.a2 * output;

        self.last_output = Some(output);
        Some(output)
    }

    /// Load the state a constant `level` input would have settled to.
    fn prime(&mut self, level: f64) {
        let c = self.coeffs;
        self.z1 = level * (1.0 - c.b0);
        self.z2 = level * (c.b2 - c.a2);
        self.primed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unity_dc_gain() {
        let c = Coefficients::low_pass(1.0, 100.0);
        let gain = (c.b0 + c.b1 + c.b2) / (1.0 + c.a1 + c.a2);
        assert!((gain - 1.0).abs() < 1e-9, "gain={}", gain);
    }

    #[test]
    fn test_first_input_has_no_transient() {
        let mut filter = Filter::new(1.0, 1000.0);

        for _ in 0..500 {
            let y = filter.apply(0.75).unwrap();
            assert!((y - 0.75).abs() < 1e-9, "expected 0.75, got {}", y);
        }
    }

    #[test]
    fn test_deterministic_for_same_history() {
        let input: Vec<f64> = (0..2000)
            .map(|i| (2.0 * PI * 0.25 * i as f64 / 1000.0).sin())
            .collect();

        let mut a = Filter::new(1.0, 1000.0);
        let mut b = Filter::new(1.0, 1000.0);
        let out_a: Vec<Option<f64>> = input.iter().map(|&x| a.apply(x)).collect();
        let out_b: Vec<Option<f64>> = input.iter().map(|&x| b.apply(x)).collect();
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn test_reset_reproduces_output() {
        let input: Vec<f64> = (0..500).map(|i| (i % 37) as f64 * 0.01).collect();
        let mut filter = Filter::new(2.0, 100.0);

        let first: Vec<Option<f64>> = input.iter().map(|&x| filter.apply(x)).collect();
        filter.reset();
        assert_eq!(filter.apply(f64::NAN), None);
        filter.reset();
        let second: Vec<Option<f64>> = input.iter().map(|&x| filter.apply(x)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_lowpass_attenuates_high_frequencies() {
        let mut filter = Filter::new(1.0, 1000.0);

        // 50 Hz noise riding on the breathing band
        let mut max_output = 0.0f64;
        for i in 0..5000 {
            let t = i as f64 / 1000.0;
            let output = filter.apply((2.0 * PI * 50.0 * t).sin()).unwrap();
            if i > 1000 {
                max_output = max_output.max(output.abs());
            }
        }

        assert!(max_output < 0.01, "expected attenuation, got {}", max_output);
    }

    #[test]
    fn test_lowpass_passes_breathing_rate() {
        let mut filter = Filter::new(1.0, 100.0);

        // 15 breaths per minute
        let freq = 0.25;
        let mut max_output = 0.0f64;
        for i in 0..6000 {
            let t = i as f64 / 100.0;
            let output = filter.apply((2.0 * PI * freq * t).sin()).unwrap();
            if i > 2000 {
                max_output = max_output.max(output.abs());
            }
        }

        assert!(max_output > 0.9, "expected passthrough, got {}", max_output);
    }

    #[test]
    fn test_nan_holds_last_value() {
        let mut filter = Filter::new(1.0, 100.0);
        let y = filter.apply(0.4);

        assert_eq!(filter.apply(f64::NAN), y);
        assert_eq!(filter.apply(f64::INFINITY), y);
        assert_eq!(filter.clamped(), 2);

        // State was not touched by the bad samples
        let next = filter.apply(0.4).unwrap();
        assert!((next - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_nan_before_any_data() {
        let mut filter = Filter::new(1.0, 100.0);
        assert_eq!(filter.apply(f64::NAN), None);
        assert_eq!(filter.apply(f64::NEG_INFINITY), None);
        assert_eq!(filter.clamped(), 2);

        // First finite sample still primes the state
        assert!((filter.apply(0.3).unwrap() - 0.3).abs() < 1e-9);
    }
}

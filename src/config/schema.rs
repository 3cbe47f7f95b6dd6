//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Main configuration for resp-midi
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RespConfig {
    /// MIDI output settings
    pub midi: MidiSettings,

    /// Low-pass smoothing
    pub filter: FilterSettings,

    /// Calibration window
    pub calibration: CalibrationSettings,

    /// CC throttling
    pub throttle: ThrottleSettings,

    /// Signal source
    pub source: SourceSettings,
}

impl RespConfig {
    /// Validate everything that does not depend on the source.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let midi = &self.midi;
        for (field, value) in [
            ("note_low", midi.note_low),
            ("note_high", midi.note_high),
            ("cc", midi.cc),
            ("velocity", midi.velocity),
        ] {
            if value > 127 {
                return Err(ConfigError::OutOfMidiRange { field, value });
            }
        }
        if midi.note_low > midi.note_high {
            return Err(ConfigError::NoteBounds {
                low: midi.note_low,
                high: midi.note_high,
            });
        }
        if midi.channel > 15 {
            return Err(ConfigError::Channel(midi.channel));
        }
        if !(self.filter.cutoff_hz > 0.0) {
            return Err(ConfigError::Cutoff {
                cutoff: self.filter.cutoff_hz,
                nyquist: f64::INFINITY,
            });
        }

        seconds("calibration.duration_secs", self.calibration.duration_secs)?;
        positive("calibration.min_range", self.calibration.min_range)?;
        seconds("calibration.stall_timeout_secs", self.calibration.stall_timeout_secs)?;

        if let Some(rate) = self.source.sample_rate {
            if !(rate > 0.0) || !rate.is_finite() {
                return Err(ConfigError::SampleRate(rate));
            }
            self.validate_for_rate(rate)?;
        }

        Ok(())
    }

    /// Validate the settings that depend on the source sample rate.
    pub fn validate_for_rate(&self, sample_rate: f64) -> Result<(), ConfigError> {
        if !(sample_rate > 0.0) || !sample_rate.is_finite() {
            return Err(ConfigError::SampleRate(sample_rate));
        }
        let nyquist = sample_rate / 2.0;
        let cutoff = self.filter.cutoff_hz;
        if !(cutoff > 0.0) || cutoff >= nyquist {
            return Err(ConfigError::Cutoff { cutoff, nyquist });
        }
        Ok(())
    }

    /// Sample rate for a live source, falling back to the live default.
    pub fn live_sample_rate(&self) -> f64 {
        self.source.sample_rate.unwrap_or(DEFAULT_LIVE_RATE)
    }

    /// Sample rate for a recording, falling back to the recorded default.
    pub fn recorded_sample_rate(&self) -> f64 {
        self.source.sample_rate.unwrap_or(DEFAULT_RECORDED_RATE)
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

/// A positive number of seconds that also fits in a `Duration`.
fn seconds(field: &'static str, value: f64) -> Result<(), ConfigError> {
    positive(field, value)?;
    Duration::try_from_secs_f64(value)
        .map(|_| ())
        .map_err(|_| ConfigError::DurationTooLong { field, value })
}

/// Nominal rate assumed for live streams that do not declare one.
pub const DEFAULT_LIVE_RATE: f64 = 100.0;

/// Rate of the bundled simulated recordings.
pub const DEFAULT_RECORDED_RATE: f64 = 1000.0;

/// MIDI output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiSettings {
    /// Output port name (substring match)
    pub port: String,

    /// MIDI channel 0-15
    pub channel: u8,

    /// Note-on velocity
    pub velocity: u8,

    /// Controller number for modulation mode
    pub cc: u8,

    /// Lowest note for play mode
    pub note_low: u8,

    /// Highest note for play mode
    pub note_high: u8,
}

impl Default for MidiSettings {
    fn default() -> Self {
        Self {
            port: "HCI 1".to_string(),
            channel: 0,
            velocity: 100,
            cc: 115,
            note_low: 40,  // E2
            note_high: 80, // G#5
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Low-pass cutoff in Hz (default: 1.0)
    pub cutoff_hz: f64,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self { cutoff_hz: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    /// Length of the live calibration window (default: 30s)
    pub duration_secs: f64,

    /// Smallest amplitude swing accepted as a usable range
    pub min_range: f64,

    /// How long a live source may stay silent before the run fails
    pub stall_timeout_secs: f64,
}

impl CalibrationSettings {
    /// Calibration window; saturates for values `validate` would reject.
    pub fn duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.duration_secs).unwrap_or(Duration::MAX)
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.stall_timeout_secs).unwrap_or(Duration::MAX)
    }
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            duration_secs: 30.0,
            min_range: 1e-4,
            stall_timeout_secs: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleSettings {
    /// Minimum spacing between CC messages (default: 10ms)
    pub interval_ms: u64,

    /// A CC change at least this large is sent regardless of spacing
    pub jump_threshold: u8,
}

impl ThrottleSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            interval_ms: 10,
            jump_threshold: 8,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Declared sample rate. Defaults depend on the source kind.
    pub sample_rate: Option<f64>,

    /// CSV recording for prerecorded runs
    pub input_file: Option<PathBuf>,

    /// Column holding the respiration channel
    pub column: usize,

    /// UDP address to listen on for live data (stdin when unset)
    pub udp: Option<String>,
}

/// What the scaled signal drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Note on/off within the configured note bounds
    Play,
    /// Control change 0-127 on the configured controller
    Modulate,
}

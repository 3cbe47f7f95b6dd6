//! Error types for resp-midi.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Invalid configuration. Always raised before any port or stream is opened.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("note bounds out of order: low {low} > high {high}")]
    NoteBounds { low: u8, high: u8 },

    #[error("{field} must be within 0-127, got {value}")]
    OutOfMidiRange { field: &'static str, value: u8 },

    #[error("MIDI channel must be within 0-15, got {0}")]
    Channel(u8),

    #[error("cutoff must be positive and below Nyquist ({nyquist} Hz), got {cutoff} Hz")]
    Cutoff { cutoff: f64, nyquist: f64 },

    #[error("sample rate must be positive, got {0}")]
    SampleRate(f64),

    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} of {value}s is too long")]
    DurationTooLong { field: &'static str, value: f64 },

    #[error("no input file configured for a prerecorded source")]
    MissingInput,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("flat signal: observed range {width:.6} is below the minimum {min_range}")]
    FlatSignal { width: f64, min_range: f64 },

    #[error("no respiration data for {0:?} while calibrating (sensor disconnected?)")]
    Timeout(Duration),

    #[error("no samples observed during calibration")]
    Empty,

    #[error("source ended after {observed:?}, calibration needs {required:?}")]
    Incomplete { observed: Duration, required: Duration },
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("signal source disconnected")]
    Disconnected,

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("recording contains no samples")]
    Empty,
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("MIDI port '{name}' not found (available: {available:?})")]
    PortNotFound { name: String, available: Vec<String> },

    #[error("no MIDI output ports available")]
    NoPorts,

    #[error("MIDI init error: {0}")]
    Init(String),

    #[error("MIDI connect error: {0}")]
    Connect(String),

    #[error("MIDI output closed")]
    Closed,
}

impl From<midir::InitError> for TransportError {
    fn from(e: midir::InitError) -> Self {
        TransportError::Init(e.to_string())
    }
}

impl From<midir::ConnectError<midir::MidiOutput>> for TransportError {
    fn from(e: midir::ConnectError<midir::MidiOutput>) -> Self {
        TransportError::Connect(e.to_string())
    }
}

impl From<midir::PortInfoError> for TransportError {
    fn from(e: midir::PortInfoError) -> Self {
        TransportError::Init(e.to_string())
    }
}

/// Fatal error surfaced by the engine after cleanup.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("calibration failed: {0}")]
    Calibration(#[from] CalibrationError),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

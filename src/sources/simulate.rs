//! Synthetic respiration recordings
//!
//! Generates a sinusoidal breathing trace and writes it in the same CSV
//! layout `RecordedSource` reads, for rehearsing without a sensor.

use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::SourceError;

/// Column header of generated recordings
pub const SIMULATED_HEADER: &str = "RSP_Simple";

/// Sinusoidal respiration trace.
pub fn sinusoidal(duration_secs: f64, breaths_per_minute: f64, sample_rate: f64) -> Vec<f64> {
    let count = (duration_secs * sample_rate).round().max(0.0) as usize;
    let freq = breaths_per_minute / 60.0;
    (0..count)
        .map(|i| {
            let t = i as f64 / sample_rate;
            (2.0 * PI * freq * t).sin()
        })
        .collect()
}

/// Write amplitudes as a single-column CSV with a header row.
pub fn write_csv(path: &Path, amplitudes: &[f64]) -> Result<(), SourceError> {
    let io_error = |source| SourceError::Io {
        path: PathBuf::from(path),
        source,
    };
    let mut out = BufWriter::new(File::create(path).map_err(io_error)?);
    writeln!(out, "{}", SIMULATED_HEADER).map_err(io_error)?;
    for value in amplitudes {
        writeln!(out, "{}", value).map_err(io_error)?;
    }
    out.flush().map_err(io_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::RecordedSource;
    use crate::sources::SignalSource;

    #[test]
    fn test_sample_count() {
        let trace = sinusoidal(10.0, 15.0, 100.0);
        assert_eq!(trace.len(), 1000);
    }

    #[test]
    fn test_breathing_period() {
        // 15 breaths/min = one cycle every 4s
        let trace = sinusoidal(8.0, 15.0, 100.0);
        assert!(trace[0].abs() < 1e-12);
        assert!((trace[100] - 1.0).abs() < 1e-9); // peak at 1s
        assert!((trace[300] + 1.0).abs() < 1e-9); // trough at 3s
        assert!((trace[400] - trace[0]).abs() < 1e-9);
    }

    #[test]
    fn test_round_trip_through_recorded_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.csv");
        let trace = sinusoidal(2.0, 15.0, 50.0);

        write_csv(&path, &trace).unwrap();
        let source = RecordedSource::from_csv(&path, 0, 50.0).unwrap();
        assert_eq!(source.dataset(), Some(&trace[..]));
    }
}

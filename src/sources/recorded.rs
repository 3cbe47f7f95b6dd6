//! Prerecorded respiration source
//!
//! Replays a CSV recording at its declared sample rate, so the rest of
//! the pipeline sees the same timing it would from a live sensor.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tracing::info;

use super::row::{parse_row, Row};
use super::{Sample, SignalSource, SourceEvent};
use crate::error::SourceError;

pub struct RecordedSource {
    name: String,
    amplitudes: Vec<f64>,
    sample_rate: f64,
    cursor: usize,
    paced: bool,
    started: Option<Instant>,
}

impl RecordedSource {
    /// Wrap amplitudes already in memory.
    pub fn new(
        name: impl Into<String>,
        amplitudes: Vec<f64>,
        sample_rate: f64,
    ) -> Result<Self, SourceError> {
        if amplitudes.is_empty() {
            return Err(SourceError::Empty);
        }
        Ok(Self {
            name: name.into(),
            amplitudes,
            sample_rate,
            cursor: 0,
            paced: true,
            started: None,
        })
    }

    /// Load `column` of a CSV file. A leading header row is skipped.
    pub fn from_csv(path: &Path, column: usize, sample_rate: f64) -> Result<Self, SourceError> {
        let io_error = |source| SourceError::Io {
            path: PathBuf::from(path),
            source,
        };
        let file = File::open(path).map_err(io_error)?;
        let amplitudes = read_column(BufReader::new(file), column).map_err(|e| match e {
            ReadError::Io(source) => io_error(source),
            ReadError::Parse { line, message } => SourceError::Parse { line, message },
        })?;

        info!(
            "loaded {} samples ({:.1}s at {} Hz) from {}",
            amplitudes.len(),
            amplitudes.len() as f64 / sample_rate,
            sample_rate,
            path.display()
        );

        Self::new(path.display().to_string(), amplitudes, sample_rate)
    }

    /// Deliver samples as fast as they are pulled.
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    pub fn len(&self) -> usize {
        self.amplitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amplitudes.is_empty()
    }

    /// Length of the recording at its declared rate
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.amplitudes.len() as f64 / self.sample_rate)
    }

    fn timestamp(&self, index: usize) -> Duration {
        Duration::from_secs_f64(index as f64 / self.sample_rate)
    }
}

impl SignalSource for RecordedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn next_sample(&mut self) -> Result<SourceEvent, SourceError> {
        let Some(&amplitude) = self.amplitudes.get(self.cursor) else {
            return Ok(SourceEvent::End);
        };
        let timestamp = self.timestamp(self.cursor);
        self.cursor += 1;

        if self.paced {
            let started = *self.started.get_or_insert_with(Instant::now);
            let due = started + timestamp;
            let now = Instant::now();
            if due > now {
                thread::sleep(due - now);
            }
        }

        Ok(SourceEvent::Sample(Sample::new(timestamp, amplitude)))
    }

    fn dataset(&self) -> Option<&[f64]> {
        Some(&self.amplitudes)
    }
}

enum ReadError {
    Io(std::io::Error),
    Parse { line: usize, message: String },
}

fn read_column<R: BufRead>(reader: R, column: usize) -> Result<Vec<f64>, ReadError> {
    let mut amplitudes = Vec::new();
    let mut seen_row = false;

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(ReadError::Io)?;
        match parse_row(&line, column) {
            Row::Value(value) => amplitudes.push(value),
            Row::Blank => continue,
            // Only the first non-blank row may be a header
            Row::Invalid(_) if !seen_row => {}
            Row::Invalid(message) => {
                return Err(ReadError::Parse {
                    line: index + 1,
                    message,
                })
            }
        }
        seen_row = true;
    }

    Ok(amplitudes)
}

//! Respiration-to-MIDI engine
//!
//! Drives one run through `Init -> Calibrating -> Running -> Stopped`,
//! falling to `Failed` on any fatal error. Every exit path releases held
//! notes and closes the transport.

mod midi;
mod stop;

pub use midi::{list_midi_ports, LogTransport, MidiEvent, MidiOut, MidiTransport, RecordingTransport};
pub use stop::StopSignal;

use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::{OutputMode, RespConfig};
use crate::error::{CalibrationError, EngineError, SourceError};
use crate::mapping::{ControllerMapper, NoteMapper, OutputDomain, OutputMapper, ScalingModel};
use crate::signal::{CalibrationRange, CalibrationWindow, Filter};
use crate::sources::{SignalSource, SourceEvent};

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Init,
    Calibrating,
    Running,
    Stopped,
    Failed,
}

/// Summary of a finished run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Range derived during calibration (None if stopped before it finished)
    pub calibration: Option<CalibrationRange>,
    /// Samples processed while running
    pub samples: u64,
    /// MIDI events accepted by the transport
    pub events_sent: u64,
    /// MIDI events the transport rejected or failed to deliver
    pub send_failures: u64,
    /// Non-finite amplitudes replaced by the filter
    pub nan_clamped: u64,
}

/// The main respiration-to-MIDI engine
pub struct Engine {
    config: RespConfig,
    mode: OutputMode,
    state: EngineState,
    failure: Option<String>,
    report: RunReport,
}

impl Engine {
    /// Create a new engine with the given configuration
    pub fn new(config: RespConfig, mode: OutputMode) -> Self {
        Self {
            config,
            mode,
            state: EngineState::Init,
            failure: None,
            report: RunReport::default(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Cause of the last failed run
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Run until the source ends, `stop` is raised, or a fatal error.
    ///
    /// The transport is closed on return, whatever the outcome.
    pub fn run(
        &mut self,
        source: &mut dyn SignalSource,
        transport: &mut dyn MidiTransport,
        stop: &StopSignal,
    ) -> Result<RunReport, EngineError> {
        self.state = EngineState::Init;
        self.failure = None;
        self.report = RunReport::default();

        let mut filter = None;
        let mut mapper = None;
        let result = self.drive(source, transport, stop, &mut filter, &mut mapper);

        if let Err(e) = &result {
            error!("run failed: {}", e);
            self.failure = Some(e.to_string());
            self.transition(EngineState::Failed);
        }

        // Cleanup shared by Stopped and Failed
        if let Some(mapper) = mapper.as_mut() {
            for event in mapper.finish() {
                self.emit(transport, &event);
            }
        }
        transport.close();
        self.report.send_failures += transport.delivery_failures();
        if let Some(filter) = &filter {
            self.report.nan_clamped += filter.clamped();
        }
        if self.report.nan_clamped > 0 {
            warn!(count = self.report.nan_clamped, "non-finite amplitudes were clamped");
        }

        match result {
            Ok(()) => {
                self.transition(EngineState::Stopped);
                Ok(self.report.clone())
            }
            Err(e) => Err(e),
        }
    }

    fn drive(
        &mut self,
        source: &mut dyn SignalSource,
        transport: &mut dyn MidiTransport,
        stop: &StopSignal,
        filter_slot: &mut Option<Filter>,
        mapper_slot: &mut Option<Box<dyn OutputMapper>>,
    ) -> Result<(), EngineError> {
        // Init
        self.config.validate()?;
        let sample_rate = source.sample_rate();
        self.config.validate_for_rate(sample_rate)?;
        let filter = filter_slot.insert(Filter::new(self.config.filter.cutoff_hz, sample_rate));

        self.transition(EngineState::Calibrating);
        let Some(range) = self.calibrate(source, filter, stop)? else {
            return Ok(());
        };
        self.report.calibration = Some(range);

        let scaling = ScalingModel::new(range, self.domain())?;
        let mapper = mapper_slot.insert(self.build_mapper());
        self.transition(EngineState::Running);
        info!(
            "mapping {} -> {} {:?} {:?}",
            source.name(),
            mapper.name(),
            scaling.domain(),
            scaling.bounds()
        );

        let stall = self.config.calibration.stall_timeout();
        let mut last_data = Instant::now();
        loop {
            if stop.is_raised() {
                info!("stop requested");
                break;
            }
            match source.next_sample()? {
                SourceEvent::Sample(sample) => {
                    last_data = Instant::now();
                    self.report.samples += 1;
                    // Nothing to map until the filter has seen a finite value
                    let Some(filtered) = filter.apply(sample.amplitude) else {
                        continue;
                    };
                    let value = scaling.scale(filtered);
                    for event in mapper.on_value(value, sample.timestamp) {
                        self.emit(transport, &event);
                    }
                }
                SourceEvent::Pending => {
                    if last_data.elapsed() >= stall {
                        warn!("no data for {:?}, treating source as disconnected", stall);
                        return Err(SourceError::Disconnected.into());
                    }
                }
                SourceEvent::End => {
                    info!("{} finished", source.name());
                    break;
                }
            }
        }

        Ok(())
    }

    /// Derive the amplitude range. `None` means a stop arrived first.
    fn calibrate(
        &mut self,
        source: &mut dyn SignalSource,
        filter: &mut Filter,
        stop: &StopSignal,
    ) -> Result<Option<CalibrationRange>, EngineError> {
        let min_range = self.config.calibration.min_range;

        if let Some(data) = source.dataset() {
            info!("PLEASE WAIT: calibrating over {} recorded samples...", data.len());
            let rate = source.sample_rate();
            let mut window = CalibrationWindow::exhaustive(min_range);
            for (i, &amplitude) in data.iter().enumerate() {
                let timestamp = Duration::from_secs_f64(i as f64 / rate);
                if let Some(filtered) = filter.apply(amplitude) {
                    window.observe(timestamp, filtered)?;
                }
            }
            let range = window.finish()?;

            // Replay starts from a clean filter so it reproduces the scan
            self.report.nan_clamped += filter.clamped();
            filter.reset();

            log_range(&range);
            return Ok(Some(range));
        }

        let duration = self.config.calibration.duration();
        let stall = self.config.calibration.stall_timeout();
        info!(
            "PLEASE WAIT: calibrating amplitude range ({:.0}s), breathe fully in and out...",
            duration.as_secs_f64()
        );

        let mut window = CalibrationWindow::timed(duration, min_range);
        let mut last_data = Instant::now();
        loop {
            if stop.is_raised() {
                info!("stopped during calibration");
                return Ok(None);
            }
            match source.next_sample()? {
                SourceEvent::Sample(sample) => {
                    last_data = Instant::now();
                    let Some(filtered) = filter.apply(sample.amplitude) else {
                        continue;
                    };
                    if let Some(range) = window.observe(sample.timestamp, filtered)? {
                        log_range(&range);
                        return Ok(Some(range));
                    }
                }
                SourceEvent::Pending => {
                    if last_data.elapsed() >= stall {
                        return Err(CalibrationError::Timeout(stall).into());
                    }
                }
                SourceEvent::End => {
                    let range = window.finish()?;
                    log_range(&range);
                    return Ok(Some(range));
                }
            }
        }
    }

    fn domain(&self) -> OutputDomain {
        match self.mode {
            OutputMode::Play => OutputDomain::Notes {
                low: self.config.midi.note_low,
                high: self.config.midi.note_high,
            },
            OutputMode::Modulate => OutputDomain::Controller,
        }
    }

    fn build_mapper(&self) -> Box<dyn OutputMapper> {
        match self.mode {
            OutputMode::Play => Box::new(NoteMapper::new(self.config.midi.velocity)),
            OutputMode::Modulate => Box::new(ControllerMapper::new(
                self.config.midi.cc,
                self.config.throttle.interval(),
                self.config.throttle.jump_threshold,
            )),
        }
    }

    /// Send one event; a failure loses only this event.
    fn emit(&mut self, transport: &mut dyn MidiTransport, event: &MidiEvent) {
        match transport.send(event) {
            Ok(()) => self.report.events_sent += 1,
            Err(e) => {
                self.report.send_failures += 1;
                warn!("dropping MIDI event {:?}: {}", event, e);
            }
        }
    }

    fn transition(&mut self, next: EngineState) {
        debug!("engine {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

fn log_range(range: &CalibrationRange) {
    info!(
        "Calibration complete: amp_min={:.3}, amp_max={:.3}",
        range.min(),
        range.max()
    );
}

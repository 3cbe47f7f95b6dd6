//! CLI interface for resp-midi

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use resp_midi::RespConfig;

/// Respiration-controlled MIDI system
#[derive(Parser)]
#[command(name = "resp-midi")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file; command-line flags override its values
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Play MIDI notes from live respiration data
    LivePlay {
        #[command(flatten)]
        midi: MidiArgs,
        #[command(flatten)]
        notes: NoteArgs,
        #[command(flatten)]
        live: LiveArgs,
    },

    /// Modulate a MIDI CC from live respiration data
    LiveMod {
        #[command(flatten)]
        midi: MidiArgs,
        #[command(flatten)]
        cc: CcArgs,
        #[command(flatten)]
        live: LiveArgs,
    },

    /// Play MIDI notes from prerecorded respiration data
    PrerecPlay {
        #[command(flatten)]
        midi: MidiArgs,
        #[command(flatten)]
        notes: NoteArgs,
        #[command(flatten)]
        recorded: RecordedArgs,
    },

    /// Modulate a MIDI CC from prerecorded respiration data
    PrerecMod {
        #[command(flatten)]
        midi: MidiArgs,
        #[command(flatten)]
        cc: CcArgs,
        #[command(flatten)]
        recorded: RecordedArgs,
    },

    /// List available MIDI output ports
    Ports,

    /// Validate a configuration file (default: resp-midi.yaml)
    Check,

    /// Generate an example configuration file
    Init {
        /// Where to write it
        #[arg(default_value = "resp-midi.yaml")]
        path: PathBuf,
    },

    /// Write a simulated respiration recording as CSV
    Simulate {
        /// Output file path
        #[arg(short, long, default_value = "resp_simulate_15.csv")]
        output: PathBuf,

        /// Duration in seconds
        #[arg(short, long, default_value = "600")]
        duration: f64,

        /// Breaths per minute
        #[arg(short, long, default_value = "15")]
        rate: f64,

        /// Samples per second
        #[arg(short, long, default_value = "1000")]
        sampling_rate: f64,
    },
}

/// Options shared by every run mode
#[derive(Args, Debug, Default)]
pub struct MidiArgs {
    /// MIDI output port name (substring match)
    #[arg(long)]
    pub midi_port: Option<String>,

    /// MIDI channel (0-15)
    #[arg(long)]
    pub channel_midi: Option<u8>,

    /// Low-pass filter cutoff in Hz
    #[arg(long)]
    pub cutoff: Option<f64>,

    /// Log MIDI events instead of opening a port
    #[arg(long)]
    pub dry_run: bool,
}

impl MidiArgs {
    pub fn apply(&self, config: &mut RespConfig) {
        if let Some(port) = &self.midi_port {
            config.midi.port = port.clone();
        }
        if let Some(channel) = self.channel_midi {
            config.midi.channel = channel;
        }
        if let Some(cutoff) = self.cutoff {
            config.filter.cutoff_hz = cutoff;
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct NoteArgs {
    /// Lowest MIDI note
    #[arg(long)]
    pub note_low: Option<u8>,

    /// Highest MIDI note
    #[arg(long)]
    pub note_high: Option<u8>,

    /// MIDI note velocity
    #[arg(long)]
    pub velocity: Option<u8>,
}

impl NoteArgs {
    pub fn apply(&self, config: &mut RespConfig) {
        if let Some(low) = self.note_low {
            config.midi.note_low = low;
        }
        if let Some(high) = self.note_high {
            config.midi.note_high = high;
        }
        if let Some(velocity) = self.velocity {
            config.midi.velocity = velocity;
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct CcArgs {
    /// MIDI CC number
    #[arg(long)]
    pub cc: Option<u8>,

    /// Minimum milliseconds between CC messages
    #[arg(long)]
    pub throttle_ms: Option<u64>,

    /// CC jumps at least this large bypass the throttle
    #[arg(long)]
    pub jump: Option<u8>,
}

impl CcArgs {
    pub fn apply(&self, config: &mut RespConfig) {
        if let Some(cc) = self.cc {
            config.midi.cc = cc;
        }
        if let Some(interval) = self.throttle_ms {
            config.throttle.interval_ms = interval;
        }
        if let Some(jump) = self.jump {
            config.throttle.jump_threshold = jump;
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct LiveArgs {
    /// Column of the respiration channel in each input row
    #[arg(long)]
    pub channel: Option<usize>,

    /// Nominal sample rate of the live stream
    #[arg(long)]
    pub sampling_rate: Option<f64>,

    /// Listen for rows on this UDP address instead of stdin
    #[arg(long)]
    pub udp: Option<String>,

    /// Calibration window in seconds
    #[arg(long)]
    pub calibration_secs: Option<f64>,

    /// Seconds without data before the sensor counts as disconnected
    #[arg(long)]
    pub stall_timeout: Option<f64>,
}

impl LiveArgs {
    pub fn apply(&self, config: &mut RespConfig) {
        if let Some(column) = self.channel {
            config.source.column = column;
        }
        if let Some(rate) = self.sampling_rate {
            config.source.sample_rate = Some(rate);
        }
        if let Some(addr) = &self.udp {
            config.source.udp = Some(addr.clone());
        }
        if let Some(secs) = self.calibration_secs {
            config.calibration.duration_secs = secs;
        }
        if let Some(secs) = self.stall_timeout {
            config.calibration.stall_timeout_secs = secs;
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct RecordedArgs {
    /// Prerecorded CSV respiration data
    #[arg(long)]
    pub input_file: Option<PathBuf>,

    /// Sampling rate of the recording
    #[arg(long)]
    pub sampling_rate: Option<f64>,

    /// Column of the respiration channel
    #[arg(long)]
    pub column: Option<usize>,
}

impl RecordedArgs {
    pub fn apply(&self, config: &mut RespConfig) {
        if let Some(path) = &self.input_file {
            config.source.input_file = Some(path.clone());
        }
        if let Some(rate) = self.sampling_rate {
            config.source.sample_rate = Some(rate);
        }
        if let Some(column) = self.column {
            config.source.column = column;
        }
    }
}

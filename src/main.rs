//! resp-midi - Respiration-controlled MIDI

use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use resp_midi::config::{self, OutputMode, RespConfig};
use resp_midi::engine::{list_midi_ports, Engine, LogTransport, MidiOut, MidiTransport, StopSignal};
use resp_midi::error::ConfigError;
use resp_midi::sources::{self, simulate, RecordedSource, SignalSource};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::LivePlay { midi, notes, live } => {
            let mut cfg = config::load_or_default(config_path)?;
            midi.apply(&mut cfg);
            notes.apply(&mut cfg);
            live.apply(&mut cfg);
            run_live(cfg, OutputMode::Play, midi.dry_run)
        }

        Commands::LiveMod { midi, cc, live } => {
            let mut cfg = config::load_or_default(config_path)?;
            midi.apply(&mut cfg);
            cc.apply(&mut cfg);
            live.apply(&mut cfg);
            run_live(cfg, OutputMode::Modulate, midi.dry_run)
        }

        Commands::PrerecPlay { midi, notes, recorded } => {
            let mut cfg = config::load_or_default(config_path)?;
            midi.apply(&mut cfg);
            notes.apply(&mut cfg);
            recorded.apply(&mut cfg);
            run_recorded(cfg, OutputMode::Play, midi.dry_run)
        }

        Commands::PrerecMod { midi, cc, recorded } => {
            let mut cfg = config::load_or_default(config_path)?;
            midi.apply(&mut cfg);
            cc.apply(&mut cfg);
            recorded.apply(&mut cfg);
            run_recorded(cfg, OutputMode::Modulate, midi.dry_run)
        }

        Commands::Ports => {
            let ports = list_midi_ports()?;
            if ports.is_empty() {
                println!("No MIDI output ports available.");
            } else {
                println!("MIDI output ports:");
                for name in ports {
                    println!("  - {}", name);
                }
            }
            Ok(())
        }

        Commands::Check => {
            let path = config_path
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("resp-midi.yaml"));
            println!("Checking configuration at {:?}...", path);

            match config::load_config(&path) {
                Ok(cfg) => {
                    println!("Configuration is valid!");
                    println!("  MIDI port: {} (channel {})", cfg.midi.port, cfg.midi.channel);
                    println!(
                        "  Notes: {}-{} at velocity {}",
                        cfg.midi.note_low, cfg.midi.note_high, cfg.midi.velocity
                    );
                    println!("  CC: {}", cfg.midi.cc);
                    println!("  Cutoff: {} Hz", cfg.filter.cutoff_hz);
                    println!("  Calibration: {}s", cfg.calibration.duration_secs);
                    println!(
                        "  Throttle: {}ms (jump {})",
                        cfg.throttle.interval_ms, cfg.throttle.jump_threshold
                    );
                    if let Some(input) = &cfg.source.input_file {
                        println!("  Input file: {}", input.display());
                    }
                    Ok(())
                }
                Err(e) => {
                    println!("Configuration is invalid: {:#}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Init { path } => {
            if path.exists() {
                println!("{} already exists. Not overwriting.", path.display());
            } else {
                std::fs::write(&path, config::EXAMPLE_CONFIG)?;
                println!("Created {} with example configuration.", path.display());
            }
            Ok(())
        }

        Commands::Simulate {
            output,
            duration,
            rate,
            sampling_rate,
        } => {
            let trace = simulate::sinusoidal(duration, rate, sampling_rate);
            simulate::write_csv(&output, &trace)?;
            println!(
                "Saved {} samples ({}s, {} breaths/min, {} Hz) to {}",
                trace.len(),
                duration,
                rate,
                sampling_rate,
                output.display()
            );
            Ok(())
        }
    }
}

fn run_live(cfg: RespConfig, mode: OutputMode, dry_run: bool) -> Result<()> {
    let rate = cfg.live_sample_rate();
    validate(&cfg, rate)?;
    let mut transport = open_transport(&cfg, dry_run)?;

    let (feed, mut source) = sources::live_channel("live", rate);
    let column = cfg.source.column;

    // Keeps the UDP listener alive for the whole run
    let _runtime = match &cfg.source.udp {
        Some(addr) => {
            let runtime = tokio::runtime::Runtime::new()?;
            sources::spawn_udp_listener(runtime.handle(), addr, column, feed)?;
            Some(runtime)
        }
        None => {
            info!("reading respiration rows from stdin (column {})", column);
            sources::spawn_line_reader(BufReader::new(std::io::stdin()), column, feed)?;
            None
        }
    };

    run_engine(cfg, mode, &mut source, transport.as_mut())
}

fn run_recorded(cfg: RespConfig, mode: OutputMode, dry_run: bool) -> Result<()> {
    let rate = cfg.recorded_sample_rate();
    validate(&cfg, rate)?;
    let path = cfg.source.input_file.clone().ok_or(ConfigError::MissingInput)?;

    info!("Loading prerecorded respiration from '{}'...", path.display());
    let mut source = RecordedSource::from_csv(&path, cfg.source.column, rate)?;
    let mut transport = open_transport(&cfg, dry_run)?;

    run_engine(cfg, mode, &mut source, transport.as_mut())
}

/// Reject bad settings before any port or stream is touched.
fn validate(cfg: &RespConfig, sample_rate: f64) -> Result<()> {
    cfg.validate().context("invalid configuration")?;
    cfg.validate_for_rate(sample_rate)
        .context("invalid configuration")?;
    Ok(())
}

fn open_transport(cfg: &RespConfig, dry_run: bool) -> Result<Box<dyn MidiTransport>> {
    if dry_run {
        info!("dry run: MIDI events are logged, not sent");
        return Ok(Box::new(LogTransport::new(cfg.midi.channel)));
    }
    let out = MidiOut::open(&cfg.midi.port, cfg.midi.channel)
        .with_context(|| format!("opening MIDI port '{}'", cfg.midi.port))?;
    Ok(Box::new(out))
}

fn run_engine(
    cfg: RespConfig,
    mode: OutputMode,
    source: &mut dyn SignalSource,
    transport: &mut dyn MidiTransport,
) -> Result<()> {
    let stop = StopSignal::new();
    stop.install_ctrlc()?;

    let mut engine = Engine::new(cfg, mode);
    let report = engine.run(source, transport, &stop)?;

    info!(
        samples = report.samples,
        events = report.events_sent,
        failed_sends = report.send_failures,
        "run finished"
    );
    Ok(())
}

//! MIDI output for resp-midi.
//!
//! The engine hands `MidiEvent`s to a `MidiTransport`. `MidiOut` writes
//! them to a hardware or virtual port through a worker thread so that
//! sending never blocks the sample loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use midir::MidiOutput;
use tracing::{debug, info, warn};

use crate::error::TransportError;

/// Events produced by the output mappers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    ControlChange { controller: u8, value: u8 },
}

impl MidiEvent {
    /// Encode as a channel voice message on `channel` (0-15).
    pub fn to_bytes(&self, channel: u8) -> [u8; 3] {
        let ch = channel & 0x0F;
        match *self {
            MidiEvent::NoteOn { note, velocity } => [0x90 | ch, note & 0x7F, velocity & 0x7F],
            MidiEvent::NoteOff { note } => [0x80 | ch, note & 0x7F, 0],
            MidiEvent::ControlChange { controller, value } => {
                [0xB0 | ch, controller & 0x7F, value & 0x7F]
            }
        }
    }
}

/// Sink for MIDI events
pub trait MidiTransport {
    /// Send one event. A failed send loses only that event.
    fn send(&mut self, event: &MidiEvent) -> Result<(), TransportError>;

    /// Flush and release the port. Safe to call more than once.
    fn close(&mut self);

    /// Events accepted by `send` that later failed to reach the port
    fn delivery_failures(&self) -> u64 {
        0
    }
}

enum MidiOutCommand {
    Send([u8; 3]),
    Stop,
}

/// Connection to a MIDI output port
pub struct MidiOut {
    sender: Sender<MidiOutCommand>,
    worker: Option<JoinHandle<()>>,
    failures: Arc<AtomicU64>,
    channel: u8,
    port_name: String,
}

impl MidiOut {
    /// Connect to the first output port whose name contains `port_name`.
    pub fn open(port_name: &str, channel: u8) -> Result<Self, TransportError> {
        let midi_out = MidiOutput::new("resp-midi output")?;
        let ports = midi_out.ports();

        if ports.is_empty() {
            return Err(TransportError::NoPorts);
        }

        let port = ports
            .iter()
            .find(|p| {
                midi_out
                    .port_name(p)
                    .map(|n| n.contains(port_name))
                    .unwrap_or(false)
            })
            .cloned()
            .ok_or_else(|| TransportError::PortNotFound {
                name: port_name.to_string(),
                available: ports
                    .iter()
                    .filter_map(|p| midi_out.port_name(p).ok())
                    .collect(),
            })?;

        let port_name_actual = midi_out.port_name(&port)?;
        let mut conn = midi_out.connect(&port, "resp-midi")?;

        let (sender, receiver) = mpsc::channel::<MidiOutCommand>();
        let failures = Arc::new(AtomicU64::new(0));
        let worker_failures = Arc::clone(&failures);

        let worker = thread::Builder::new()
            .name("midi-out".to_string())
            .spawn(move || {
                while let Ok(cmd) = receiver.recv() {
                    match cmd {
                        MidiOutCommand::Send(bytes) => {
                            if let Err(e) = conn.send(&bytes) {
                                worker_failures.fetch_add(1, Ordering::Relaxed);
                                warn!("MIDI send failed, event dropped: {}", e);
                            }
                        }
                        MidiOutCommand::Stop => break,
                    }
                }
                let _ = conn.close();
            })
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        info!("MIDI output connected to: {}", port_name_actual);

        Ok(Self {
            sender,
            worker: Some(worker),
            failures,
            channel,
            port_name: port_name_actual,
        })
    }

    /// Name of the connected port
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl MidiTransport for MidiOut {
    fn send(&mut self, event: &MidiEvent) -> Result<(), TransportError> {
        self.sender
            .send(MidiOutCommand::Send(event.to_bytes(self.channel)))
            .map_err(|_| TransportError::Closed)
    }

    fn close(&mut self) {
        if let Some(worker) = self.worker.take() {
            // Queued events, including the final note-off, are written
            // before the worker sees Stop.
            let _ = self.sender.send(MidiOutCommand::Stop);
            if worker.join().is_err() {
                warn!("MIDI output worker panicked");
            }
            info!("MIDI output released: {}", self.port_name);
        }
    }

    fn delivery_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl Drop for MidiOut {
    fn drop(&mut self) {
        self.close();
    }
}

/// Transport that only logs events (dry runs)
#[derive(Debug, Default)]
pub struct LogTransport {
    channel: u8,
    sent: u64,
}

impl LogTransport {
    pub fn new(channel: u8) -> Self {
        Self { channel, sent: 0 }
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl MidiTransport for LogTransport {
    fn send(&mut self, event: &MidiEvent) -> Result<(), TransportError> {
        self.sent += 1;
        debug!(channel = self.channel, ?event, bytes = ?event.to_bytes(self.channel), "midi");
        Ok(())
    }

    fn close(&mut self) {
        info!("dry run: {} MIDI events", self.sent);
    }
}

/// Transport that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingTransport {
    events: Vec<MidiEvent>,
    closed: bool,
    fail_every: Option<usize>,
    attempts: usize,
    lost_on_close: u64,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every `n`th send (1-based), to exercise error paths.
    pub fn failing_every(n: usize) -> Self {
        Self {
            fail_every: Some(n.max(1)),
            ..Self::default()
        }
    }

    /// Report `n` events as lost after being accepted.
    pub fn losing_on_close(mut self, n: u64) -> Self {
        self.lost_on_close = n;
        self
    }

    pub fn events(&self) -> &[MidiEvent] {
        &self.events
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl MidiTransport for RecordingTransport {
    fn send(&mut self, event: &MidiEvent) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.attempts += 1;
        if let Some(n) = self.fail_every {
            if self.attempts % n == 0 {
                return Err(TransportError::Closed);
            }
        }
        self.events.push(*event);
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn delivery_failures(&self) -> u64 {
        if self.closed {
            self.lost_on_close
        } else {
            0
        }
    }
}

/// List available MIDI output ports.
pub fn list_midi_ports() -> Result<Vec<String>, TransportError> {
    let midi_out = MidiOutput::new("resp-midi list")?;
    let ports = midi_out.ports();

    let names: Vec<String> = ports
        .iter()
        .filter_map(|p| midi_out.port_name(p).ok())
        .collect();

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on_bytes() {
        let msg = MidiEvent::NoteOn { note: 60, velocity: 100 };
        assert_eq!(msg.to_bytes(0), [0x90, 60, 100]);
    }

    #[test]
    fn test_note_on_channel() {
        let msg = MidiEvent::NoteOn { note: 72, velocity: 80 };
        assert_eq!(msg.to_bytes(5), [0x95, 72, 80]);
    }

    #[test]
    fn test_note_off_bytes() {
        let msg = MidiEvent::NoteOff { note: 60 };
        assert_eq!(msg.to_bytes(0), [0x80, 60, 0]);
    }

    #[test]
    fn test_cc_bytes() {
        let msg = MidiEvent::ControlChange { controller: 115, value: 64 };
        assert_eq!(msg.to_bytes(0), [0xB0, 115, 64]);
    }

    #[test]
    fn test_channel_masked() {
        let msg = MidiEvent::ControlChange { controller: 1, value: 2 };
        assert_eq!(msg.to_bytes(0x1F)[0], 0xBF);
    }

    #[test]
    fn test_recording_transport_fails_on_schedule() {
        let mut transport = RecordingTransport::failing_every(2);
        let ev = MidiEvent::NoteOff { note: 1 };

        assert!(transport.send(&ev).is_ok());
        assert!(transport.send(&ev).is_err());
        assert!(transport.send(&ev).is_ok());
        assert_eq!(transport.events().len(), 2);
    }

    #[test]
    fn test_recording_transport_closed() {
        let mut transport = RecordingTransport::new();
        transport.close();
        assert!(transport.is_closed());
        assert!(transport.send(&MidiEvent::NoteOff { note: 1 }).is_err());
    }

    #[test]
    fn test_log_transport_counts() {
        let mut transport = LogTransport::new(3);
        transport.send(&MidiEvent::NoteOn { note: 1, velocity: 1 }).unwrap();
        assert_eq!(transport.sent(), 1);
    }
}

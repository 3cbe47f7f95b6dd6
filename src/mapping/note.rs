//! Note mapper
//!
//! Holds at most one note. A new value releases the held note and
//! strikes the new one; a repeated value emits nothing.

use std::time::Duration;

use super::OutputMapper;
use crate::engine::MidiEvent;

pub struct NoteMapper {
    velocity: u8,
    held: Option<u8>,
}

impl NoteMapper {
    pub fn new(velocity: u8) -> Self {
        Self {
            velocity: velocity.min(127),
            held: None,
        }
    }

    /// Currently sounding note
    pub fn held(&self) -> Option<u8> {
        self.held
    }
}

impl OutputMapper for NoteMapper {
    fn name(&self) -> &str {
        "note"
    }

    fn on_value(&mut self, value: u8, _timestamp: Duration) -> Vec<MidiEvent> {
        match self.held {
            Some(note) if note == value => Vec::new(),
            Some(note) => {
                self.held = Some(value);
                vec![
                    MidiEvent::NoteOff { note },
                    MidiEvent::NoteOn {
                        note: value,
                        velocity: self.velocity,
                    },
                ]
            }
            None => {
                self.held = Some(value);
                vec![MidiEvent::NoteOn {
                    note: value,
                    velocity: self.velocity,
                }]
            }
        }
    }

    fn finish(&mut self) -> Vec<MidiEvent> {
        self.held
            .take()
            .map(|note| vec![MidiEvent::NoteOff { note }])
            .unwrap_or_default()
    }
}

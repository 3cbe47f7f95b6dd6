//! OutputMapper trait

use std::time::Duration;

use crate::engine::MidiEvent;

/// Turns a stream of scaled values into MIDI events
pub trait OutputMapper: Send {
    /// Get the name of this mapper
    fn name(&self) -> &str;

    /// Consume one scaled value stamped with the sample time
    fn on_value(&mut self, value: u8, timestamp: Duration) -> Vec<MidiEvent>;

    /// Events needed to leave the receiver silent (held notes released)
    fn finish(&mut self) -> Vec<MidiEvent>;
}

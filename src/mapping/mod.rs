//! Mapping from filtered amplitude to MIDI
//!
//! `ScalingModel` turns an amplitude into a note or controller value;
//! an `OutputMapper` turns the value stream into MIDI events.

mod controller;
mod mapper;
mod note;
mod scaling;

pub use controller::ControllerMapper;
pub use mapper::OutputMapper;
pub use note::NoteMapper;
pub use scaling::{OutputDomain, ScalingModel};

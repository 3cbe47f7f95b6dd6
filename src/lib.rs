//! resp-midi - Respiration-controlled MIDI
//!
//! Turns a breathing signal, live or prerecorded, into MIDI notes or
//! controller changes. The signal is smoothed, calibrated to the
//! subject's range, scaled, and mapped to events without retriggers or
//! flooding.

pub mod config;
pub mod engine;
pub mod error;
pub mod mapping;
pub mod signal;
pub mod sources;

pub use config::RespConfig;
pub use engine::Engine;

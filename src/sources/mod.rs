//! Respiration signal sources
//!
//! A live stream (stdin or UDP) and a paced prerecorded CSV both present
//! the same `SignalSource` interface to the engine.

mod live;
mod recorded;
mod row;
pub mod simulate;
mod source;

pub use live::{live_channel, spawn_line_reader, spawn_udp_listener, LiveFeed, LiveSource, DEFAULT_POLL};
pub use recorded::RecordedSource;
pub use source::{Sample, SignalSource, SourceEvent};

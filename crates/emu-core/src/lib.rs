//! Core types shared by every simulator crate.
//!
//! One simulated machine instance is a *context*. Contexts are isolated:
//! each owns its memory, registers and output streams, and everything a
//! context prints is tagged with its id.

mod config;
mod observable;
mod sink;

pub use config::SimConfig;
pub use observable::{Observable, Value};
pub use sink::{BufferSink, HostSink, OutputSink};

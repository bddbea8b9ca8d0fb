//! Session implementations shipped with the binary.
//!
//! Real exchange connectivity lives outside this workspace and plugs in
//! through `latency_core::Session`.

pub mod simulated;

pub use simulated::{SessionStats, SimulatedSession, SimulatedVenue, SimulationConfig};

//! # Latency Core
//!
//! Turns an asynchronous, callback-driven trading session into blocking
//! request/response calls and measures create/cancel order latency on top.
//!
//! ## Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | A waiter only returns the event published under its own id | `store.rs` - keyed lookup under the map lock |
//! | A publish before the wait starts is still observed | `store.rs` - check-then-wait under one mutex |
//! | Failed sends never start a wait | `correlator.rs` - `send_and_await()` |
//! | Entries are released after each phase, failures included | `sampler.rs` - `run_iteration()` |
//! | No cancel is sent without an `ORDER_ID` | `sampler.rs` - `extract_order_id()` |
//!
//! ## Data Flow
//!
//! ```text
//! LatencySampler ──send_and_await──→ RequestCorrelator ──send──→ Session
//!        ↑                                   │                      │
//!        │                                 wait                 on_event
//!        │                                   ↓                      ↓
//!        └────────── Event ─────────── EventStore ←──publish── CorrelatingEventHandler
//! ```
//!
//! ## Module Structure
//!
//! - `ports` - `Session` and `EventHandler` traits
//! - `store` - `EventStore`, the correlation map with blocking lookup
//! - `handler` - `CorrelatingEventHandler`, routes RESPONSE events into the store
//! - `correlator` - `RequestCorrelator`, send then wait
//! - `sampler` - `LatencySampler`, the create/cancel loop
//! - `stats` - samples and summary statistics
//! - `loopback` - in-memory `Session` for tests and dry runs

pub mod correlator;
pub mod error;
pub mod handler;
pub mod loopback;
pub mod ports;
pub mod sampler;
pub mod stats;
pub mod store;

pub use correlator::RequestCorrelator;
pub use error::{LatencyError, LatencyResult, TransportError};
pub use handler::{CorrelatingEventHandler, HandlerStats};
pub use loopback::LoopbackSession;
pub use ports::{EventHandler, Session};
pub use sampler::{
    extract_order_id, ClientOrderId, IterationPhase, LatencySampler, OrderTemplate,
    SamplerConfig,
};
pub use stats::{LatencyReport, LatencySample, LatencyStats};
pub use store::{EventStore, StoreStats};

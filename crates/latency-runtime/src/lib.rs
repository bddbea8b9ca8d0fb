//! # Order Latency Runtime
//!
//! Wires the harness together and runs it.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (env file + environment, CLI overrides)
//! 2. Create the `EventStore` and the correlating handler
//! 3. Start the session with that handler
//! 4. Run the sampler
//! 5. Stop the session, whether or not the run succeeded
//!
//! ## Module Structure
//!
//! - `config` - `HarnessConfig` and env file parsing
//! - `session` - `SimulatedSession`, the in-process venue
//! - `report` - text and JSON rendering

pub mod config;
pub mod report;
pub mod session;

pub use config::{ConfigError, HarnessConfig};

use latency_core::{
    CorrelatingEventHandler, EventStore, LatencyError, LatencyReport, LatencyResult,
    LatencySample, LatencySampler, RequestCorrelator, Session,
};
use std::sync::Arc;
use tracing::info;

use crate::session::SimulatedSession;

/// Run every configured iteration against a simulated venue.
///
/// `on_sample` is called as each iteration completes. The session is stopped
/// before returning on both the success and the error path.
pub fn run_harness<F>(config: &HarnessConfig, on_sample: F) -> LatencyResult<LatencyReport>
where
    F: FnMut(&LatencySample),
{
    info!(
        venue = %config.venue,
        instrument = %config.instrument,
        credentials = ?config.credentials.masked(),
        iterations = config.iterations,
        timeout_ms = config.response_timeout.map(|t| t.as_millis() as u64),
        "Starting order latency harness"
    );

    let store = Arc::new(EventStore::new());
    let handler = Arc::new(CorrelatingEventHandler::new(Arc::clone(&store)));

    let session = SimulatedSession::start(config.simulation.clone(), &config.instrument, handler)
        .map_err(LatencyError::SessionStart)?;
    let session: Arc<dyn Session> = Arc::new(session);

    let correlator = RequestCorrelator::new(session, store, config.response_timeout);
    let sampler = LatencySampler::new(correlator, config.order_template(), config.sampler_config());

    let result = sampler.run_with(on_sample);
    sampler.correlator().shutdown();
    result
}

//! # Latency Telemetry
//!
//! Logging setup for the order latency harness.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use latency_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(config).expect("Failed to init telemetry");
//!
//!     // Logs from every workspace crate are now written to stderr
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OL_SERVICE_NAME` | `order-latency` | Service name in log output |
//! | `OL_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter directive |
//! | `OL_CONSOLE_OUTPUT` | `true` | Write logs at all |
//! | `OL_JSON_LOGS` | `false` | One JSON object per line |

mod config;
mod logging;
mod subscriber;

pub use config::TelemetryConfig;
pub use subscriber::build_filter;

use std::time::Instant;
use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("invalid log filter {0}")]
    Filter(String),

    #[error("failed to install subscriber: {0}")]
    Init(String),
}

/// Install the global subscriber described by `config`.
///
/// Returns a guard to hold for the lifetime of the process.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    subscriber::init_subscriber(&config)?;

    Ok(TelemetryGuard {
        service_name: config.service_name,
        started: Instant::now(),
    })
}

/// Guard that keeps telemetry active. Logs shutdown on drop.
pub struct TelemetryGuard {
    service_name: String,
    started: Instant,
}

impl TelemetryGuard {
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(
            service = %self.service_name,
            uptime_ms = self.started.elapsed().as_millis() as u64,
            "Shutting down telemetry"
        );
    }
}

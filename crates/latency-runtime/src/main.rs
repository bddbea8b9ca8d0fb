//! # order-latency
//!
//! Measures create/cancel order round trips against a venue session and
//! prints per-iteration and average latencies.
//!
//! Exit status is 0 on success and non-zero on any fatal error
//! (configuration, transport, timeout, missing order id).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use latency_runtime::config::timeout_from_millis;
use latency_runtime::{report, run_harness, HarnessConfig};
use latency_telemetry::{harness_event, init_telemetry, TelemetryConfig};
use venue_types::Side;

/// Order latency harness
#[derive(Parser, Debug)]
#[command(name = "order-latency")]
#[command(about = "Measure create/cancel order round-trip latency")]
struct Args {
    /// Env file with EXCHANGE, INSTRUMENT and credentials
    #[arg(short, long, env = "OL_ENV_FILE", default_value = "config.env")]
    env_file: PathBuf,

    /// Number of create/cancel cycles
    #[arg(short = 'n', long)]
    iterations: Option<usize>,

    /// Pause between iterations in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Per-response deadline in milliseconds (0 waits indefinitely)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Order side (BUY or SELL)
    #[arg(long)]
    side: Option<Side>,

    /// Order quantity
    #[arg(long)]
    quantity: Option<String>,

    /// Order limit price
    #[arg(long)]
    price: Option<String>,

    /// Simulated one-way latency in milliseconds
    #[arg(long)]
    sim_latency_ms: Option<u64>,

    /// Simulated latency jitter in milliseconds
    #[arg(long)]
    sim_jitter_ms: Option<u64>,

    /// Stream simulated best bid/ask while sampling
    #[arg(long)]
    market_data: bool,

    /// Print the report as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Log filter, e.g. `debug` or `latency_core=trace`
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn apply(&self, config: &mut HarnessConfig) {
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(delay_ms) = self.delay_ms {
            config.iteration_delay = Duration::from_millis(delay_ms);
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.response_timeout = timeout_from_millis(timeout_ms);
        }
        if let Some(side) = self.side {
            config.side = side;
        }
        if let Some(quantity) = &self.quantity {
            config.quantity = quantity.clone();
        }
        if let Some(price) = &self.price {
            config.limit_price = price.clone();
        }
        if let Some(latency_ms) = self.sim_latency_ms {
            config.simulation.latency = Duration::from_millis(latency_ms);
        }
        if let Some(jitter_ms) = self.sim_jitter_ms {
            config.simulation.jitter = Duration::from_millis(jitter_ms);
        }
        if self.market_data {
            config.simulation.market_data = true;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut telemetry = TelemetryConfig::from_env();
    if let Some(level) = &args.log_level {
        telemetry = telemetry.with_log_level(level.as_str());
    }
    if args.json_logs {
        telemetry = telemetry.with_json_logs(true);
    }
    let _telemetry = init_telemetry(telemetry).context("Failed to initialize logging")?;

    let mut config = HarnessConfig::load(Some(&args.env_file)).with_context(|| {
        format!("Failed to load configuration (env file {})", args.env_file.display())
    })?;
    args.apply(&mut config);
    config.validate().context("Invalid command line override")?;

    let print_iterations = !args.json;
    let report = run_harness(&config, |sample| {
        harness_event!(
            debug,
            "runtime",
            iteration = sample.iteration,
            "Sample recorded",
            order_id = %sample.order_id
        );
        if print_iterations {
            println!("{}", report::render_iteration(sample));
        }
    })
    .inspect_err(|e| harness_event!(error, "runtime", "Harness failed", error = %e))
    .context("Latency run failed")?;

    if args.json {
        println!("{}", report::render_json(&report).context("Failed to serialize report")?);
    } else {
        print!("{}", report::render_summary(&report));
    }

    harness_event!(info, "runtime", "Harness finished", iterations = report.samples.len());
    Ok(())
}

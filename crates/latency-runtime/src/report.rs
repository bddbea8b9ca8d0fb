//! Report rendering for stdout.

use latency_core::{LatencyReport, LatencySample, LatencyStats};
use std::fmt::Write;
use std::time::Duration;

fn ms(duration: Duration) -> String {
    format!("{:.3}", duration.as_secs_f64() * 1000.0)
}

/// Block printed after each iteration. Iterations are numbered from 1.
pub fn render_iteration(sample: &LatencySample) -> String {
    format!(
        "Iteration {}:\nCreate Order Latency: {} ms\nDelete Order Latency: {} ms\nTotal Roundtrip Latency: {} ms\n",
        sample.iteration + 1,
        ms(sample.create),
        ms(sample.cancel),
        ms(sample.round_trip()),
    )
}

fn render_stats(out: &mut String, label: &str, stats: &LatencyStats) {
    let _ = writeln!(
        out,
        "{:<10} min {} ms  p50 {} ms  p99 {} ms  max {} ms",
        label,
        ms(stats.min),
        ms(stats.p50),
        ms(stats.p99),
        ms(stats.max),
    );
}

/// Averages plus the distribution of each series.
pub fn render_summary(report: &LatencyReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Average Create Order Latency: {} ms", ms(report.mean_create()));
    let _ = writeln!(out, "Average Delete Order Latency: {} ms", ms(report.mean_cancel()));
    let _ = writeln!(out);
    render_stats(&mut out, "create", &report.create);
    render_stats(&mut out, "delete", &report.cancel);
    render_stats(&mut out, "roundtrip", &report.round_trip);
    out
}

pub fn render_json(report: &LatencyReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

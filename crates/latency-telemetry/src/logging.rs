//! Structured log helper.
//!
//! Lines carry a `component` field and, for per-iteration lines, an
//! `iteration` field, so JSON output can be filtered by run phase.

/// Emit a tracing event tagged with the harness component.
///
/// ```rust,ignore
/// harness_event!(info, "runtime", "Harness finished", iterations = 10);
/// harness_event!(debug, "runtime", iteration = 3, "Sample recorded", order_id = %id);
/// ```
#[macro_export]
macro_rules! harness_event {
    ($level:ident, $component:literal, iteration = $iteration:expr, $msg:literal $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            iteration = $iteration,
            $($($field)*,)?
            $msg
        )
    };

    ($level:ident, $component:literal, $msg:literal $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };
}

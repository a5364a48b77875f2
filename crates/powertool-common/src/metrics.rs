//! Metrics for PowerTool reconciliation
//!
//! Instruments are created lazily against the global meter provider, which
//! telemetry init points at the OTLP exporter when one is configured.

use once_cell::sync::Lazy;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram, Meter};

static METER: Lazy<Meter> = Lazy::new(|| global::meter("powertool"));

/// Histogram of PowerTool reconciliation duration
///
/// Labels:
/// - `result`: success, error
pub static RECONCILE_DURATION: Lazy<Histogram<f64>> = Lazy::new(|| {
    METER
        .f64_histogram("powertool_reconcile_duration_seconds")
        .with_description("Duration of PowerTool reconciliation in seconds")
        .with_unit("s")
        .build()
});

/// Counter of reconciliation errors
///
/// Labels:
/// - `kind`: error category (tool_not_found, namespace_denied, selector, kube, ...)
pub static RECONCILE_ERRORS: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("powertool_reconcile_errors_total")
        .with_description("Total number of PowerTool reconciliation errors")
        .with_unit("{errors}")
        .build()
});

/// Counter of diagnostic containers injected into pods
///
/// Labels:
/// - `tool`: tool name
/// - `mode`: output mode
pub static CONTAINERS_CREATED: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("powertool_containers_created_total")
        .with_description("Total number of diagnostic containers injected")
        .with_unit("{containers}")
        .build()
});

/// Counter of failed container injections
///
/// Labels:
/// - `tool`: tool name
pub static CONTAINER_FAILURES: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("powertool_container_failures_total")
        .with_description("Total number of failed diagnostic container injections")
        .with_unit("{containers}")
        .build()
});

/// Counter of pod ownership conflicts detected
pub static CONFLICTS_DETECTED: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("powertool_conflicts_detected_total")
        .with_description("Total number of PowerTool pod ownership conflicts")
        .with_unit("{conflicts}")
        .build()
});

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::KeyValue;

    #[test]
    fn instruments_record_without_provider() {
        RECONCILE_DURATION.record(0.25, &[KeyValue::new("result", "success")]);
        RECONCILE_ERRORS.add(1, &[KeyValue::new("kind", "kube")]);
        CONTAINERS_CREATED.add(1, &[KeyValue::new("tool", "perf")]);
        CONTAINER_FAILURES.add(1, &[KeyValue::new("tool", "perf")]);
        CONFLICTS_DETECTED.add(1, &[]);
    }
}

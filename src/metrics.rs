//! Lightweight metrics helpers for crconfig.
//!
//! This module exposes a small set of convenience functions and an RAII timer
//! wrapping the `metrics` crate macros. It does not install an exporter; the
//! embedding application can initialize any compatible recorder, and without
//! one every call is a no-op.
//!
//! Provided metrics:
//! * `crconfig_synthesis_runs_total` (counter, labels: cdn, outcome)
//! * `crconfig_synthesis_duration_seconds` (histogram, labels: cdn)
//! * `crconfig_delivery_services` (gauge, labels: cdn)
//! * `crconfig_diagnostics_total` (counter, labels: kind)
use std::time::Instant;

use metrics::{Unit, counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::Lazy;

pub const CRCONFIG_SYNTHESIS_RUNS_TOTAL: &str = "crconfig_synthesis_runs_total";
pub const CRCONFIG_SYNTHESIS_DURATION_SECONDS: &str = "crconfig_synthesis_duration_seconds";
pub const CRCONFIG_DELIVERY_SERVICES: &str = "crconfig_delivery_services";
pub const CRCONFIG_DIAGNOSTICS_TOTAL: &str = "crconfig_diagnostics_total";

static DESCRIPTIONS: Lazy<()> = Lazy::new(|| {
    describe_counter!(
        CRCONFIG_SYNTHESIS_RUNS_TOTAL,
        Unit::Count,
        "Total number of synthesis runs, by outcome."
    );
    describe_histogram!(
        CRCONFIG_SYNTHESIS_DURATION_SECONDS,
        Unit::Seconds,
        "Wall-clock duration of synthesis runs."
    );
    describe_gauge!(
        CRCONFIG_DELIVERY_SERVICES,
        "Number of delivery services in the most recent document."
    );
    describe_counter!(
        CRCONFIG_DIAGNOSTICS_TOTAL,
        Unit::Count,
        "Non-fatal conditions logged during synthesis, by kind."
    );
});

/// Outcome label of a synthesis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    Failure,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Success => "success",
            RunOutcome::Failure => "failure",
        }
    }
}

/// Count a finished synthesis run.
pub fn increment_synthesis_runs(cdn: &str, outcome: RunOutcome) {
    counter!(
        CRCONFIG_SYNTHESIS_RUNS_TOTAL,
        "cdn" => cdn.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record a completed run's duration.
pub fn record_synthesis_duration(cdn: &str, duration: std::time::Duration) {
    histogram!(CRCONFIG_SYNTHESIS_DURATION_SECONDS, "cdn" => cdn.to_string())
        .record(duration.as_secs_f64());
}

/// Set the number of delivery services in the latest document for a CDN.
pub fn set_delivery_services(cdn: &str, count: usize) {
    gauge!(CRCONFIG_DELIVERY_SERVICES, "cdn" => cdn.to_string()).set(count as f64);
}

/// Count one non-fatal condition.
pub fn increment_diagnostics(kind: &'static str) {
    counter!(CRCONFIG_DIAGNOSTICS_TOTAL, "kind" => kind).increment(1);
}

/// RAII helper measuring synthesis duration.
pub struct SynthesisTimer {
    start: Instant,
    cdn: String,
}

impl SynthesisTimer {
    pub fn new(cdn: &str) -> Self {
        Self {
            start: Instant::now(),
            cdn: cdn.to_string(),
        }
    }
}

impl Drop for SynthesisTimer {
    fn drop(&mut self) {
        record_synthesis_duration(&self.cdn, self.start.elapsed());
    }
}

/// Initialize metric descriptions (idempotent).
pub fn init_metrics() -> eyre::Result<()> {
    tracing::info!("Initializing crconfig metrics");
    Lazy::force(&DESCRIPTIONS);
    Ok(())
}

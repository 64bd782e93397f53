//! Prometheus metrics for the disaster-recovery daemon
//!
//! # Exported metrics
//! The `/metrics` endpoint (when built with `--features metrics`) exports the following metrics:
//! - `drd_switchovers_total` (counter): finished switchovers labeled by mode and result.
//! - `drd_switchover_duration_seconds` (histogram): DR action duration labeled by mode.
//! - `drd_switchover_attempts_total` (counter): DR action invocations labeled by mode.
//! - `drd_events_skipped_total` (counter): watch events ignored by the controller, labeled by reason.
//! - `drd_health_checks_total` (counter): health verdicts labeled by status.
//! - `drd_mode_requests_total` (counter): mode requests labeled by admission result.

use std::sync::atomic::AtomicU64;

use once_cell::sync::Lazy;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct SwitchoverLabels {
    pub mode: String,
    /// "done", "failed" or "skipped"
    pub result: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ModeLabels {
    pub mode: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReasonLabels {
    pub reason: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct StatusLabels {
    pub status: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ResultLabels {
    pub result: String,
}

pub static SWITCHOVERS_TOTAL: Lazy<Family<SwitchoverLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Histogram tracking DR action duration (seconds)
pub static SWITCHOVER_DURATION_SECONDS: Lazy<Family<ModeLabels, Histogram>> = Lazy::new(|| {
    fn action_histogram() -> Histogram {
        // 100ms .. ~55min across 16 buckets
        Histogram::new(exponential_buckets(0.1, 2.0, 16))
    }

    Family::new_with_constructor(action_histogram)
});

pub static SWITCHOVER_ATTEMPTS_TOTAL: Lazy<Family<ModeLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static EVENTS_SKIPPED_TOTAL: Lazy<Family<ReasonLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static HEALTH_CHECKS_TOTAL: Lazy<Family<StatusLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static MODE_REQUESTS_TOTAL: Lazy<Family<ResultLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::default();

    registry.register(
        "drd_switchovers",
        "Total number of finished switchovers",
        SWITCHOVERS_TOTAL.clone(),
    );
    registry.register(
        "drd_switchover_duration_seconds",
        "Duration of DR action invocations in seconds",
        SWITCHOVER_DURATION_SECONDS.clone(),
    );
    registry.register(
        "drd_switchover_attempts",
        "Total number of DR action invocations",
        SWITCHOVER_ATTEMPTS_TOTAL.clone(),
    );
    registry.register(
        "drd_events_skipped",
        "Total number of watch events ignored by the controller",
        EVENTS_SKIPPED_TOTAL.clone(),
    );
    registry.register(
        "drd_health_checks",
        "Total number of health checks by verdict",
        HEALTH_CHECKS_TOTAL.clone(),
    );
    registry.register(
        "drd_mode_requests",
        "Total number of mode change requests by admission result",
        MODE_REQUESTS_TOTAL.clone(),
    );

    registry
});

pub fn inc_switchover(mode: &str, result: &str) {
    let labels = SwitchoverLabels {
        mode: mode.to_string(),
        result: result.to_string(),
    };
    SWITCHOVERS_TOTAL.get_or_create(&labels).inc();
}

/// Observe a DR action duration in seconds.
pub fn observe_switchover_duration_seconds(mode: &str, seconds: f64) {
    let labels = ModeLabels {
        mode: mode.to_string(),
    };
    SWITCHOVER_DURATION_SECONDS
        .get_or_create(&labels)
        .observe(seconds);
}

pub fn inc_switchover_attempt(mode: &str) {
    let labels = ModeLabels {
        mode: mode.to_string(),
    };
    SWITCHOVER_ATTEMPTS_TOTAL.get_or_create(&labels).inc();
}

pub fn inc_event_skipped(reason: &str) {
    let labels = ReasonLabels {
        reason: reason.to_string(),
    };
    EVENTS_SKIPPED_TOTAL.get_or_create(&labels).inc();
}

pub fn inc_health_check(status: &str) {
    let labels = StatusLabels {
        status: status.to_string(),
    };
    HEALTH_CHECKS_TOTAL.get_or_create(&labels).inc();
}

pub fn inc_mode_request(result: &str) {
    let labels = ResultLabels {
        result: result.to_string(),
    };
    MODE_REQUESTS_TOTAL.get_or_create(&labels).inc();
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus_client::encoding::text::encode;

    #[test]
    fn test_counters_increment() {
        let labels = ReasonLabels {
            reason: "metrics-test-reason".to_string(),
        };
        let before = EVENTS_SKIPPED_TOTAL.get_or_create(&labels).get();
        inc_event_skipped("metrics-test-reason");
        inc_event_skipped("metrics-test-reason");
        assert_eq!(EVENTS_SKIPPED_TOTAL.get_or_create(&labels).get(), before + 2);
    }

    #[test]
    fn test_registry_exposes_metric_names() {
        inc_switchover("active", "done");
        observe_switchover_duration_seconds("active", 1.5);
        inc_switchover_attempt("active");
        inc_health_check("up");
        inc_mode_request("accepted");

        let mut buffer = String::new();
        encode(&mut buffer, &REGISTRY).unwrap();
        assert!(buffer.contains("drd_switchovers_total{mode=\"active\",result=\"done\"}"));
        assert!(buffer.contains("drd_switchover_duration_seconds"));
        assert!(buffer.contains("drd_switchover_attempts_total"));
        assert!(buffer.contains("drd_health_checks_total"));
        assert!(buffer.contains("drd_mode_requests_total"));
    }
}

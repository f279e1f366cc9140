//! Metrics collection for face-auth-service.
//!
//! HTTP metrics go through the `metrics` recorder; signup/login outcomes and
//! match distances live in a dedicated Prometheus registry.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
pub static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
pub static AUTH_ATTEMPTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static MATCH_DISTANCE: OnceLock<Histogram> = OnceLock::new();

/// Initialize metrics collection. Safe to call more than once.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_none() {
        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                let _ = METRICS_HANDLE.set(handle);
            }
            Err(e) => tracing::warn!("Prometheus recorder not installed: {}", e),
        }
    }

    if PROMETHEUS_REGISTRY.get().is_some() {
        return;
    }

    let registry = Registry::new();

    let attempts = IntCounterVec::new(
        Opts::new(
            "face_auth_attempts_total",
            "Signup and login attempts by operation and outcome",
        ),
        &["operation", "outcome"],
    );
    let distance = Histogram::with_opts(
        HistogramOpts::new(
            "face_auth_match_distance",
            "Smallest descriptor distance observed during login",
        )
        .buckets(vec![0.2, 0.4, 0.6, 0.8, 1.0, 1.2, 1.4, 1.6, 2.0]),
    );

    let (attempts, distance) = match (attempts, distance) {
        (Ok(a), Ok(d)) => (a, d),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!("Failed to create face-auth metrics: {}", e);
            return;
        }
    };

    if let Err(e) = registry
        .register(Box::new(attempts.clone()))
        .and_then(|_| registry.register(Box::new(distance.clone())))
    {
        tracing::error!("Failed to register face-auth metrics: {}", e);
        return;
    }

    let _ = PROMETHEUS_REGISTRY.set(registry);
    let _ = AUTH_ATTEMPTS_TOTAL.set(attempts);
    let _ = MATCH_DISTANCE.set(distance);
}

/// Get metrics output in Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    if let Some(registry) = PROMETHEUS_REGISTRY.get() {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&registry.gather(), &mut buffer).ok();
        if let Ok(custom_metrics) = String::from_utf8(buffer) {
            output.push_str(&custom_metrics);
        }
    }

    output
}

/// Record the outcome of a signup or login.
pub fn record_attempt(operation: &str, outcome: &str) {
    if let Some(counter) = AUTH_ATTEMPTS_TOTAL.get() {
        counter.with_label_values(&[operation, outcome]).inc();
    }
}

pub fn record_match_distance(distance: f32) {
    if let Some(histogram) = MATCH_DISTANCE.get() {
        histogram.observe(distance as f64);
    }
}

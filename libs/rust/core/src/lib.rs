//! Core shared utilities for WatchPost services.

use anyhow::Result;
use tracing::info;
use once_cell::sync::{Lazy, OnceCell};
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;
use serde::de::DeserializeOwned;
use tracing_subscriber::prelude::*;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Env var naming an optional YAML/TOML/JSON config file.
pub const CONFIG_FILE_ENV: &str = "WATCHPOST_CONFIG_FILE";
/// Prefix for environment overrides, e.g. `WATCHPOST__QUEUE_CAPACITY=64`.
pub const ENV_PREFIX: &str = "WATCHPOST";

// --- Detection metrics ---
#[derive(Clone, Debug)]
pub struct DetectionMetrics {
    pub frames_total: Counter<u64>,
    pub anomalies_total: Counter<u64>,
    pub suppressed_total: Counter<u64>,
    pub dropped_total: Counter<u64>,
    pub evaluate_latency_ms: Histogram<f64>,
}

static DETECTION_METER: Lazy<Meter> = Lazy::new(|| opentelemetry::global::meter("watchpost_detection"));
pub static DETECTION_METRICS: Lazy<DetectionMetrics> = Lazy::new(|| {
    DetectionMetrics {
        frames_total: DETECTION_METER.u64_counter("watchpost_frames_total")
            .with_description("Frames passed through the anomaly evaluator")
            .build(),
        anomalies_total: DETECTION_METER.u64_counter("watchpost_anomalies_total")
            .with_description("Anomalies emitted after repeat suppression")
            .build(),
        suppressed_total: DETECTION_METER.u64_counter("watchpost_anomalies_suppressed_total")
            .with_description("Candidate anomalies dropped as repeats")
            .build(),
        dropped_total: DETECTION_METER.u64_counter("watchpost_frames_dropped_total")
            .with_description("Frames rejected before evaluation")
            .build(),
        evaluate_latency_ms: DETECTION_METER.f64_histogram("watchpost_evaluate_latency_ms")
            .with_description("Wall time spent in one evaluate call (ms)")
            .with_unit("ms")
            .build(),
    }
});

pub fn detection_metrics() -> &'static DetectionMetrics { &DETECTION_METRICS }

/// Counts one emitted anomaly under its kind label.
pub fn record_anomaly(kind: &'static str) {
    DETECTION_METRICS.anomalies_total.add(1, &[KeyValue::new("kind", kind)]);
}

pub fn record_suppressed(kind: &'static str) {
    DETECTION_METRICS.suppressed_total.add(1, &[KeyValue::new("kind", kind)]);
}

pub fn record_dropped(reason: &'static str) {
    DETECTION_METRICS.dropped_total.add(1, &[KeyValue::new("reason", reason)]);
}

/// Installs the global tracing subscriber once per process.
///
/// Filtering follows `RUST_LOG`. Set `WATCHPOST_JSON_LOG=1` for JSON lines.
pub fn init_tracing(service: &str) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let json = std::env::var("WATCHPOST_JSON_LOG").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        // stdout carries frame reports, so logs go to stderr
        let fmt_layer = if json {
            tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false)
                .with_writer(std::io::stderr)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(true)
                .with_writer(std::io::stderr)
                .boxed()
        };
        tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init()?;
        Ok(())
    })?;
    info!(target: "watchpost", service, "tracing initialized");
    Ok(())
}

/// Loads a typed service config from layered sources:
/// serde defaults, then the file named by `WATCHPOST_CONFIG_FILE`, then `WATCHPOST__*` env vars.
pub fn load_config<T: DeserializeOwned>(service: &str) -> Result<T> {
    let mut builder = config::Config::builder()
        .set_default("service_name", service)?;
    if let Ok(file) = std::env::var(CONFIG_FILE_ENV) {
        info!(target: "watchpost", %file, "loading config file");
        builder = builder.add_source(config::File::with_name(&file).required(false));
    }
    builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"));
    let cfg: T = builder.build()?.try_deserialize()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Demo {
        service_name: String,
        #[serde(default = "default_depth")]
        depth: usize,
    }
    fn default_depth() -> usize { 8 }

    #[test]
    fn defaults_fill_missing_fields() {
        let cfg: Demo = load_config("demo-service").unwrap();
        assert_eq!(cfg.service_name, "demo-service");
        assert_eq!(cfg.depth, 8);
    }

    #[test]
    fn tracing_init_is_idempotent() {
        assert!(init_tracing("demo").is_ok());
        assert!(init_tracing("demo").is_ok());
    }

    #[test]
    fn metric_helpers_do_not_panic_without_provider() {
        record_anomaly("prohibited_object");
        record_suppressed("prohibited_object");
        record_dropped("queue_full");
        detection_metrics().frames_total.add(1, &[]);
    }
}

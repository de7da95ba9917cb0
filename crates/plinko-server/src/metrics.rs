//! Prometheus metrics for the query server

use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Query kinds used as the `kind` label
pub const KIND_PLAINTEXT: &str = "plaintext";
pub const KIND_FULLSET: &str = "fullset";
pub const KIND_SETPARITY: &str = "setparity";

/// Install the global Prometheus recorder
pub fn init_prometheus_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Count one query and record its server-side processing time
pub fn record_query(kind: &'static str, elapsed: Duration) {
    metrics::counter!("plinko_queries_total", "kind" => kind).increment(1);
    metrics::histogram!("plinko_query_duration_seconds", "kind" => kind)
        .record(elapsed.as_secs_f64());
}

//! Prometheus metrics infrastructure
//!
//! Installs the exporter; the domain crates emit counters through the
//! `metrics` facade at their transition points. Metric names in use:
//!
//! * `matching_suggestions_generated_total`
//! * `requests_created_total` / `requests_accepted_total` /
//!   `requests_rejected_total` / `requests_cancelled_total` /
//!   `requests_expired_total`
//! * `exchanges_completed_total` / `exchanges_cancelled_total` /
//!   `exchanges_expired_total`

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize the Prometheus metrics exporter
///
/// Starts an HTTP listener on the given port exposing `/metrics`.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(%addr, "Metrics exporter listening");
    Ok(())
}

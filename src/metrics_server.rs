// src/metrics_server.rs
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder. With `METRICS_ADDR` set (e.g.
/// `0.0.0.0:9090`) the exporter serves `/metrics` on its own listener;
/// otherwise the recorder runs without an exposition endpoint so counters
/// stay cheap no-ops in dev.
pub fn init() {
    match std::env::var("METRICS_ADDR") {
        Ok(addr) => match addr.parse::<std::net::SocketAddr>() {
            Ok(sock) => {
                if let Err(e) = PrometheusBuilder::new().with_http_listener(sock).install() {
                    tracing::warn!(error = ?e, "prometheus exporter failed to start");
                } else {
                    tracing::info!(%addr, "metrics exposed");
                }
            }
            Err(e) => {
                tracing::warn!(error = ?e, %addr, "METRICS_ADDR is not a socket address");
            }
        },
        Err(_) => {
            if let Err(e) = PrometheusBuilder::new().install_recorder() {
                tracing::debug!(error = ?e, "prometheus recorder not installed");
            }
        }
    }
}

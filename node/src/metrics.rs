//! # Prometheus Metrics
//!
//! Operational metrics for the gateway, scraped at `/metrics` on the
//! metrics port. Everything lives in a dedicated registry under the `bftx`
//! namespace.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Metric handles for the gateway.
#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    /// HTTP requests by endpoint and response status.
    pub requests_total: IntCounterVec,
    /// Operation invocations by operation name and outcome
    /// (`ok`, `error`, `silent`).
    pub operations_total: IntCounterVec,
    /// Request latency in seconds, by endpoint.
    pub request_latency_seconds: HistogramVec,
}

impl GatewayMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("bftx".into()), None)?;

        let requests_total = IntCounterVec::new(
            Opts::new("requests_total", "HTTP requests by endpoint and status"),
            &["endpoint", "status"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let operations_total = IntCounterVec::new(
            Opts::new(
                "operations_total",
                "Operation invocations by operation and outcome",
            ),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let request_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "request_latency_seconds",
                "End-to-end request latency in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
            &["endpoint"],
        )?;
        registry.register(Box::new(request_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            operations_total,
            request_latency_seconds,
        })
    }

    /// Records one finished HTTP request.
    pub fn observe_request(&self, endpoint: &str, status: u16, seconds: f64) {
        self.requests_total
            .with_label_values(&[endpoint, &status.to_string()])
            .inc();
        self.request_latency_seconds
            .with_label_values(&[endpoint])
            .observe(seconds);
    }

    /// Records one operation outcome.
    pub fn observe_operation(&self, operation: &str, outcome: &str) {
        self.operations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<GatewayMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_exposition() {
        let metrics = GatewayMetrics::new().unwrap();
        metrics.observe_request("bftx-api", 200, 0.002);
        metrics.observe_operation("getInfo", "ok");

        let text = metrics.encode().unwrap();
        assert!(text.contains("bftx_requests_total"));
        assert!(text.contains("endpoint=\"bftx-api\""));
        assert!(text.contains("bftx_operations_total"));
        assert!(text.contains("operation=\"getInfo\""));
        assert!(text.contains("bftx_request_latency_seconds"));
    }
}

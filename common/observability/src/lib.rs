use std::sync::Arc;

use axum::{extract::State, routing::get, Router};
use prometheus::{Histogram, HistogramOpts, IntCounterVec, IntGaugeVec, Opts, Registry};

/// Tracing setup shared by every binary in the workspace. Each binary calls this once at
/// the top of `main`, then builds one [`ServiceMetrics`] and registers whatever
/// service-specific gauges it needs into `metrics.registry`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Metrics common to every service: per-subject handler invocation counts, per-kind
/// error counts, and a gauge a service can drive with whatever it considers "open work"
/// (open reservations for a warehouse, pending proxy calls for the gateway, ...).
#[derive(Clone)]
pub struct ServiceMetrics {
    pub registry: Registry,
    pub handler_invocations_total: IntCounterVec,
    pub handler_errors_total: IntCounterVec,
    pub handler_duration_seconds: Histogram,
    pub open_work: IntGaugeVec,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let handler_invocations_total = IntCounterVec::new(
            Opts::new(
                "handler_invocations_total",
                "Number of broker messages handled, per subject",
            ),
            &["service", "subject"],
        )
        .unwrap();

        let handler_errors_total = IntCounterVec::new(
            Opts::new(
                "handler_errors_total",
                "Number of handler invocations that returned an error, per subject and kind",
            ),
            &["service", "subject", "kind"],
        )
        .unwrap();

        let handler_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "handler_duration_seconds",
                "Time spent inside a handler callback",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        )
        .unwrap();

        let open_work = IntGaugeVec::new(
            Opts::new(
                "open_work",
                "Service-defined count of outstanding work (open reservations, etc.)",
            ),
            &["service", "kind"],
        )
        .unwrap();

        let _ = registry.register(Box::new(handler_invocations_total.clone()));
        let _ = registry.register(Box::new(handler_errors_total.clone()));
        let _ = registry.register(Box::new(handler_duration_seconds.clone()));
        let _ = registry.register(Box::new(open_work.clone()));

        Self {
            registry,
            handler_invocations_total,
            handler_errors_total,
            handler_duration_seconds,
            open_work,
        }
    }

    pub fn record_invocation(&self, service: &str, subject: &str) {
        self.handler_invocations_total
            .with_label_values(&[service, subject])
            .inc();
    }

    pub fn record_error(&self, service: &str, subject: &str, kind: &str) {
        self.handler_errors_total
            .with_label_values(&[service, subject, kind])
            .inc();
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        use prometheus::{Encoder, TextEncoder};
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&families, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).to_string())
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics_text(State(metrics): State<Arc<ServiceMetrics>>) -> String {
    metrics.render().unwrap_or_else(|err| format!("# render error: {err}\n"))
}

/// Bind a minimal `/healthz` + `/metrics` server on `addr`, shared by every binary
/// (spec §2 "ambient stack"). Runs until the listener itself fails; callers spawn it as
/// a background task and don't await it.
pub async fn serve_metrics(addr: String, metrics: Arc<ServiceMetrics>) -> std::io::Result<()> {
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_text))
        .with_state(metrics);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_registered_families() {
        let metrics = ServiceMetrics::new();
        metrics.record_invocation("warehouse-service", "warehouse.reserve.w1");
        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("handler_invocations_total"));
    }
}

//! HTTP request metrics and the observability middleware.
//!
//! Every request except the scrape endpoint is logged on entry and exit and feeds
//! two Prometheus series:
//! - `http_requests_total{method,endpoint,http_status}`
//! - `http_request_latency_seconds{method,endpoint}`
//!
//! Paths under the API prefix collapse into one `<prefix>/*` label so the
//! label set stays bounded.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const METRICS_PATH: &str = "/metrics";
pub const LATENCY_BUCKETS: [f64; 6] = [0.1, 0.3, 0.5, 1.0, 2.0, 5.0];

#[derive(Clone)]
pub struct HttpMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,
    requests_total: IntCounterVec,
    latency_seconds: HistogramVec,
    api_prefix: String,
}

impl HttpMetrics {
    /// Build a fresh registry holding the request counter and latency histogram.
    pub fn new(api_prefix: &str) -> prometheus::Result<Self> {
        let registry = Registry::new();
        let requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests"),
            &["method", "endpoint", "http_status"],
        )?;
        let latency_seconds = HistogramVec::new(
            HistogramOpts::new("http_request_latency_seconds", "HTTP request latency")
                .buckets(LATENCY_BUCKETS.to_vec()),
            &["method", "endpoint"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(latency_seconds.clone()))?;
        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                requests_total,
                latency_seconds,
                api_prefix: api_prefix.trim_end_matches('/').to_string(),
            }),
        })
    }

    pub fn normalize_endpoint(&self, path: &str) -> String {
        normalize_endpoint(path, &self.inner.api_prefix)
    }

    pub fn observe(&self, method: &str, endpoint: &str, status: StatusCode, elapsed: Duration) {
        self.inner
            .requests_total
            .with_label_values(&[method, endpoint, status.as_str()])
            .inc();
        self.inner
            .latency_seconds
            .with_label_values(&[method, endpoint])
            .observe(elapsed.as_secs_f64());
    }

    pub fn request_count(&self, method: &str, endpoint: &str, status: StatusCode) -> u64 {
        self.inner
            .requests_total
            .with_label_values(&[method, endpoint, status.as_str()])
            .get()
    }

    /// Text exposition of everything in the registry.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.inner.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub fn normalize_endpoint(path: &str, api_prefix: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    let endpoint = if trimmed.is_empty() { "/" } else { trimmed };
    let prefix = api_prefix.trim_end_matches('/');
    if !prefix.is_empty() && (endpoint == prefix || endpoint.starts_with(&format!("{prefix}/"))) {
        return format!("{prefix}/*");
    }
    endpoint.to_string()
}

fn is_scrape(path: &str) -> bool { path.trim_end_matches('/') == METRICS_PATH }

/// Request observability middleware: pre-hook, handler, post-hook.
///
/// Only `next.run` sits inside the timed section.
pub async fn track_requests(State(metrics): State<HttpMetrics>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    if is_scrape(&path) {
        return next.run(req).await;
    }
    let method = req.method().as_str().to_string();
    let endpoint = metrics.normalize_endpoint(&path);
    info!(%method, %path, "request");

    let start = Instant::now();
    let response = next.run(req).await;
    let elapsed = start.elapsed();

    let status = response.status();
    debug!(%method, %endpoint, latency_ms = elapsed.as_secs_f64() * 1000.0, "observed_latency");
    info!(status = status.as_u16(), "response");
    metrics.observe(&method, &endpoint, status, elapsed);
    response
}

/// Scrape endpoint in the Prometheus text format.
pub async fn metrics_handler(State(metrics): State<HttpMetrics>) -> Response {
    match metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "metrics_encode_failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("encode error: {e}")).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_paths_collapse_to_wildcard() {
        assert_eq!(normalize_endpoint("/api/v1/predict", "/api/v1"), "/api/v1/*");
        assert_eq!(normalize_endpoint("/api/v1/predict/", "/api/v1"), "/api/v1/*");
        assert_eq!(normalize_endpoint("/api/v1", "/api/v1"), "/api/v1/*");
        assert_eq!(normalize_endpoint("/api/v10/x", "/api/v1"), "/api/v10/x");
        assert_eq!(normalize_endpoint("/health/", "/api/v1"), "/health");
        assert_eq!(normalize_endpoint("/", "/api/v1"), "/");
    }

    #[test]
    fn scrape_detection_ignores_trailing_slash() {
        assert!(is_scrape("/metrics"));
        assert!(is_scrape("/metrics/"));
        assert!(!is_scrape("/metricsx"));
    }

    #[test]
    fn observe_feeds_both_series() {
        let m = HttpMetrics::new("/api/v1").unwrap();
        m.observe("POST", "/api/v1/*", StatusCode::OK, Duration::from_millis(120));
        m.observe("POST", "/api/v1/*", StatusCode::OK, Duration::from_millis(80));
        m.observe("POST", "/api/v1/*", StatusCode::INTERNAL_SERVER_ERROR, Duration::from_millis(5));
        assert_eq!(m.request_count("POST", "/api/v1/*", StatusCode::OK), 2);
        assert_eq!(m.request_count("POST", "/api/v1/*", StatusCode::INTERNAL_SERVER_ERROR), 1);

        let text = m.render().unwrap();
        assert!(text.contains(r#"http_requests_total{endpoint="/api/v1/*",http_status="200",method="POST"} 2"#));
        assert!(text.contains(r#"http_request_latency_seconds_bucket{endpoint="/api/v1/*",method="POST",le="0.1"} 2"#));
        assert!(text.contains(r#"http_request_latency_seconds_count{endpoint="/api/v1/*",method="POST"} 3"#));
    }

    #[test]
    fn registries_are_independent() {
        let a = HttpMetrics::new("/api/v1").unwrap();
        let b = HttpMetrics::new("/api/v1").unwrap();
        a.observe("GET", "/health", StatusCode::OK, Duration::ZERO);
        assert_eq!(a.request_count("GET", "/health", StatusCode::OK), 1);
        assert_eq!(b.request_count("GET", "/health", StatusCode::OK), 0);
    }
}

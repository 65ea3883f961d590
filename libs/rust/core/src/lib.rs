//! Shared service plumbing: settings, tracing, HTTP metrics.

pub mod config;
pub mod metrics;
pub mod telemetry;

pub use config::Settings;
pub use metrics::{metrics_handler, normalize_endpoint, track_requests, HttpMetrics, METRICS_PATH};
pub use telemetry::init_tracing;

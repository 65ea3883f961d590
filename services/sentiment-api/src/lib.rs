//! Sentiment classification over HTTP.
//!
//! Routes:
//! - `POST {api_prefix}/predict` - batch sentiment labels
//! - `GET /health` - liveness, independent of model state
//! - `GET /status` - whether the model is loaded
//! - `GET /metrics` - Prometheus scrape endpoint

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use sentiment_core::{metrics_handler, track_requests, HttpMetrics, METRICS_PATH};

pub mod error;
pub mod model;
pub mod routes;
pub mod service;
pub mod store;

pub use error::{ApiError, ModelError, PredictionError, StoreError};
pub use model::{LinearTextModel, ModelOutput, SentimentModel, Serialized, StatefulModel};
pub use routes::{AppState, PredictionRequest, PredictionResponse};
pub use service::PredictionService;
pub use store::{ModelHandle, ModelStore};

/// Assemble the full router: API routes, health, metrics, observability, CORS.
pub fn build_router(state: AppState, metrics: HttpMetrics) -> Router {
    let prefix = state.settings.api_prefix.trim_end_matches('/').to_string();
    let api = Router::new().route("/predict", post(routes::predict));
    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/status", get(routes::status));
    let app = (if prefix.is_empty() { app.merge(api) } else { app.nest(&prefix, api) }).with_state(state);
    let scrape = Router::new()
        .route(METRICS_PATH, get(metrics_handler))
        .with_state(metrics.clone());
    // Tracking is outermost so CORS preflights are logged and counted too.
    app.merge(scrape)
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn_with_state(metrics, track_requests))
}

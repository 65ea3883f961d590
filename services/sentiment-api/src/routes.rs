use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use sentiment_core::Settings;

use crate::error::ApiError;
use crate::service::PredictionService;
use crate::store::ModelStore;

#[derive(Clone)]
pub struct AppState {
    pub service: PredictionService,
    pub store: Arc<ModelStore>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(store: Arc<ModelStore>, settings: Settings) -> Self {
        Self { service: PredictionService::new(store.clone()), store, settings: Arc::new(settings) }
    }
}

/// Body of `POST /predict`. Only a JSON object is accepted; a missing or
/// null `sentences` field reads as an empty batch.
#[derive(Debug, Default, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct PredictionRequest {
    pub sentences: Vec<String>,
}

impl TryFrom<Map<String, Value>> for PredictionRequest {
    type Error = serde_json::Error;

    fn try_from(mut body: Map<String, Value>) -> Result<Self, Self::Error> {
        let sentences = match body.remove("sentences") {
            None | Some(Value::Null) => Vec::new(),
            Some(v) => serde_json::from_value(v)?,
        };
        Ok(Self { sentences })
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictionResponse {
    pub predictions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub processing_time_ms: Option<f64>,
}

pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let Json(body) = payload.map_err(|rej| {
        warn!(status = rej.status().as_u16(), error = %rej.body_text(), "invalid_request_body");
        ApiError::InvalidBody { status: rej.status(), detail: rej.body_text() }
    })?;
    let sentences = body.sentences;
    if sentences.is_empty() {
        info!("received empty input");
        return Ok(Json(PredictionResponse { predictions: Vec::new(), processing_time_ms: None }));
    }

    let start = Instant::now();
    info!(?sentences, "received prediction request");
    let service = state.service.clone();
    let outcome = tokio::task::spawn_blocking(move || service.predict(&sentences)).await;
    let predictions = match outcome {
        Ok(Ok(p)) => p,
        Ok(Err(e)) => {
            error!(error = %e, "prediction request failed");
            return Err(ApiError::RequestFailed(e.to_string()));
        }
        Err(join) => {
            error!(error = %join, "prediction task aborted");
            return Err(ApiError::RequestFailed(format!("Prediction failed: {join}")));
        }
    };

    let processing_time_ms = start.elapsed().as_secs_f64() * 1000.0;
    info!(?predictions, processing_time_ms, "predictions ready");
    if processing_time_ms > state.settings.latency_threshold_ms {
        warn!(processing_time_ms, threshold_ms = state.settings.latency_threshold_ms, "slow prediction");
    }
    Ok(Json(PredictionResponse { predictions, processing_time_ms: Some(processing_time_ms) }))
}

pub async fn health() -> Json<Value> { Json(json!({"status": "healthy"})) }

pub async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "model_loaded": state.store.is_loaded(),
        "service": state.settings.api_title,
        "version": state.settings.api_version,
    }))
}

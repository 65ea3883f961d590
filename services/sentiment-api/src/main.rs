use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use sentiment_api::{build_router, AppState, ModelStore};
use sentiment_core::{init_tracing, HttpMetrics, Settings};

const SERVICE: &str = "sentiment-api";

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load()?;
    init_tracing(SERVICE, &settings)?;
    info!(?settings, "config_loaded");

    let store = Arc::new(ModelStore::new());
    if let Err(e) = store.initialize(&settings.model_path) {
        error!(error = %e, "model load failed, aborting startup");
        return Err(e.into());
    }

    let addr = settings.bind_addr()?;
    let metrics = HttpMetrics::new(&settings.api_prefix).context("registering http metrics")?;
    let app = build_router(AppState::new(store, settings), metrics);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "service ready");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
        })
        .await?;
    info!("shutdown");
    Ok(())
}

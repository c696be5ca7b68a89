//! HTTP front end.
//!
//! ## Endpoints
//!
//! - `POST /extract_notes/` (or `/extract_notes`): multipart form with a
//!   `file` field holding the recording. Responds with
//!   ```json
//!   {"notes": ["C4", "E4", "G4"]}
//!   ```
//!   or `{"error": "<message>"}` when the audio cannot be processed.
//! - `GET /health`: `{"status": "ok"}`.

mod handler;
mod types;


use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use crate::config::ServerConfig;
use crate::extract::NoteExtractor;

pub use handler::{process_upload, Upload, UPLOAD_FIELD};
pub use types::{ExtractResponse, HealthResponse};

#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<NoteExtractor>,
}

pub fn router(config: &ServerConfig) -> Result<Router> {
    let extractor = config.note_extractor();
    log::info!(
        "pitch search {:.1}..{:.1} Hz, frame {} hop {}, note floor {} Hz",
        extractor.pyin.fmin_hz,
        extractor.pyin.fmax_hz,
        extractor.pyin.frame_size,
        extractor.pyin.hop_size,
        extractor.mapper.min_hz()
    );
    let state = AppState {
        extractor: Arc::new(extractor),
    };
    Ok(Router::new()
        .route("/extract_notes/", post(handler::extract_notes))
        .route("/extract_notes", post(handler::extract_notes))
        .route("/health", get(handler::health))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors_layer(&config.allowed_origins)?)
        .with_state(state))
}

/// Any origin with credentials unless specific origins are configured.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return Ok(CorsLayer::very_permissive());
    }
    let origins = origins
        .iter()
        .map(|o| HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin {:?}", o)))
        .collect::<Result<Vec<_>>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

/// Bind and serve until Ctrl+C.
pub async fn serve(config: ServerConfig) -> Result<()> {
    let app = router(&config)?;
    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    log::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    log::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("shutting down"),
        Err(err) => {
            log::error!("failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await
        }
    }
}

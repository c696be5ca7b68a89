//! Request handlers.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::decode::decode_audio;
use crate::extract::NoteExtractor;
use crate::notes::NoteName;

use super::types::{ExtractResponse, HealthResponse};
use super::AppState;

/// Multipart field that carries the recording.
pub const UPLOAD_FIELD: &str = "file";

pub struct Upload {
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    fn extension(&self) -> Option<&str> {
        self.filename
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn extract_notes(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> (StatusCode, Json<ExtractResponse>) {
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            log::warn!("rejected upload: {}", rejection.body_text());
            return (
                rejection.status(),
                Json(ExtractResponse::error(rejection.body_text())),
            );
        }
    };

    let upload = match read_upload(multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => {
            log::warn!("request without a `{}` field", UPLOAD_FIELD);
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ExtractResponse::error(format!(
                    "missing form field `{}`",
                    UPLOAD_FIELD
                ))),
            );
        }
        Err(err) => {
            log::warn!("malformed upload: {}", err.body_text());
            return (err.status(), Json(ExtractResponse::error(err.body_text())));
        }
    };

    let name = upload.filename.clone().unwrap_or_else(|| "<unnamed>".to_string());
    log::info!("extracting notes from {} ({} bytes)", name, upload.bytes.len());

    let started = Instant::now();
    let extractor = state.extractor.clone();
    let outcome = tokio::task::spawn_blocking(move || process_upload(&extractor, upload)).await;

    let response = match outcome {
        Ok(Ok(notes)) => {
            log::info!(
                "{}: {} notes in {:.0?}",
                name,
                notes.len(),
                started.elapsed()
            );
            ExtractResponse::Notes { notes }
        }
        Ok(Err(err)) => {
            log::warn!("{}: {:#}", name, err);
            ExtractResponse::error(format!("{:#}", err))
        }
        Err(err) => {
            log::error!("{}: extraction worker failed: {}", name, err);
            ExtractResponse::error("internal error while extracting notes")
        }
    };
    (StatusCode::OK, Json(response))
}

/// Decode and analyse one upload. Runs on the blocking pool.
pub fn process_upload(extractor: &NoteExtractor, upload: Upload) -> Result<Vec<NoteName>> {
    let extension = upload.extension().map(str::to_owned);
    let audio = decode_audio(upload.bytes, extension.as_deref())?;
    log::debug!(
        "decoded {:.2}s at {} Hz",
        audio.duration_secs(),
        audio.sample_rate_hz
    );
    extractor.extract(&audio)
}

async fn read_upload(mut multipart: Multipart) -> Result<Option<Upload>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().map(str::to_owned);
        let bytes = field.bytes().await?.to_vec();
        return Ok(Some(Upload { filename, bytes }));
    }
    Ok(None)
}

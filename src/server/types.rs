//! Response bodies for the HTTP service.

use serde::Serialize;

use crate::notes::NoteName;

/// `{"notes": [...]}` on success, `{"error": "..."}` otherwise.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ExtractResponse {
    Notes { notes: Vec<NoteName> },
    Error { error: String },
}

impl ExtractResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

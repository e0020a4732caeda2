//! Key pair issuance.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::credential;
use crate::http::{AppError, AppState};

#[derive(Debug, Serialize)]
pub(crate) struct KeyPairResponse {
    #[serde(rename = "upload-key")]
    upload_key: String,
    #[serde(rename = "download-key")]
    download_key: String,
}

/// GET /kp - Issue a fresh tagged key pair.
pub(crate) async fn key_pair(
    State(state): State<AppState>,
) -> Result<Json<KeyPairResponse>, AppError> {
    let pair = state.data.generate_key_pair()?;
    Ok(Json(KeyPairResponse {
        upload_key: credential::tag_upload(&pair.upload_key),
        download_key: credential::tag_download(&pair.download_key),
    }))
}

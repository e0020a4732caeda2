//! Download handlers.

use axum::extract::{Path, State};
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};

use super::trim_path;
use crate::http::{AppError, AppState};
use crate::record::Value;

/// GET /d/{key}/json - The stored record as JSON.
pub(crate) async fn download_json(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let bytes = state.data.download_json(&key).await?;
    state.stats.record_download();

    Ok((
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )],
        bytes,
    )
        .into_response())
}

/// GET /d/{key}/plain/{*field} - One field as text.
pub(crate) async fn download_plain(
    State(state): State<AppState>,
    Path((key, field)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let value = state.data.download_field(&key, trim_path(&field)).await?;
    state.stats.record_download();
    Ok(plain(value.to_plain()))
}

/// GET /d/{key}/plain-from-base64url/{*field} - One field, base64-decoded.
pub(crate) async fn download_base64(
    State(state): State<AppState>,
    Path((key, field)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let value = state.data.download_field(&key, trim_path(&field)).await?;
    let decoded = match value {
        Value::Leaf(encoded) => decode_base64(&encoded).ok_or(AppError::Base64Decode)?,
        Value::Node(_) => return Err(AppError::Base64Decode),
    };
    state.stats.record_download();
    Ok(plain(decoded))
}

fn plain(text: String) -> Response {
    (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        )],
        format!("{text}\n"),
    )
        .into_response()
}

/// Standard alphabet first, then URL-safe, then either without padding.
fn decode_base64(encoded: &str) -> Option<String> {
    [STANDARD, URL_SAFE, STANDARD_NO_PAD, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(encoded).ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_base64_variants() {
        assert_eq!(decode_base64("aGVsbG8=").as_deref(), Some("hello"));
        assert_eq!(decode_base64("aGVsbG8").as_deref(), Some("hello"));
        // 0xfb 0xff encodes to "+/8=" / "-_8="
        assert_eq!(
            decode_base64("-_8="),
            Some(String::from_utf8_lossy(&[0xfb, 0xff]).into_owned())
        );
        assert_eq!(decode_base64("-_8").map(|s| s.len()), Some(6));
    }

    #[test]
    fn test_decode_base64_rejects_garbage() {
        assert!(decode_base64("not base64!").is_none());
    }
}

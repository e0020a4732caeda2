//! Upload and patch handlers.
//!
//! Both take their fields from the query string. Values are HTML-escaped
//! before storage and the first occurrence of a repeated name wins.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use serde::Serialize;

use super::{request_host, trim_path};
use crate::http::{AppError, AppState};
use crate::record::Params;

#[derive(Debug, Serialize)]
pub(crate) struct UploadResponse {
    message: &'static str,
    download_url: String,
    parameter_urls: BTreeMap<String, String>,
}

impl UploadResponse {
    fn new(host: &str, download_key: &str, path: &str, params: &Params) -> Self {
        let base = format!("http://{host}/d/{download_key}");
        let parameter_urls = params
            .keys()
            .map(|name| {
                let url = if path.is_empty() {
                    format!("{base}/plain/{name}")
                } else {
                    format!("{base}/plain/{path}/{name}")
                };
                (name.clone(), url)
            })
            .collect();

        Self {
            message: "Data uploaded successfully",
            download_url: format!("{base}/json"),
            parameter_urls,
        }
    }
}

/// GET /u/{key} - Replace the record with the query parameters.
pub(crate) async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<Json<UploadResponse>, AppError> {
    let params = sanitize_params(query);
    let written = state.data.upload(&key, &params).await?;
    state.stats.record_upload();

    Ok(Json(UploadResponse::new(
        request_host(&headers),
        &written.download_key,
        "",
        &params,
    )))
}

/// GET /patch/{key} - Merge the query parameters into the record root.
pub(crate) async fn patch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<Json<UploadResponse>, AppError> {
    merge_at(&state, &headers, &key, "", query).await
}

/// GET /patch/{key}/{*path} - Merge the query parameters at `path`.
pub(crate) async fn patch_at(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((key, path)): Path<(String, String)>,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<Json<UploadResponse>, AppError> {
    merge_at(&state, &headers, &key, trim_path(&path), query).await
}

async fn merge_at(
    state: &AppState,
    headers: &HeaderMap,
    key: &str,
    path: &str,
    query: Vec<(String, String)>,
) -> Result<Json<UploadResponse>, AppError> {
    let params = sanitize_params(query);
    let written = state.data.patch(key, path, &params).await?;
    state.stats.record_upload();

    Ok(Json(UploadResponse::new(
        request_host(headers),
        &written.download_key,
        path,
        &params,
    )))
}

fn sanitize_params(query: Vec<(String, String)>) -> Params {
    let mut params = Params::new();
    for (name, value) in query {
        params
            .entry(name)
            .or_insert_with(|| escape_html(&value));
    }
    params
}

/// Escape the five HTML-significant characters.
fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

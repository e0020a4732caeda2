use axum::extract::{Path, State};

use crate::http::{AppError, AppState};

/// GET /delete/{key} - Remove the record. Succeeds if it was already gone.
pub(crate) async fn delete(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<&'static str, AppError> {
    state.data.delete(&key).await?;
    Ok("OK\n")
}

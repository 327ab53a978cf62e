use axum::{
    extract::{Path, State},
    http::{
        header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderMap, HeaderValue,
    },
    response::{IntoResponse, Response},
};

use crate::compositor::generate_resume;
use crate::errors::AppError;
use crate::state::AppState;

/// GET /api/v1/portfolios/:id/resume
/// Renders the portfolio as a PDF attachment. The caller's `Authorization`
/// header is passed through to the portfolio backend.
pub async fn handle_download_resume(
    State(state): State<AppState>,
    Path(portfolio_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let credential = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());

    let artifact = generate_resume(
        state.source.as_ref(),
        &state.compositor,
        &portfolio_id,
        credential,
    )
    .await?;

    let disposition = content_disposition(&artifact.filename)?;
    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (CONTENT_DISPOSITION, disposition),
        ],
        artifact.bytes,
    )
        .into_response())
}

/// `attachment; filename*=UTF-8''…`, since filenames carry Hangul.
fn content_disposition(filename: &str) -> Result<HeaderValue, AppError> {
    let value = format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    );
    HeaderValue::from_str(&value).map_err(|e| AppError::Internal(e.into()))
}

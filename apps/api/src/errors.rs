use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::compositor::CompositorError;

const SOURCE_FAILURE_MESSAGE: &str = "포트폴리오 데이터를 가져올 수 없습니다.";
const GENERATION_FAILURE_MESSAGE: &str = "PDF 생성에 실패했습니다. 다시 시도해주세요.";

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
/// Diagnostic detail is logged, never sent to the client.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Compositor error: {0}")]
    Compositor(#[from] CompositorError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Compositor(CompositorError::Source(e)) => {
                tracing::error!("Portfolio fetch failed: {e}");
                let status = if e.is_not_found() {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::BAD_GATEWAY
                };
                (status, "PORTFOLIO_UNAVAILABLE", SOURCE_FAILURE_MESSAGE)
            }
            AppError::Compositor(e) => {
                tracing::error!("Resume generation failed: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PDF_GENERATION_FAILED",
                    GENERATION_FAILURE_MESSAGE,
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    GENERATION_FAILURE_MESSAGE,
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

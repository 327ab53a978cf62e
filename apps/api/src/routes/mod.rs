pub mod health;
pub mod resume;

use axum::{routing::get, Router};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/portfolios/:id/resume",
            get(resume::handle_download_resume),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    use crate::compositor::font_metrics::tests::mono_typeface;
    use crate::compositor::inliner::AssetInliner;
    use crate::compositor::layout::{LayoutEngine, PageGeometry};
    use crate::compositor::rasterizer::{RasterOptions, Rasterizer};
    use crate::compositor::Compositor;
    use crate::models::portfolio::{Portfolio, Profile};
    use crate::portfolio_client::{PortfolioSource, SourceError};

    /// Records the credential it was called with.
    #[derive(Default)]
    struct RecordingSource {
        seen: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl PortfolioSource for RecordingSource {
        async fn fetch(
            &self,
            portfolio_id: &str,
            credential: Option<&str>,
        ) -> Result<Portfolio, SourceError> {
            self.seen.lock().await.push(credential.map(str::to_string));
            match portfolio_id {
                "1" => Ok(Portfolio {
                    id: "1".to_string(),
                    profile: Profile {
                        name: "홍길동".to_string(),
                        ..Default::default()
                    },
                    ..Default::default()
                }),
                "down" => Err(SourceError::Api {
                    status: 503,
                    message: "maintenance".to_string(),
                }),
                other => Err(SourceError::NotFound(other.to_string())),
            }
        }
    }

    fn test_state(source: Arc<RecordingSource>) -> AppState {
        let geometry = PageGeometry::default();
        let options = RasterOptions {
            scale: 0.5,
            settle_delay: Duration::ZERO,
        };
        AppState {
            source,
            compositor: Arc::new(Compositor::new(
                AssetInliner::new(Duration::from_secs(1)).unwrap(),
                Rasterizer::new(LayoutEngine::new(mono_typeface(), geometry), options),
            )),
        }
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_health() {
        let app = build_router(test_state(Arc::default()));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "portfolio-api");
    }

    #[tokio::test]
    async fn test_download_returns_pdf_attachment_and_forwards_credential() {
        let source = Arc::new(RecordingSource::default());
        let app = build_router(test_state(source.clone()));
        let response = app
            .oneshot(
                Request::get("/api/v1/portfolios/1/resume")
                    .header(header::AUTHORIZATION, "Bearer abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment; filename*=UTF-8''%ED%99%8D"));

        let bytes = body_bytes(response).await;
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        assert_eq!(
            *source.seen.lock().await,
            vec![Some("Bearer abc".to_string())]
        );
    }

    #[tokio::test]
    async fn test_unknown_portfolio_is_404_json() {
        let app = build_router(test_state(Arc::default()));
        let response = app
            .oneshot(
                Request::get("/api/v1/portfolios/42/resume")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["error"]["code"], "PORTFOLIO_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_backend_outage_is_bad_gateway_without_details() {
        let app = build_router(test_state(Arc::default()));
        let response = app
            .oneshot(
                Request::get("/api/v1/portfolios/down/resume")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(!body.contains("maintenance"));
    }
}

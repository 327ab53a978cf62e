/// Portfolio client: the only way the service reads portfolio records.
///
/// Records live in the upstream CRUD backend; this module fetches one by id,
/// forwarding the caller's credential untouched.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::portfolio::Portfolio;

const MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("portfolio {0} not found")]
    NotFound(String),

    #[error("portfolio backend rejected the credential (status {0})")]
    Unauthorized(u16),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("portfolio JSON could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("portfolio backend unavailable after {attempts} attempts")]
    Unavailable { attempts: u32 },
}

impl SourceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::NotFound(_))
    }
}

/// Supplies the portfolio record for one compositor run.
#[async_trait]
pub trait PortfolioSource: Send + Sync {
    async fn fetch(
        &self,
        portfolio_id: &str,
        credential: Option<&str>,
    ) -> Result<Portfolio, SourceError>;
}

/// `GET {base_url}/portfolios/{id}` against the upstream backend.
/// Retries 429, 5xx and transport errors with exponential backoff.
#[derive(Clone)]
pub struct HttpPortfolioSource {
    client: Client,
    base_url: String,
    backoff: Duration,
}

impl HttpPortfolioSource {
    pub fn new(base_url: impl Into<String>) -> reqwest::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            backoff: DEFAULT_BACKOFF,
        })
    }

    /// Base delay before the first retry; doubles on each further attempt.
    #[cfg(test)]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    fn url_for(&self, portfolio_id: &str) -> String {
        format!(
            "{}/portfolios/{}",
            self.base_url,
            urlencoding::encode(portfolio_id)
        )
    }
}

#[async_trait]
impl PortfolioSource for HttpPortfolioSource {
    async fn fetch(
        &self,
        portfolio_id: &str,
        credential: Option<&str>,
    ) -> Result<Portfolio, SourceError> {
        let url = self.url_for(portfolio_id);
        let mut last_error: Option<SourceError> = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                // 1s, 2s with the default base
                let delay = self.backoff * (1 << (attempt - 1));
                warn!(
                    "portfolio fetch attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.get(&url);
            if let Some(credential) = credential {
                request = request.header(AUTHORIZATION, credential);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(SourceError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("portfolio backend returned {status}: {body}");
                last_error = Some(SourceError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            match status {
                StatusCode::NOT_FOUND => {
                    return Err(SourceError::NotFound(portfolio_id.to_string()))
                }
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    return Err(SourceError::Unauthorized(status.as_u16()))
                }
                s if !s.is_success() => {
                    return Err(SourceError::Api {
                        status: s.as_u16(),
                        message: response.text().await.unwrap_or_default(),
                    })
                }
                _ => {}
            }

            let body = response.bytes().await?;
            let portfolio: Portfolio = serde_json::from_slice(&body)?;
            debug!("fetched portfolio {portfolio_id} ({} bytes)", body.len());
            return Ok(portfolio);
        }

        Err(last_error.unwrap_or(SourceError::Unavailable {
            attempts: MAX_ATTEMPTS,
        }))
    }
}

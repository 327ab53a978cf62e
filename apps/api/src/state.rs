use std::sync::Arc;

use crate::compositor::Compositor;
use crate::portfolio_client::PortfolioSource;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Upstream portfolio backend. `HttpPortfolioSource` in production.
    pub source: Arc<dyn PortfolioSource>,
    pub compositor: Arc<Compositor>,
}

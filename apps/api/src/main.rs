mod compositor;
mod config;
mod errors;
mod models;
mod portfolio_client;
mod routes;
mod state;

use anyhow::{bail, Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::compositor::font_metrics::{Typeface, HANGUL_SAMPLE};
use crate::compositor::inliner::AssetInliner;
use crate::compositor::layout::LayoutEngine;
use crate::compositor::rasterizer::Rasterizer;
use crate::compositor::Compositor;
use crate::config::Config;
use crate::portfolio_client::HttpPortfolioSource;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting portfolio API v{}", env!("CARGO_PKG_VERSION"));

    // Upstream portfolio backend
    let source = HttpPortfolioSource::new(config.portfolio_api_url.clone())
        .context("failed to build portfolio HTTP client")?;
    info!("Portfolio source: {}", config.portfolio_api_url);

    // Font for text measurement and glyph painting
    let typeface = match &config.font_path {
        Some(path) => {
            let typeface = Typeface::load(path)?;
            if !typeface.covers(HANGUL_SAMPLE) {
                warn!("{} has no Hangul glyphs; Korean text will not be painted", path.display());
            }
            info!("Resume font loaded from {}", path.display());
            typeface
        }
        None => match Typeface::resolve_system() {
            Some((typeface, path)) => {
                info!("Resume font resolved from system: {}", path.display());
                typeface
            }
            None => bail!(
                "no Hangul-capable system font found; install Noto Sans KR or Nanum Gothic, \
                 or set RESUME_FONT_PATH"
            ),
        },
    };

    let geometry = config.page_geometry();
    info!(
        "Page geometry: {}x{}mm, break tolerance {}mm, raster scale {}",
        geometry.width_mm, geometry.page_height_mm, geometry.break_tolerance_mm, config.raster_scale
    );

    let inliner = AssetInliner::new(config.asset_fetch_timeout)
        .context("failed to build asset HTTP client")?;
    let rasterizer = Rasterizer::new(
        LayoutEngine::new(typeface, geometry),
        config.raster_options(),
    );

    // Build app state
    let state = AppState {
        source: Arc::new(source),
        compositor: Arc::new(Compositor::new(inliner, rasterizer)),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict to the front-end origin once it is configurable

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

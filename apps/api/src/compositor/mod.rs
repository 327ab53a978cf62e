/// Resume compositor: turns one portfolio record into a paginated PDF.
///
/// Pipeline: fetch → inline photo → assemble → rasterize → paginate.
/// The stages run strictly in sequence. Only the photo inliner degrades
/// softly; every other failure aborts the run with no partial artifact.
pub mod assembler;
pub mod document;
pub mod font_metrics;
pub mod inliner;
pub mod layout;
pub mod paginator;
pub mod rasterizer;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::models::portfolio::Portfolio;
use crate::portfolio_client::{PortfolioSource, SourceError};

use self::assembler::assemble;
use self::inliner::AssetInliner;
use self::paginator::{EncodeError, Paginator, PdfArtifact};
use self::rasterizer::{RasterError, Rasterizer};

#[derive(Debug, Error)]
pub enum CompositorError {
    #[error("portfolio fetch failed: {0}")]
    Source(#[from] SourceError),

    #[error("rasterization failed: {0}")]
    Raster(#[from] RasterError),

    #[error("PDF encoding failed: {0}")]
    Encode(#[from] EncodeError),
}

/// The stateless stages of one run. Shared across requests; holds no
/// per-run state, so concurrent runs produce independent artifacts.
#[derive(Clone)]
pub struct Compositor {
    inliner: AssetInliner,
    rasterizer: Rasterizer,
    paginator: Paginator,
}

impl Compositor {
    /// The paginator takes its page geometry from the rasterizer's layout
    /// engine so both agree on where a page ends.
    pub fn new(inliner: AssetInliner, rasterizer: Rasterizer) -> Self {
        let paginator = Paginator::new(rasterizer.layout_engine().geometry());
        Self {
            inliner,
            rasterizer,
            paginator,
        }
    }

    /// Runs every stage after the fetch for an already-loaded record.
    pub async fn compose(&self, portfolio: &Portfolio) -> Result<PdfArtifact, CompositorError> {
        let photo = self.inliner.inline(portfolio.profile.image.as_deref()).await;
        if photo.is_degraded() {
            warn!("continuing with degraded photo reference");
        }

        let tree = assemble(portfolio, photo);
        info!("assembled outline: {}", tree.outline().join(" / "));

        let bitmap = self.rasterizer.rasterize(tree).await?;

        let paginator = self.paginator.clone();
        let name = portfolio.profile.name.clone();
        let date = Utc::now().date_naive();
        let artifact =
            tokio::task::spawn_blocking(move || paginator.paginate(bitmap, &name, date))
                .await
                .map_err(|e| EncodeError::Task(e.to_string()))??;

        Ok(artifact)
    }
}

/// One compositor invocation for `portfolio_id`.
///
/// `credential` is handed to the source untouched; the compositor itself
/// depends only on the returned record.
pub async fn generate_resume(
    source: &dyn PortfolioSource,
    compositor: &Compositor,
    portfolio_id: &str,
    credential: Option<&str>,
) -> Result<PdfArtifact, CompositorError> {
    let span = info_span!("resume", portfolio_id = %portfolio_id, run_id = %Uuid::new_v4());

    async move {
        info!("resume generation started");
        let portfolio = source.fetch(portfolio_id, credential).await?;
        info!("portfolio loaded");

        let artifact = compositor.compose(&portfolio).await?;
        info!(
            "resume generation finished: {} ({} pages)",
            artifact.filename, artifact.page_count
        );
        Ok(artifact)
    }
    .instrument(span)
    .await
}

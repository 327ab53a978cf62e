use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::compositor::layout::{PageGeometry, A4_HEIGHT_MM, A4_WIDTH_MM};
use crate::compositor::rasterizer::RasterOptions;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub portfolio_api_url: String,
    pub port: u16,
    pub rust_log: String,
    /// TTF/OTF with Hangul coverage. Unset: a system face is resolved at startup.
    pub font_path: Option<PathBuf>,
    pub page_height_mm: f32,
    pub break_tolerance_mm: f32,
    pub raster_scale: f32,
    pub settle_delay: Duration,
    pub asset_fetch_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let page_height_mm: f32 = parse_env("RESUME_PAGE_HEIGHT_MM", A4_HEIGHT_MM)?;
        anyhow::ensure!(
            page_height_mm > 0.0,
            "RESUME_PAGE_HEIGHT_MM must be positive"
        );
        let break_tolerance_mm: f32 = parse_env("RESUME_BREAK_TOLERANCE_MM", 1.0)?;
        anyhow::ensure!(
            (0.0..page_height_mm).contains(&break_tolerance_mm),
            "RESUME_BREAK_TOLERANCE_MM must be between 0 and the page height"
        );
        let raster_scale: f32 = parse_env("RESUME_RASTER_SCALE", 2.0)?;
        anyhow::ensure!(
            raster_scale.is_finite() && raster_scale > 0.0,
            "RESUME_RASTER_SCALE must be positive"
        );

        Ok(Config {
            portfolio_api_url: require_env("PORTFOLIO_API_URL")?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            font_path: std::env::var("RESUME_FONT_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            page_height_mm,
            break_tolerance_mm,
            raster_scale,
            settle_delay: Duration::from_millis(parse_env("RESUME_SETTLE_DELAY_MS", 500)?),
            asset_fetch_timeout: Duration::from_secs(parse_env("ASSET_FETCH_TIMEOUT_SECS", 30)?),
        })
    }

    pub fn page_geometry(&self) -> PageGeometry {
        PageGeometry {
            width_mm: A4_WIDTH_MM,
            page_height_mm: self.page_height_mm,
            break_tolerance_mm: self.break_tolerance_mm,
        }
    }

    pub fn raster_options(&self) -> RasterOptions {
        RasterOptions {
            scale: self.raster_scale,
            settle_delay: self.settle_delay,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            portfolio_api_url: "http://localhost:3001/api".to_string(),
            port: 8080,
            rust_log: "info".to_string(),
            font_path: None,
            page_height_mm: 295.0,
            break_tolerance_mm: 0.5,
            raster_scale: 1.5,
            settle_delay: Duration::from_millis(10),
            asset_fetch_timeout: Duration::from_secs(3),
        }
    }

    #[test]
    fn test_page_geometry_carries_configured_height() {
        let geometry = config().page_geometry();
        assert_eq!(geometry.width_mm, 210.0);
        assert_eq!(geometry.page_height_mm, 295.0);
        assert_eq!(geometry.break_tolerance_mm, 0.5);
    }

    #[test]
    fn test_raster_options_from_config() {
        let options = config().raster_options();
        assert_eq!(options.scale, 1.5);
        assert_eq!(options.settle_delay, Duration::from_millis(10));
    }

    #[test]
    fn test_parse_env_default_and_error() {
        std::env::remove_var("PORTFOLIO_API_TEST_UNSET");
        assert_eq!(parse_env::<u16>("PORTFOLIO_API_TEST_UNSET", 7).unwrap(), 7);

        std::env::set_var("PORTFOLIO_API_TEST_BAD", "abc");
        let err = parse_env::<u16>("PORTFOLIO_API_TEST_BAD", 7).unwrap_err();
        assert!(err.to_string().contains("PORTFOLIO_API_TEST_BAD"));
        std::env::remove_var("PORTFOLIO_API_TEST_BAD");
    }
}

//! Asset inliner: turns the profile photo reference into a self-contained
//! `data:` URI so the rasterizer never touches the network.
//!
//! This is the only compositor stage that performs network I/O. It never
//! fails: any fetch/decode/encode problem yields [`InlineImage::Fallback`]
//! carrying the original reference.

use std::io::Cursor;
use std::time::Duration;

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

/// JPEG quality used for re-encoded photos.
pub const INLINE_JPEG_QUALITY: u8 = 80;

/// Outcome of inlining one photo reference.
#[derive(Debug, Clone, PartialEq)]
pub enum InlineImage {
    /// The profile has no photo.
    Absent,
    /// Already a `data:` or `blob:` reference; passed through untouched.
    Embedded(String),
    /// Fetched and re-encoded as a JPEG `data:` URI.
    Inlined(String),
    /// Inlining failed; the original external reference is kept.
    Fallback(String),
}

impl InlineImage {
    /// The reference an image element would load, if there is one.
    pub fn renderable_source(&self) -> Option<&str> {
        match self {
            InlineImage::Absent => None,
            InlineImage::Embedded(src) | InlineImage::Inlined(src) | InlineImage::Fallback(src) => {
                Some(src)
            }
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, InlineImage::Fallback(_))
    }
}

#[derive(Debug, Error)]
enum InlineError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("asset host answered {0}")]
    Status(u16),

    #[error("image decode failed: {0}")]
    Decode(image::ImageError),

    #[error("image encode failed: {0}")]
    Encode(image::ImageError),
}

/// Returns true for references that are already self-contained.
pub fn is_embedded_reference(reference: &str) -> bool {
    reference.starts_with("data:") || reference.starts_with("blob:")
}

#[derive(Clone)]
pub struct AssetInliner {
    client: Client,
}

impl AssetInliner {
    pub fn new(fetch_timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(fetch_timeout).build()?,
        })
    }

    /// Inlines `image_ref`. Never returns an error; see [`InlineImage`].
    pub async fn inline(&self, image_ref: Option<&str>) -> InlineImage {
        let Some(reference) = image_ref.map(str::trim).filter(|r| !r.is_empty()) else {
            return InlineImage::Absent;
        };

        if is_embedded_reference(reference) {
            return InlineImage::Embedded(reference.to_string());
        }

        match self.fetch_and_encode(reference).await {
            Ok(data_uri) => {
                debug!("inlined photo {reference} ({} bytes)", data_uri.len());
                InlineImage::Inlined(data_uri)
            }
            Err(e) => {
                warn!("photo inline failed, keeping original reference {reference}: {e}");
                InlineImage::Fallback(reference.to_string())
            }
        }
    }

    async fn fetch_and_encode(&self, url: &str) -> Result<String, InlineError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(InlineError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;

        let decoded = image::load_from_memory(&body).map_err(InlineError::Decode)?;
        encode_jpeg_data_uri(&decoded, INLINE_JPEG_QUALITY)
    }
}

/// Re-encodes `img` at its natural size as a base64 JPEG `data:` URI.
/// Transparent pixels are flattened onto white.
fn encode_jpeg_data_uri(img: &DynamicImage, quality: u8) -> Result<String, InlineError> {
    let rgb = flatten_on_white(img);
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&rgb)
        .map_err(InlineError::Encode)?;

    let payload = base64::engine::general_purpose::STANDARD.encode(buf.into_inner());
    Ok(format!("data:image/jpeg;base64,{payload}"))
}

fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut out = RgbImage::new(width, height);
    for (src, dst) in rgba.pixels().zip(out.pixels_mut()) {
        let [r, g, b, a] = src.0;
        let blend = |c: u8| -> u8 {
            let c = c as u32;
            let a = a as u32;
            ((c * a + 255 * (255 - a) + 127) / 255) as u8
        };
        dst.0 = [blend(r), blend(g), blend(b)];
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use image::{ImageFormat, Rgba, RgbaImage};

    pub(crate) fn png_fixture(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 255]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    /// Serves `/photo.png`, `/garbage` and `/missing` on an ephemeral port.
    pub(crate) async fn spawn_asset_host() -> String {
        let png = png_fixture(6, 4);
        let app = Router::new()
            .route(
                "/photo.png",
                get(move || {
                    let png = png.clone();
                    async move { png }
                }),
            )
            .route("/garbage", get(|| async { b"not an image".to_vec() }))
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn inliner() -> AssetInliner {
        AssetInliner::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_absent_and_blank_references_skip_network() {
        assert_eq!(inliner().inline(None).await, InlineImage::Absent);
        assert_eq!(inliner().inline(Some("  ")).await, InlineImage::Absent);
    }

    #[tokio::test]
    async fn test_embedded_references_pass_through_unchanged() {
        let data = "data:image/png;base64,AAAA";
        let blob = "blob:https://app.example.com/5f1c";
        assert_eq!(
            inliner().inline(Some(data)).await,
            InlineImage::Embedded(data.to_string())
        );
        assert_eq!(
            inliner().inline(Some(blob)).await,
            InlineImage::Embedded(blob.to_string())
        );
    }

    #[tokio::test]
    async fn test_reachable_photo_is_reencoded_as_jpeg_data_uri() {
        let host = spawn_asset_host().await;
        let result = inliner().inline(Some(&format!("{host}/photo.png"))).await;
        let InlineImage::Inlined(uri) = result else {
            panic!("expected Inlined, got {result:?}");
        };
        let payload = uri.strip_prefix("data:image/jpeg;base64,").unwrap();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (6, 4));
    }

    #[tokio::test]
    async fn test_http_error_falls_back_to_original_reference() {
        let host = spawn_asset_host().await;
        let url = format!("{host}/missing");
        assert_eq!(
            inliner().inline(Some(&url)).await,
            InlineImage::Fallback(url.clone())
        );
    }

    #[tokio::test]
    async fn test_undecodable_body_falls_back() {
        let host = spawn_asset_host().await;
        let url = format!("{host}/garbage");
        let result = inliner().inline(Some(&url)).await;
        assert!(result.is_degraded());
        assert_eq!(result.renderable_source(), Some(url.as_str()));
    }

    #[tokio::test]
    async fn test_unreachable_host_falls_back() {
        let url = "http://127.0.0.1:9/photo.jpg";
        assert_eq!(
            inliner().inline(Some(url)).await,
            InlineImage::Fallback(url.to_string())
        );
    }

    #[test]
    fn test_flatten_on_white_blends_transparency() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0])));
        assert_eq!(flatten_on_white(&img).get_pixel(0, 0).0, [255, 255, 255]);
    }
}

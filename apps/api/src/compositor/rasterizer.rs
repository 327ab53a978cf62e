//! Rasterizer: paints the laid-out document into one tall bitmap.
//!
//! Steps per call: lay the tree out at the fixed logical width, resolve every
//! image element (the load barrier), wait the settle delay, then paint on a
//! blocking thread. The surface lives only for the duration of the call; the
//! returned [`PageBitmap`] owns the pixels.
//!
//! No network I/O happens here. Image elements whose source is not an
//! embedded `data:` URI resolve as failed loads and stay blank.

use std::collections::HashMap;
use std::ops::Range;
use std::time::Duration;

use base64::Engine;
use thiserror::Error;
use tiny_skia::{
    FillRule, FilterQuality, Paint, Path, PathBuilder, Pattern, Pixmap, SpreadMode, Stroke,
    Transform,
};
use tracing::{debug, info, warn};
use ttf_parser::{Face, OutlineBuilder};

use crate::compositor::document::DocumentTree;
use crate::compositor::font_metrics::{Typeface, BOLD_WIDTH_FACTOR};
use crate::compositor::layout::{DrawOp, LayoutEngine, Rect, Rgb, Scene};

/// Settle delay applied after the image-load barrier unless configured otherwise.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("invalid raster size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("invalid raster scale {0}")]
    InvalidScale(f32),

    #[error("raster task failed: {0}")]
    Task(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Page bitmap
// ────────────────────────────────────────────────────────────────────────────

/// The full rendered document as one bitmap of fixed width.
///
/// Carries the page pitch in device pixels as laid out, so the paginator
/// never re-derives it from the rounded bitmap width.
pub struct PageBitmap {
    pixmap: Pixmap,
    page_height_px: f32,
    break_tolerance_px: f32,
}

impl std::fmt::Debug for PageBitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageBitmap")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("page_height_px", &self.page_height_px)
            .finish()
    }
}

impl PageBitmap {
    pub fn new(pixmap: Pixmap, page_height_px: f32, break_tolerance_px: f32) -> Self {
        Self {
            pixmap,
            page_height_px,
            break_tolerance_px,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn page_height_px(&self) -> f32 {
        self.page_height_px
    }

    pub fn break_tolerance_px(&self) -> f32 {
        self.break_tolerance_px
    }

    #[cfg(test)]
    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Packed 8-bit RGB for rows `rows` (clamped to the bitmap).
    pub fn rgb_rows(&self, rows: Range<u32>) -> Vec<u8> {
        let width = self.width() as usize;
        let start = rows.start.min(self.height()) as usize;
        let end = rows.end.min(self.height()) as usize;
        let data = &self.pixmap.data()[start * width * 4..end * width * 4];

        let mut out = Vec::with_capacity((end - start) * width * 3);
        for px in data.chunks_exact(4) {
            let a = px[3];
            for &c in &px[..3] {
                out.push(demultiply(c, a));
            }
        }
        out
    }
}

fn demultiply(c: u8, a: u8) -> u8 {
    match a {
        255 => c,
        0 => 255,
        a => ((c as u32 * 255 + a as u32 / 2) / a as u32).min(255) as u8,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rasterizer
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct RasterOptions {
    /// Device pixels per layout unit.
    pub scale: f32,
    pub settle_delay: Duration,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            scale: 2.0,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rasterizer {
    layout: LayoutEngine,
    options: RasterOptions,
}

impl Rasterizer {
    pub fn new(layout: LayoutEngine, options: RasterOptions) -> Self {
        Self { layout, options }
    }

    pub fn layout_engine(&self) -> &LayoutEngine {
        &self.layout
    }

    /// Renders `tree` into a single bitmap as tall as the whole document.
    pub async fn rasterize(&self, tree: DocumentTree) -> Result<PageBitmap, RasterError> {
        let scale = self.options.scale;
        if !(scale.is_finite() && scale > 0.0) {
            return Err(RasterError::InvalidScale(scale));
        }

        let scene = self.layout.layout(&tree);
        drop(tree);
        debug!(
            "layout: {}x{} units, {} ops",
            scene.width,
            scene.height,
            scene.ops.len()
        );

        let sources: Vec<String> = scene.image_sources().map(str::to_string).collect();
        let images = tokio::task::spawn_blocking(move || load_images(&sources))
            .await
            .map_err(|e| RasterError::Task(format!("image barrier: {e}")))?;

        if !self.options.settle_delay.is_zero() {
            tokio::time::sleep(self.options.settle_delay).await;
        }

        let typeface = self.layout.typeface().clone();
        let pitch = PagePitch {
            page_height_px: self.layout.page_height() * scale,
            break_tolerance_px: self.layout.break_tolerance() * scale,
        };
        let bitmap = tokio::task::spawn_blocking(move || paint_scene(&scene, &images, &typeface, scale, pitch))
            .await
            .map_err(|e| RasterError::Task(format!("paint: {e}")))??;

        info!("rasterized {}x{} px", bitmap.width(), bitmap.height());
        Ok(bitmap)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Image load barrier
// ────────────────────────────────────────────────────────────────────────────

/// Resolves every image source. `None` marks a failed load.
fn load_images(sources: &[String]) -> HashMap<String, Option<Pixmap>> {
    let mut out = HashMap::new();
    for source in sources {
        if out.contains_key(source) {
            continue;
        }
        let loaded = parse_data_uri(source).and_then(|data| decode_image_to_pixmap(&data));
        if loaded.is_none() {
            warn!(
                "image element failed to load, leaving frame blank: {}",
                truncate_source(source)
            );
        }
        out.insert(source.clone(), loaded);
    }
    out
}

fn truncate_source(source: &str) -> String {
    if source.len() <= 64 {
        return source.to_string();
    }
    let mut end = 64;
    while !source.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &source[..end])
}

fn parse_data_uri(uri: &str) -> Option<Vec<u8>> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    if header.contains(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .ok()
    } else {
        Some(payload.as_bytes().to_vec())
    }
}

fn decode_image_to_pixmap(data: &[u8]) -> Option<Pixmap> {
    let rgba = image::load_from_memory(data).ok()?.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut pixmap = Pixmap::new(width, height)?;
    for (src, dst) in rgba
        .as_raw()
        .chunks_exact(4)
        .zip(pixmap.data_mut().chunks_exact_mut(4))
    {
        let a = src[3];
        dst[0] = premultiply(src[0], a);
        dst[1] = premultiply(src[1], a);
        dst[2] = premultiply(src[2], a);
        dst[3] = a;
    }
    Some(pixmap)
}

fn premultiply(channel: u8, alpha: u8) -> u8 {
    let prod = (channel as u16) * (alpha as u16) + 127;
    ((prod + (prod >> 8)) >> 8) as u8
}

// ────────────────────────────────────────────────────────────────────────────
// Painting
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct PagePitch {
    page_height_px: f32,
    break_tolerance_px: f32,
}

fn paint_scene(
    scene: &Scene,
    images: &HashMap<String, Option<Pixmap>>,
    typeface: &Typeface,
    scale: f32,
    pitch: PagePitch,
) -> Result<PageBitmap, RasterError> {
    let width = (scene.width * scale).round() as u32;
    let height = (scene.height * scale).ceil().max(1.0) as u32;
    let mut pixmap = Pixmap::new(width, height).ok_or(RasterError::InvalidSize { width, height })?;
    pixmap.fill(tiny_skia::Color::WHITE);

    let transform = Transform::from_scale(scale, scale);
    let face = typeface.face();
    if face.is_none() {
        debug!("no outline font loaded; text is laid out but not painted");
    }

    for op in &scene.ops {
        match op {
            DrawOp::Fill { rect, color } => {
                if let Some(r) = sk_rect(rect) {
                    pixmap.fill_rect(r, &solid(*color), transform, None);
                }
            }
            DrawOp::Stroke { rect, color, width } => {
                if let Some(path) = sk_rect(rect).map(PathBuilder::from_rect) {
                    let stroke = Stroke {
                        width: *width,
                        ..Stroke::default()
                    };
                    pixmap.stroke_path(&path, &solid(*color), &stroke, transform, None);
                }
            }
            DrawOp::Text {
                x,
                baseline,
                size,
                bold,
                color,
                letter_spacing,
                text,
            } => {
                if let Some(face) = &face {
                    let run = TextRun {
                        x: *x,
                        baseline: *baseline,
                        size: *size,
                        bold: *bold,
                        letter_spacing: *letter_spacing,
                    };
                    draw_text(&mut pixmap, face, &run, text, *color, transform);
                }
            }
            DrawOp::Image { frame, source } => {
                if let Some(Some(img)) = images.get(source) {
                    draw_cover(&mut pixmap, img, frame, transform);
                }
            }
        }
    }

    Ok(PageBitmap::new(
        pixmap,
        pitch.page_height_px,
        pitch.break_tolerance_px,
    ))
}

fn sk_rect(rect: &Rect) -> Option<tiny_skia::Rect> {
    tiny_skia::Rect::from_xywh(rect.x, rect.y, rect.w, rect.h)
}

fn solid(color: Rgb) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.0, color.1, color.2, 255);
    paint.anti_alias = true;
    paint
}

/// Scales `img` to cover `frame`, centered and clipped to it.
fn draw_cover(pixmap: &mut Pixmap, img: &Pixmap, frame: &Rect, transform: Transform) {
    let (iw, ih) = (img.width() as f32, img.height() as f32);
    let Some(rect) = sk_rect(frame) else {
        return;
    };
    let s = (frame.w / iw).max(frame.h / ih);
    let tx = frame.x + (frame.w - iw * s) / 2.0;
    let ty = frame.y + (frame.h - ih * s) / 2.0;

    let paint = Paint {
        shader: Pattern::new(
            img.as_ref(),
            SpreadMode::Pad,
            FilterQuality::Bilinear,
            1.0,
            Transform::from_row(s, 0.0, 0.0, s, tx, ty),
        ),
        anti_alias: true,
        ..Paint::default()
    };
    pixmap.fill_rect(rect, &paint, transform, None);
}

struct TextRun {
    x: f32,
    baseline: f32,
    size: f32,
    bold: bool,
    letter_spacing: f32,
}

fn draw_text(
    pixmap: &mut Pixmap,
    face: &Face<'_>,
    run: &TextRun,
    text: &str,
    color: Rgb,
    transform: Transform,
) {
    let paint = solid(color);
    let units_scale = run.size / face.units_per_em().max(1) as f32;
    let widen = if run.bold { BOLD_WIDTH_FACTOR } else { 1.0 };
    let embolden = Stroke {
        width: run.size * 0.035,
        ..Stroke::default()
    };

    let mut pen_x = run.x;
    for c in text.chars() {
        let (gid, advance_em) = Typeface::glyph_advance_em(face, c);
        if let Some(gid) = gid {
            let mut builder = GlyphPathBuilder::new(pen_x, run.baseline, units_scale);
            if face.outline_glyph(gid, &mut builder).is_some() {
                if let Some(path) = builder.finish() {
                    pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);
                    if run.bold {
                        pixmap.stroke_path(&path, &paint, &embolden, transform, None);
                    }
                }
            }
        }
        pen_x += advance_em * run.size * widen + run.letter_spacing;
    }
}

/// Maps font units (y up) onto layout units (y down) at a pen position.
struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    fn new(origin_x: f32, origin_y: f32, scale: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            origin_x,
            origin_y,
            scale,
        }
    }

    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.origin_y - y * self.scale)
    }

    fn finish(self) -> Option<Path> {
        self.builder.finish()
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

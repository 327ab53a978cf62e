//! Paginator/Encoder: slices the tall bitmap into A4 pages and writes a PDF.
//!
//! Page `i` covers bitmap rows `[round(i·P), round((i+1)·P))`, where `P` is
//! the page pitch in device pixels the rasterizer laid the document out with.
//! Each slice is embedded once as a Flate-compressed RGB image on its own A4
//! page, scaled to the page width and anchored at the top edge. A configured
//! page height shorter than A4 only shortens the slice.

use std::io::Write;
use std::ops::Range;

use bytes::Bytes;
use chrono::NaiveDate;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use thiserror::Error;
use tracing::info;

use crate::compositor::layout::{PageGeometry, A4_HEIGHT_MM};
use crate::compositor::rasterizer::PageBitmap;

const MM_PER_INCH: f32 = 25.4;
const PT_PER_INCH: f32 = 72.0;
const PRODUCER: &str = concat!("portfolio-api ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("bitmap has no pixels")]
    EmptyBitmap,

    #[error("compression failed: {0}")]
    Compress(#[from] std::io::Error),

    #[error("PDF assembly failed: {0}")]
    Pdf(String),

    #[error("encode task failed: {0}")]
    Task(String),
}

/// Finished document. The compositor keeps no reference to it.
#[derive(Debug, Clone)]
pub struct PdfArtifact {
    pub filename: String,
    pub bytes: Bytes,
    pub page_count: usize,
}

/// `{name}_이력서_{YYYY-MM-DD}.pdf`.
pub fn resume_filename(name: &str, date: NaiveDate) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, '/' | '\\' | ':' | '"' | '*' | '?' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .collect();
    let stem = if cleaned.is_empty() {
        "portfolio"
    } else {
        cleaned.as_str()
    };
    format!("{stem}_이력서_{}.pdf", date.format("%Y-%m-%d"))
}

/// Row ranges of each page of a bitmap `height_px` tall, given the page
/// pitch and break tolerance in device pixels.
///
/// The first page is always emitted. A trailing remainder no taller than the
/// break tolerance is dropped.
pub fn page_slices(height_px: u32, page_px: f32, tolerance_px: f32) -> Vec<Range<u32>> {
    let page_px = page_px as f64;
    let tolerance_px = tolerance_px as f64;
    let height = height_px as f64;

    let mut slices = Vec::new();
    if height_px == 0 || page_px <= 0.0 {
        return slices;
    }

    let mut top = 0.0_f64;
    loop {
        let start = top.round() as u32;
        if start >= height_px {
            break;
        }
        if !slices.is_empty() && height - top <= tolerance_px {
            break;
        }
        let end = ((top + page_px).round() as u32).min(height_px);
        slices.push(start..end);
        top += page_px;
    }
    slices
}

#[derive(Debug, Clone)]
pub struct Paginator {
    geometry: PageGeometry,
}

impl Paginator {
    pub fn new(geometry: PageGeometry) -> Self {
        Self { geometry }
    }

    /// Encodes `bitmap` as a paginated PDF; consumes the bitmap.
    pub fn paginate(
        &self,
        bitmap: PageBitmap,
        name: &str,
        date: NaiveDate,
    ) -> Result<PdfArtifact, EncodeError> {
        let width_px = bitmap.width();
        let slices = page_slices(
            bitmap.height(),
            bitmap.page_height_px(),
            bitmap.break_tolerance_px(),
        );
        if slices.is_empty() {
            return Err(EncodeError::EmptyBitmap);
        }

        let page_w_pt = self.geometry.width_mm / MM_PER_INCH * PT_PER_INCH;
        let page_h_pt = A4_HEIGHT_MM / MM_PER_INCH * PT_PER_INCH;
        let pt_per_px = page_w_pt / width_px as f32;

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::with_capacity(slices.len());

        for rows in &slices {
            let slice_h = rows.end - rows.start;
            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width_px as i64,
                    "Height" => slice_h as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "FlateDecode",
                },
                deflate(&bitmap.rgb_rows(rows.clone()))?,
            ));

            let draw_h = slice_h as f32 * pt_per_px;
            let content = Content {
                operations: vec![
                    Operation::new("q", vec![]),
                    Operation::new(
                        "cm",
                        vec![
                            page_w_pt.into(),
                            0.into(),
                            0.into(),
                            draw_h.into(),
                            0.into(),
                            (page_h_pt - draw_h).into(),
                        ],
                    ),
                    Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                    Operation::new("Q", vec![]),
                ],
            };
            let encoded = content
                .encode()
                .map_err(|e| EncodeError::Pdf(e.to_string()))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Im0" => image_id },
                },
            });
            kids.push(page_id.into());
        }

        let page_count = kids.len();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count as i64,
                "MediaBox" => vec![0.into(), 0.into(), page_w_pt.into(), page_h_pt.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => pdf_text(&format!("{} 이력서", name.trim())),
            "Producer" => pdf_text(PRODUCER),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);
        drop(bitmap);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| EncodeError::Pdf(e.to_string()))?;

        let filename = resume_filename(name, date);
        info!("encoded {filename}: {page_count} page(s), {} bytes", bytes.len());
        Ok(PdfArtifact {
            filename,
            bytes: Bytes::from(bytes),
            page_count,
        })
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// UTF-16BE text string with BOM, as PDF requires for non-Latin text.
fn pdf_text(s: &str) -> Object {
    let mut bytes = vec![0xFE, 0xFF];
    for unit in s.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiny_skia::Pixmap;

    const WIDTH: f32 = 800.0;

    fn page_px(g: &PageGeometry) -> f32 {
        g.page_height_units(WIDTH)
    }

    fn tolerance_px(g: &PageGeometry) -> f32 {
        g.mm_to_units(g.break_tolerance_mm, WIDTH)
    }

    fn slices(height: u32, g: &PageGeometry) -> Vec<Range<u32>> {
        page_slices(height, page_px(g), tolerance_px(g))
    }

    fn bitmap(width: u32, height: u32, g: &PageGeometry) -> PageBitmap {
        let mut pixmap = Pixmap::new(width, height).unwrap();
        pixmap.fill(tiny_skia::Color::WHITE);
        let per_unit = width as f32 / WIDTH;
        PageBitmap::new(pixmap, page_px(g) * per_unit, tolerance_px(g) * per_unit)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn media_box(doc: &Document) -> Vec<f32> {
        let pages_id = doc
            .catalog()
            .unwrap()
            .get(b"Pages")
            .unwrap()
            .as_reference()
            .unwrap();
        doc.get_dictionary(pages_id)
            .unwrap()
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o.as_float().unwrap())
            .collect()
    }

    #[test]
    fn test_height_exactly_one_page_gives_one_page() {
        let g = PageGeometry::default();
        let h = page_px(&g).round() as u32;
        assert_eq!(slices(h, &g), vec![0..h]);
    }

    #[test]
    fn test_rounding_sliver_within_tolerance_is_dropped() {
        let g = PageGeometry::default();
        let h = page_px(&g).ceil() as u32 + 1;
        assert_eq!(slices(h, &g).len(), 1);
    }

    #[test]
    fn test_remainder_beyond_tolerance_adds_page() {
        let g = PageGeometry::default();
        let h = (page_px(&g) + 20.0).round() as u32;
        let slices = slices(h, &g);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[1].end, h);
    }

    #[test]
    fn test_exact_multiple_of_pages_has_no_trailing_page() {
        let g = PageGeometry::default();
        for pages in 1..=4u32 {
            let h = (page_px(&g) * pages as f32).round() as u32;
            assert_eq!(slices(h, &g).len(), pages as usize, "pages={pages}");
        }
    }

    #[test]
    fn test_slices_are_contiguous() {
        let g = PageGeometry::default();
        let slices = page_slices(9000, page_px(&g) * 2.0, tolerance_px(&g) * 2.0);
        assert_eq!(slices.first().unwrap().start, 0);
        for pair in slices.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(slices.last().unwrap().end, 9000);
    }

    #[test]
    fn test_fractional_pitch_does_not_drift() {
        // 800 units at 1/3 scale: the bitmap is 267px wide, but a page is
        // still 1131.43 / 3 px tall.
        let pitch = PageGeometry::default().page_height_units(WIDTH) / 3.0;
        let slices = page_slices((pitch * 12.0).ceil() as u32, pitch, 1.0);
        assert_eq!(slices.len(), 12);
        for (i, rows) in slices.iter().enumerate() {
            assert_eq!(rows.start, (pitch as f64 * i as f64).round() as u32, "page {i}");
        }
    }

    #[test]
    fn test_short_page_height_configuration() {
        let g = PageGeometry {
            page_height_mm: 295.0,
            ..PageGeometry::default()
        };
        let a4 = page_px(&PageGeometry::default()).round() as u32;
        // A full 297 mm sheet overflows a 295 mm page by ~7px, more than 1 mm.
        assert_eq!(slices(a4, &g).len(), 2);
    }

    #[test]
    fn test_paginate_writes_loadable_pdf_with_expected_pages() {
        let g = PageGeometry::default();
        let h = (page_px(&g) * 2.0 * 0.5).round() as u32;
        let artifact = Paginator::new(g)
            .paginate(bitmap(400, h, &g), "홍길동", date())
            .unwrap();
        assert_eq!(artifact.page_count, 2);
        assert!(artifact.bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load_mem(&artifact.bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
        assert_eq!(artifact.filename, "홍길동_이력서_2026-10-16.pdf");
    }

    #[test]
    fn test_short_page_height_keeps_a4_media_box() {
        let g = PageGeometry {
            page_height_mm: 295.0,
            ..PageGeometry::default()
        };
        let h = (page_px(&g) * 0.5).round() as u32;
        let artifact = Paginator::new(g)
            .paginate(bitmap(400, h, &g), "홍길동", date())
            .unwrap();
        assert_eq!(artifact.page_count, 1);

        let doc = Document::load_mem(&artifact.bytes).unwrap();
        let media_box = media_box(&doc);
        assert!((media_box[2] - 595.28).abs() < 0.01, "{media_box:?}");
        assert!((media_box[3] - 841.89).abs() < 0.01, "{media_box:?}");
    }

    #[test]
    fn test_filename_sanitizes_and_defaults() {
        assert_eq!(resume_filename("  ", date()), "portfolio_이력서_2026-10-16.pdf");
        assert_eq!(resume_filename("a/b", date()), "a_b_이력서_2026-10-16.pdf");
    }

    #[test]
    fn test_pdf_text_is_utf16_with_bom() {
        let Object::String(bytes, _) = pdf_text("이") else {
            panic!("expected string");
        };
        assert_eq!(bytes, vec![0xFE, 0xFF, 0xC7, 0x74]);
    }
}

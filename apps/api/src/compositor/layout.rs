//! Fixed-layout engine: places a [`DocumentTree`] on an 800-unit-wide canvas.
//!
//! Layout units are CSS-pixel-like (1pt = 4/3 units). The output [`Scene`] is
//! a flat list of draw operations plus the placement of every block, which
//! the rasterizer paints and tests inspect.
//!
//! Each sheet's height is rounded up to a whole number of pages of the shared
//! [`PageGeometry`], so a following sheet always begins on a fresh page.

use crate::compositor::document::{
    Block, DocumentTree, IdentityCard, NarrativeBlock, Sheet, TableBlock, TableBody,
};
use crate::compositor::font_metrics::Typeface;

// ────────────────────────────────────────────────────────────────────────────
// Page geometry
// ────────────────────────────────────────────────────────────────────────────

/// Logical width of the mounted document.
pub const LAYOUT_WIDTH: f32 = 800.0;

pub const A4_WIDTH_MM: f32 = 210.0;
pub const A4_HEIGHT_MM: f32 = 297.0;

/// Page geometry shared by layout and pagination.
///
/// The rendered width always maps to `width_mm`; `page_height_mm` is where a
/// page break falls; a trailing remainder no taller than
/// `break_tolerance_mm` is not emitted as a page of its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width_mm: f32,
    pub page_height_mm: f32,
    pub break_tolerance_mm: f32,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            width_mm: A4_WIDTH_MM,
            page_height_mm: A4_HEIGHT_MM,
            break_tolerance_mm: 1.0,
        }
    }
}

impl PageGeometry {
    /// Converts millimetres to units of a surface `surface_width` wide.
    pub fn mm_to_units(&self, mm: f32, surface_width: f32) -> f32 {
        mm * surface_width / self.width_mm
    }

    /// Page height in units of a surface `surface_width` wide.
    pub fn page_height_units(&self, surface_width: f32) -> f32 {
        self.mm_to_units(self.page_height_mm, surface_width)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scene
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

pub const TEXT: Rgb = Rgb(0x33, 0x33, 0x33);
pub const MUTED: Rgb = Rgb(0x99, 0x99, 0x99);
pub const BORDER: Rgb = Rgb(0xcc, 0xcc, 0xcc);
pub const PANEL: Rgb = Rgb(0xf5, 0xf5, 0xf5);
pub const HEADER_CELL: Rgb = Rgb(0xe9, 0xe9, 0xe9);
pub const WHITE: Rgb = Rgb(0xff, 0xff, 0xff);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Fill {
        rect: Rect,
        color: Rgb,
    },
    Stroke {
        rect: Rect,
        color: Rgb,
        width: f32,
    },
    Text {
        x: f32,
        baseline: f32,
        size: f32,
        bold: bool,
        color: Rgb,
        letter_spacing: f32,
        text: String,
    },
    /// An image element; `source` is whatever reference the document holds.
    Image {
        frame: Rect,
        source: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedBlock {
    pub sheet: usize,
    pub heading: String,
    pub top: f32,
    pub bottom: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub width: f32,
    pub height: f32,
    pub ops: Vec<DrawOp>,
    pub blocks: Vec<PlacedBlock>,
    /// Top edge of every sheet.
    pub sheet_tops: Vec<f32>,
}

impl Scene {
    pub fn image_sources(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Image { source, .. } => Some(source.as_str()),
            _ => None,
        })
    }

    #[cfg(test)]
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Template metrics
// ────────────────────────────────────────────────────────────────────────────

const PT: f32 = 4.0 / 3.0;

const SHEET_PADDING_MM: f32 = 20.0;
const LINE_HEIGHT: f32 = 1.4;
const NARRATIVE_LINE_HEIGHT: f32 = 1.8;
const ASCENT: f32 = 0.8;

const TITLE_SIZE: f32 = 20.0 * PT;
const TITLE_LETTER_SPACING: f32 = 8.0;
const HEADING_SIZE: f32 = 12.0 * PT;
const SUBHEADING_SIZE: f32 = 13.0 * PT;
const BODY_SIZE: f32 = 11.0 * PT;
const TABLE_SIZE: f32 = 10.0 * PT;

const BLOCK_GAP: f32 = 20.0;
const CARD_PADDING: f32 = 12.0;
const PHOTO_W: f32 = 130.0;
const PHOTO_H: f32 = 170.0;
const PHOTO_GAP: f32 = 25.0;
const LABEL_COL_W: f32 = 80.0;
const CELL_PAD_X: f32 = 8.0;
const CELL_PAD_Y: f32 = 8.0;
const EMPTY_ROW_PAD_Y: f32 = 20.0;
const BORDER_W: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Align {
    Left,
    Center,
}

#[derive(Debug, Clone, Copy)]
struct CellStyle {
    size: f32,
    bold: bool,
    color: Rgb,
    background: Rgb,
    align: Align,
    pad_y: f32,
}

const HEADER_STYLE: CellStyle = CellStyle {
    size: TABLE_SIZE,
    bold: true,
    color: TEXT,
    background: HEADER_CELL,
    align: Align::Center,
    pad_y: CELL_PAD_Y,
};

const BODY_STYLE: CellStyle = CellStyle {
    size: TABLE_SIZE,
    bold: false,
    color: TEXT,
    background: WHITE,
    align: Align::Center,
    pad_y: CELL_PAD_Y,
};

// ────────────────────────────────────────────────────────────────────────────
// Layout engine
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LayoutEngine {
    typeface: Typeface,
    geometry: PageGeometry,
}

impl LayoutEngine {
    pub fn new(typeface: Typeface, geometry: PageGeometry) -> Self {
        Self { typeface, geometry }
    }

    pub fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    pub fn typeface(&self) -> &Typeface {
        &self.typeface
    }

    pub fn page_height(&self) -> f32 {
        self.geometry.page_height_units(LAYOUT_WIDTH)
    }

    /// Break tolerance in layout units.
    pub fn break_tolerance(&self) -> f32 {
        self.geometry
            .mm_to_units(self.geometry.break_tolerance_mm, LAYOUT_WIDTH)
    }

    pub fn layout(&self, tree: &DocumentTree) -> Scene {
        let mut builder = SceneBuilder {
            typeface: &self.typeface,
            ops: Vec::new(),
            blocks: Vec::new(),
        };
        let padding = self.geometry.mm_to_units(SHEET_PADDING_MM, LAYOUT_WIDTH);
        let page_h = self.page_height();

        let mut sheet_tops = Vec::with_capacity(tree.sheets.len());
        let mut top = 0.0_f32;
        for (index, sheet) in tree.sheets.iter().enumerate() {
            sheet_tops.push(top);
            let content_bottom = builder.sheet(index, sheet, top, padding);
            let used = content_bottom - top;
            // Small epsilon so content ending exactly on a break does not spill.
            let pages = (used / page_h - 1e-4).ceil().max(1.0);
            top += pages * page_h;
        }

        Scene {
            width: LAYOUT_WIDTH,
            height: top,
            ops: builder.ops,
            blocks: builder.blocks,
            sheet_tops,
        }
    }
}

struct SceneBuilder<'a> {
    typeface: &'a Typeface,
    ops: Vec<DrawOp>,
    blocks: Vec<PlacedBlock>,
}

impl SceneBuilder<'_> {
    /// Lays out one sheet starting at `top`; returns the bottom of its content.
    fn sheet(&mut self, index: usize, sheet: &Sheet, top: f32, padding: f32) -> f32 {
        let x = padding;
        let width = LAYOUT_WIDTH - 2.0 * padding;
        let mut y = top + padding;

        y += self.title(&sheet.title, x, y, width);
        y += if sheet.blocks.iter().any(|b| matches!(b, Block::Narrative(_))) {
            40.0
        } else {
            30.0
        };

        for block in &sheet.blocks {
            let block_top = y;
            let height = match block {
                Block::Identity(card) => self.identity(card, x, y, width),
                Block::Table(table) => self.table(table, x, y, width),
                Block::Narrative(narrative) => self.narrative(narrative, x, y, width),
            };
            self.blocks.push(PlacedBlock {
                sheet: index,
                heading: block.heading().to_string(),
                top: block_top,
                bottom: block_top + height,
            });
            y += height + BLOCK_GAP;
        }

        y - BLOCK_GAP + padding
    }

    fn title(&mut self, text: &str, x: f32, y: f32, width: f32) -> f32 {
        let line_h = TITLE_SIZE * 1.2;
        let chars = text.chars().count() as f32;
        let text_w = self.typeface.measure(text, TITLE_SIZE, true) + TITLE_LETTER_SPACING * chars;
        self.ops.push(DrawOp::Text {
            x: x + (width - text_w) / 2.0,
            baseline: y + (line_h - TITLE_SIZE) / 2.0 + TITLE_SIZE * ASCENT,
            size: TITLE_SIZE,
            bold: true,
            color: TEXT,
            letter_spacing: TITLE_LETTER_SPACING,
            text: text.to_string(),
        });
        line_h
    }

    fn identity(&mut self, card: &IdentityCard, x: f32, y: f32, width: f32) -> f32 {
        // Panel is drawn first; its height is only known after the contents.
        let panel_index = self.ops.len();
        self.ops.push(DrawOp::Fill {
            rect: Rect::new(x, y, width, 0.0),
            color: PANEL,
        });

        let inner_x = x + CARD_PADDING;
        let mut inner_y = y + CARD_PADDING;
        let heading_h = HEADING_SIZE * LINE_HEIGHT;
        self.text_line(&card.heading, inner_x, inner_y, heading_h, HEADING_SIZE, true, TEXT);
        inner_y += heading_h + 10.0;

        let photo = Rect::new(inner_x, inner_y, PHOTO_W, PHOTO_H);
        self.ops.push(DrawOp::Fill {
            rect: photo,
            color: PANEL,
        });
        match card.photo.renderable_source() {
            Some(source) => self.ops.push(DrawOp::Image {
                frame: photo,
                source: source.to_string(),
            }),
            None => {
                let text_w = self.typeface.measure(&card.photo_placeholder, TABLE_SIZE, false);
                self.ops.push(DrawOp::Text {
                    x: photo.x + (photo.w - text_w) / 2.0,
                    baseline: photo.y + (photo.h - TABLE_SIZE) / 2.0 + TABLE_SIZE * ASCENT,
                    size: TABLE_SIZE,
                    bold: false,
                    color: MUTED,
                    letter_spacing: 0.0,
                    text: card.photo_placeholder.clone(),
                });
            }
        }
        self.stroke(photo);

        let table_x = inner_x + PHOTO_W + PHOTO_GAP;
        let table_w = x + width - CARD_PADDING - table_x;
        let widths = [LABEL_COL_W, table_w - LABEL_COL_W];
        let mut row_y = inner_y;
        for (label, value) in &card.fields {
            let cells = [label.clone(), value.clone()];
            row_y += self.row_mixed(table_x, row_y, &widths, &cells);
        }

        let inner_h = (row_y - inner_y).max(PHOTO_H);
        let height = inner_y + inner_h + CARD_PADDING - y;
        let panel = Rect::new(x, y, width, height);
        self.ops[panel_index] = DrawOp::Fill {
            rect: panel,
            color: PANEL,
        };
        self.stroke(panel);
        height
    }

    /// Identity rows: bold shaded label cell, left-aligned value cell.
    fn row_mixed(&mut self, x: f32, y: f32, widths: &[f32; 2], cells: &[String; 2]) -> f32 {
        let label_style = HEADER_STYLE;
        let value_style = CellStyle {
            align: Align::Left,
            ..BODY_STYLE
        };
        let label_lines = self.wrap_cell(&cells[0], widths[0], label_style);
        let value_lines = self.wrap_cell(&cells[1], widths[1], value_style);
        let lines = label_lines.len().max(value_lines.len());
        let h = lines as f32 * TABLE_SIZE * LINE_HEIGHT + 2.0 * CELL_PAD_Y;

        self.cell(Rect::new(x, y, widths[0], h), &label_lines, label_style);
        self.cell(Rect::new(x + widths[0], y, widths[1], h), &value_lines, value_style);
        h
    }

    fn table(&mut self, table: &TableBlock, x: f32, y: f32, width: f32) -> f32 {
        let mut cursor = y;

        let bar_h = HEADING_SIZE * LINE_HEIGHT + 2.0 * CELL_PAD_Y;
        let bar = Rect::new(x, cursor, width, bar_h);
        self.ops.push(DrawOp::Fill {
            rect: bar,
            color: PANEL,
        });
        self.stroke(bar);
        self.text_line(
            &table.heading,
            x + 12.0,
            cursor + CELL_PAD_Y,
            HEADING_SIZE * LINE_HEIGHT,
            HEADING_SIZE,
            true,
            TEXT,
        );
        cursor += bar_h;

        let widths: Vec<f32> = table.columns.iter().map(|c| c.share * width).collect();
        let labels: Vec<String> = table.columns.iter().map(|c| c.label.clone()).collect();
        cursor += self.row(x, cursor, &widths, &labels, HEADER_STYLE);

        match &table.body {
            TableBody::Rows(rows) => {
                for row in rows {
                    cursor += self.row(x, cursor, &widths, row, BODY_STYLE);
                }
            }
            TableBody::Empty(text) => {
                let style = CellStyle {
                    color: MUTED,
                    pad_y: EMPTY_ROW_PAD_Y,
                    ..BODY_STYLE
                };
                cursor += self.row(x, cursor, &[width], std::slice::from_ref(text), style);
            }
        }

        cursor - y
    }

    fn row(&mut self, x: f32, y: f32, widths: &[f32], cells: &[String], style: CellStyle) -> f32 {
        let wrapped: Vec<Vec<String>> = cells
            .iter()
            .zip(widths)
            .map(|(text, w)| self.wrap_cell(text, *w, style))
            .collect();
        let lines = wrapped.iter().map(Vec::len).max().unwrap_or(1);
        let h = lines as f32 * style.size * LINE_HEIGHT + 2.0 * style.pad_y;

        let mut cell_x = x;
        for (lines, w) in wrapped.iter().zip(widths) {
            self.cell(Rect::new(cell_x, y, *w, h), lines, style);
            cell_x += w;
        }
        h
    }

    fn wrap_cell(&self, text: &str, width: f32, style: CellStyle) -> Vec<String> {
        self.typeface
            .wrap(text, style.size, style.bold, width - 2.0 * CELL_PAD_X, 0.0)
    }

    /// Paints one cell; lines are vertically centered.
    fn cell(&mut self, rect: Rect, lines: &[String], style: CellStyle) {
        self.ops.push(DrawOp::Fill {
            rect,
            color: style.background,
        });
        self.stroke(rect);

        let line_h = style.size * LINE_HEIGHT;
        let block_h = lines.len() as f32 * line_h;
        let mut line_y = rect.y + (rect.h - block_h) / 2.0;
        for line in lines {
            if !line.is_empty() {
                let text_x = match style.align {
                    Align::Left => rect.x + CELL_PAD_X,
                    Align::Center => {
                        let w = self.typeface.measure(line, style.size, style.bold);
                        rect.x + (rect.w - w) / 2.0
                    }
                };
                self.ops.push(DrawOp::Text {
                    x: text_x,
                    baseline: line_y + (line_h - style.size) / 2.0 + style.size * ASCENT,
                    size: style.size,
                    bold: style.bold,
                    color: style.color,
                    letter_spacing: 0.0,
                    text: line.clone(),
                });
            }
            line_y += line_h;
        }
    }

    fn narrative(&mut self, narrative: &NarrativeBlock, x: f32, y: f32, width: f32) -> f32 {
        let mut cursor = y;

        let heading_h = SUBHEADING_SIZE * LINE_HEIGHT;
        self.text_line(&narrative.heading, x, cursor, heading_h, SUBHEADING_SIZE, true, TEXT);
        cursor += heading_h + 4.0;
        self.ops.push(DrawOp::Fill {
            rect: Rect::new(x, cursor, width, 2.0),
            color: TEXT,
        });
        cursor += 2.0 + 10.0;

        let indent = BODY_SIZE;
        let line_h = BODY_SIZE * NARRATIVE_LINE_HEIGHT;
        for paragraph in narrative.body.split('\n') {
            let lines = self.typeface.wrap(paragraph, BODY_SIZE, false, width, indent);
            for (i, line) in lines.iter().enumerate() {
                if !line.is_empty() {
                    let line_x = if i == 0 { x + indent } else { x };
                    self.ops.push(DrawOp::Text {
                        x: line_x,
                        baseline: cursor + (line_h - BODY_SIZE) / 2.0 + BODY_SIZE * ASCENT,
                        size: BODY_SIZE,
                        bold: false,
                        color: TEXT,
                        letter_spacing: 0.0,
                        text: line.clone(),
                    });
                }
                cursor += line_h;
            }
        }

        cursor - y
    }

    #[allow(clippy::too_many_arguments)]
    fn text_line(&mut self, text: &str, x: f32, y: f32, line_h: f32, size: f32, bold: bool, color: Rgb) {
        self.ops.push(DrawOp::Text {
            x,
            baseline: y + (line_h - size) / 2.0 + size * ASCENT,
            size,
            bold,
            color,
            letter_spacing: 0.0,
            text: text.to_string(),
        });
    }

    fn stroke(&mut self, rect: Rect) {
        self.ops.push(DrawOp::Stroke {
            rect,
            color: BORDER,
            width: BORDER_W,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::assembler::{assemble, CAREER_EMPTY, PERSONALITY_HEADING};
    use crate::compositor::inliner::InlineImage;
    use crate::models::portfolio::{About, Portfolio, Project};

    fn engine() -> LayoutEngine {
        LayoutEngine::new(Typeface::metrics_only(), PageGeometry::default())
    }

    #[test]
    fn test_page_height_matches_a4_ratio() {
        let h = PageGeometry::default().page_height_units(LAYOUT_WIDTH);
        assert!((h - 800.0 * 297.0 / 210.0).abs() < 1e-3);
    }

    #[test]
    fn test_sparse_resume_fills_exactly_one_page() {
        let scene = engine().layout(&assemble(&Portfolio::default(), InlineImage::Absent));
        assert_eq!(scene.height, engine().page_height());
        assert_eq!(scene.sheet_tops, vec![0.0]);
    }

    #[test]
    fn test_cover_letter_starts_on_second_page() {
        let mut portfolio = Portfolio::default();
        portfolio.about = About {
            personality: "x".to_string(),
            ..Default::default()
        };
        let engine = engine();
        let scene = engine.layout(&assemble(&portfolio, InlineImage::Absent));
        let page_h = engine.page_height();
        assert_eq!(scene.sheet_tops, vec![0.0, page_h]);
        assert!((scene.height - 2.0 * page_h).abs() < 1e-3);

        let cover_blocks: Vec<&PlacedBlock> = scene.blocks.iter().filter(|b| b.sheet == 1).collect();
        assert_eq!(cover_blocks.len(), 1);
        assert_eq!(cover_blocks[0].heading, PERSONALITY_HEADING);
        assert!(cover_blocks[0].top >= page_h);
    }

    #[test]
    fn test_blocks_are_stacked_in_document_order() {
        let scene = engine().layout(&assemble(&Portfolio::default(), InlineImage::Absent));
        for pair in scene.blocks.windows(2) {
            assert!(pair[0].bottom <= pair[1].top, "{pair:?}");
        }
        assert!(scene.texts().any(|t| t == CAREER_EMPTY));
    }

    #[test]
    fn test_overflowing_resume_rounds_up_to_whole_pages() {
        let mut portfolio = Portfolio::default();
        portfolio.projects = (0..60)
            .map(|i| Project {
                title: format!("프로젝트 {i}"),
                role: "개발".to_string(),
                ..Default::default()
            })
            .collect();
        let engine = engine();
        let scene = engine.layout(&assemble(&portfolio, InlineImage::Absent));
        let pages = scene.height / engine.page_height();
        assert!(pages >= 2.0);
        assert!((pages - pages.round()).abs() < 1e-3);
        let last = scene.blocks.last().unwrap();
        assert!(last.bottom <= scene.height);
    }

    #[test]
    fn test_photo_reference_becomes_image_element() {
        let photo = InlineImage::Fallback("https://cdn.example.com/me.jpg".to_string());
        let scene = engine().layout(&assemble(&Portfolio::default(), photo));
        let sources: Vec<&str> = scene.image_sources().collect();
        assert_eq!(sources, vec!["https://cdn.example.com/me.jpg"]);
        assert!(!scene.texts().any(|t| t == "사진"));
    }

    #[test]
    fn test_missing_photo_draws_placeholder_glyph() {
        let scene = engine().layout(&assemble(&Portfolio::default(), InlineImage::Absent));
        assert_eq!(scene.image_sources().count(), 0);
        assert!(scene.texts().any(|t| t == "사진"));
    }
}

//! Document tree handed from the assembler to the rasterizer.
//!
//! Pure presentation data: every string is already resolved, every
//! placeholder already substituted. The tree is consumed once.

use crate::compositor::inliner::InlineImage;

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentTree {
    pub sheets: Vec<Sheet>,
}

/// One page-aligned sheet. A sheet always starts on a fresh page.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub kind: SheetKind,
    pub title: String,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetKind {
    Resume,
    CoverLetter,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Identity(IdentityCard),
    Table(TableBlock),
    Narrative(NarrativeBlock),
}

impl Block {
    /// Heading shown above the block.
    pub fn heading(&self) -> &str {
        match self {
            Block::Identity(card) => &card.heading,
            Block::Table(table) => &table.heading,
            Block::Narrative(narrative) => &narrative.heading,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentityCard {
    pub heading: String,
    pub photo: InlineImage,
    /// Text drawn inside the photo frame when there is no photo at all.
    pub photo_placeholder: String,
    /// Label/value pairs in display order.
    pub fields: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableBlock {
    pub heading: String,
    pub columns: Vec<Column>,
    pub body: TableBody,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub label: String,
    /// Share of the table width, 0..=1. Shares of one table sum to 1.
    pub share: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableBody {
    Rows(Vec<Vec<String>>),
    /// A single centered row spanning every column.
    Empty(String),
}

impl TableBody {
    #[cfg(test)]
    pub fn row_count(&self) -> usize {
        match self {
            TableBody::Rows(rows) => rows.len(),
            TableBody::Empty(_) => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeBlock {
    pub heading: String,
    pub body: String,
}

impl DocumentTree {
    /// Headings of every block, sheet by sheet, in render order.
    pub fn outline(&self) -> Vec<String> {
        self.sheets
            .iter()
            .flat_map(|sheet| {
                std::iter::once(sheet.title.clone())
                    .chain(sheet.blocks.iter().map(|b| b.heading().to_string()))
            })
            .collect()
    }
}

//! Text measurement, line wrapping and font discovery for the resume layout.
//!
//! Advances come from the loaded face's `hmtx` table via ttf-parser and the
//! same bytes are used to paint glyph outlines. Characters the face does not
//! map fall back to a static em-width table, so a missing glyph never
//! collapses to zero width.
//!
//! The static table covers ASCII 0x20..=0x7E (index = char - 32). Hangul,
//! CJK and fullwidth forms measure 1em; anything else falls back to
//! `average_char_width`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use ttf_parser::{Face, GlyphId};

/// Faux-bold widening applied to bold runs in both measurement modes.
pub const BOLD_WIDTH_FACTOR: f32 = 1.04;

/// A face must map this syllable to be picked up from the system.
pub const HANGUL_SAMPLE: char = '가';

/// Hangul-capable sans faces, most preferred first. Matched by file name
/// anywhere below the system font directories.
pub const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "NotoSansKR-Regular.otf",
    "NotoSansKR-Regular.ttf",
    "NotoSansCJKkr-Regular.otf",
    "NotoSansCJK-Regular.ttc",
    "SourceHanSansKR-Regular.otf",
    "NanumGothic.ttf",
    "NanumBarunGothic.ttf",
    "AppleSDGothicNeo.ttc",
    "AppleGothic.ttf",
    "malgun.ttf",
    "gulim.ttc",
    "UnDotum.ttf",
];

const MAX_FONT_DIR_DEPTH: usize = 4;

#[derive(Debug, Error)]
pub enum FontError {
    #[error("failed to read font file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("font data could not be parsed: {0}")]
    Parse(#[from] ttf_parser::FaceParsingError),
}

// ────────────────────────────────────────────────────────────────────────────
// Static width table
// ────────────────────────────────────────────────────────────────────────────

/// Static character-width table, widths in em units.
pub struct FontMetricTable {
    widths: [f32; 95],
    pub average_char_width: f32,
    pub wide_char_width: f32,
}

impl FontMetricTable {
    pub fn char_width(&self, c: char) -> f32 {
        let code = c as usize;
        if (32..=126).contains(&code) {
            self.widths[code - 32]
        } else if is_wide(c) {
            self.wide_char_width
        } else {
            self.average_char_width
        }
    }

    pub fn measure_str(&self, s: &str) -> f32 {
        s.chars().map(|c| self.char_width(c)).sum()
    }
}

/// Hangul syllables/jamo, CJK ideographs and fullwidth forms.
fn is_wide(c: char) -> bool {
    matches!(c as u32,
        0x1100..=0x11FF
        | 0x3000..=0x303F
        | 0x3130..=0x318F
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFF00..=0xFF60)
}

/// Sans-serif widths approximating the UI fonts of the resume template.
static SANS_TABLE: FontMetricTable = FontMetricTable {
    #[rustfmt::skip]
    widths: [
        // sp    !     "     #     $     %     &     '     (     )     *     +     ,     -     .     /
        0.28, 0.30, 0.38, 0.58, 0.56, 0.89, 0.67, 0.22, 0.33, 0.33, 0.39, 0.59, 0.28, 0.33, 0.28, 0.31,
        // 0     1     2     3     4     5     6     7     8     9
        0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56,
        // :     ;     <     =     >     ?     @
        0.28, 0.28, 0.59, 0.59, 0.59, 0.50, 1.02,
        // A     B     C     D     E     F     G     H     I     J     K     L     M
        0.67, 0.61, 0.64, 0.69, 0.56, 0.52, 0.70, 0.69, 0.26, 0.40, 0.61, 0.53, 0.82,
        // N     O     P     Q     R     S     T     U     V     W     X     Y     Z
        0.69, 0.74, 0.58, 0.74, 0.62, 0.56, 0.56, 0.68, 0.66, 0.92, 0.62, 0.60, 0.58,
        // [     \     ]     ^     _     `
        0.28, 0.31, 0.28, 0.47, 0.50, 0.34,
        // a     b     c     d     e     f     g     h     i     j     k     l     m
        0.54, 0.58, 0.50, 0.58, 0.55, 0.32, 0.58, 0.57, 0.24, 0.24, 0.52, 0.24, 0.86,
        // n     o     p     q     r     s     t     u     v     w     x     y     z
        0.57, 0.57, 0.58, 0.58, 0.36, 0.46, 0.36, 0.57, 0.50, 0.76, 0.49, 0.50, 0.46,
        // {     |     }     ~
        0.33, 0.26, 0.33, 0.59,
    ],
    average_char_width: 0.56,
    wide_char_width: 1.0,
};

// ────────────────────────────────────────────────────────────────────────────
// Typeface
// ────────────────────────────────────────────────────────────────────────────

/// Font used by layout and painting. Cheap to clone.
#[derive(Clone)]
pub struct Typeface {
    outline: Option<Arc<Vec<u8>>>,
    /// Face index inside a `.ttc` collection.
    index: u32,
}

impl std::fmt::Debug for Typeface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Typeface")
            .field("outline_bytes", &self.outline.as_ref().map(|d| d.len()))
            .field("index", &self.index)
            .finish()
    }
}

impl Typeface {
    /// Static-table metrics, no glyph painting.
    #[cfg(test)]
    pub fn metrics_only() -> Self {
        Self {
            outline: None,
            index: 0,
        }
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self, FontError> {
        Self::from_collection(data, 0)
    }

    fn from_collection(data: Vec<u8>, index: u32) -> Result<Self, FontError> {
        Face::parse(&data, index)?;
        Ok(Self {
            outline: Some(Arc::new(data)),
            index,
        })
    }

    pub fn load(path: &Path) -> Result<Self, FontError> {
        let data = std::fs::read(path).map_err(|source| FontError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_bytes(data)
    }

    /// First Hangul-capable system face from [`SYSTEM_FONT_CANDIDATES`].
    pub fn resolve_system() -> Option<(Self, PathBuf)> {
        find_font(&system_font_dirs(), SYSTEM_FONT_CANDIDATES, HANGUL_SAMPLE)
    }

    pub fn face(&self) -> Option<Face<'_>> {
        let data = self.outline.as_deref()?;
        Face::parse(data, self.index).ok()
    }

    pub fn covers(&self, c: char) -> bool {
        self.face().is_some_and(|face| face.glyph_index(c).is_some())
    }

    /// Width of `text` in layout units at `size`.
    pub fn measure(&self, text: &str, size: f32, bold: bool) -> f32 {
        let em = match self.face() {
            Some(face) => {
                let upem = face.units_per_em().max(1) as f32;
                text.chars()
                    .map(|c| {
                        face.glyph_index(c)
                            .and_then(|gid| face.glyph_hor_advance(gid))
                            .map(|adv| adv as f32 / upem)
                            .unwrap_or_else(|| SANS_TABLE.char_width(c))
                    })
                    .sum()
            }
            None => SANS_TABLE.measure_str(text),
        };
        let width = em * size;
        if bold {
            width * BOLD_WIDTH_FACTOR
        } else {
            width
        }
    }

    /// Advance of one glyph in em, used by the painter to place outlines.
    pub fn glyph_advance_em(face: &Face<'_>, c: char) -> (Option<GlyphId>, f32) {
        let upem = face.units_per_em().max(1) as f32;
        match face.glyph_index(c) {
            Some(gid) => {
                let adv = face
                    .glyph_hor_advance(gid)
                    .map(|a| a as f32 / upem)
                    .unwrap_or_else(|| SANS_TABLE.char_width(c));
                (Some(gid), adv)
            }
            None => (None, SANS_TABLE.char_width(c)),
        }
    }

    /// Greedy word wrap at `max_width`.
    ///
    /// Explicit newlines start a new paragraph; the first line of each
    /// paragraph is narrowed by `first_line_indent`. Words wider than a whole
    /// line are broken between characters. Always returns at least one line.
    pub fn wrap(
        &self,
        text: &str,
        size: f32,
        bold: bool,
        max_width: f32,
        first_line_indent: f32,
    ) -> Vec<String> {
        let mut lines = Vec::new();
        let space_w = self.measure(" ", size, bold);

        for paragraph in text.split('\n') {
            let mut current = String::new();
            let mut current_width = 0.0_f32;
            let mut limit = (max_width - first_line_indent).max(size);

            for word in paragraph.split_whitespace() {
                let word_w = self.measure(word, size, bold);
                let needed = if current.is_empty() {
                    word_w
                } else {
                    current_width + space_w + word_w
                };

                if needed <= limit {
                    if !current.is_empty() {
                        current.push(' ');
                        current_width += space_w;
                    }
                    current.push_str(word);
                    current_width += word_w;
                    continue;
                }

                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                    current_width = 0.0;
                    limit = max_width.max(size);
                }

                if word_w <= limit {
                    current.push_str(word);
                    current_width = word_w;
                    continue;
                }

                for c in word.chars() {
                    let mut buf = [0u8; 4];
                    let c_w = self.measure(c.encode_utf8(&mut buf), size, bold);
                    if !current.is_empty() && current_width + c_w > limit {
                        lines.push(std::mem::take(&mut current));
                        current_width = 0.0;
                        limit = max_width.max(size);
                    }
                    current.push(c);
                    current_width += c_w;
                }
            }

            lines.push(current);
        }

        if lines.is_empty() {
            lines.push(String::new());
        }
        lines
    }
}

// ────────────────────────────────────────────────────────────────────────────
// System font discovery
// ────────────────────────────────────────────────────────────────────────────

/// Searches `dirs` for the first of `names` holding a face that maps
/// `required`. Every face of a collection is considered.
fn find_font(dirs: &[PathBuf], names: &[&str], required: char) -> Option<(Typeface, PathBuf)> {
    let mut files = HashMap::new();
    for dir in dirs {
        index_font_files(dir, 0, &mut files);
    }

    for name in names {
        let Some(path) = files.get(&name.to_ascii_lowercase()) else {
            continue;
        };
        let Ok(data) = std::fs::read(path) else {
            continue;
        };
        let faces = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
        let index = (0..faces).find(|&i| {
            Face::parse(&data, i).is_ok_and(|face| face.glyph_index(required).is_some())
        });
        match index {
            Some(index) => {
                if let Ok(typeface) = Typeface::from_collection(data, index) {
                    return Some((typeface, path.clone()));
                }
            }
            None => debug!("{} does not cover {required:?}, skipping", path.display()),
        }
    }
    None
}

/// Lower-cased file name to path; the first file seen for a name wins.
fn index_font_files(dir: &Path, depth: usize, found: &mut HashMap<String, PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if depth < MAX_FONT_DIR_DEPTH {
                index_font_files(&path, depth + 1, found);
            }
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            found.entry(name.to_ascii_lowercase()).or_insert(path);
        }
    }
}

fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    #[cfg(target_os = "windows")]
    {
        dirs.push(PathBuf::from(r"C:\Windows\Fonts"));
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(&home).join(".fonts"));
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    dirs
}

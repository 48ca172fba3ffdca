//! # Font Management
//!
//! Loading and measuring the TrueType/OpenType fonts a document refers to.
//!
//! Labels name their font by file path. Each file is read and parsed once
//! per document with ttf-parser; the parsed metrics drive both the placement
//! engine (through [`TextMetrics`]) and the PDF writer, so what gets measured
//! is exactly what gets drawn.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{LabelpressError, Result};
use crate::layout::TextMetrics;
use crate::text::TextLayout;

/// Parsed metrics from a TrueType/OpenType font via ttf-parser.
#[derive(Debug, Clone)]
pub struct FontMetrics {
    pub units_per_em: u16,
    pub ascender: i16,
    pub descender: i16,
    /// The font's own recommended gap between lines (hhea line gap).
    pub line_gap: i16,
    pub advance_widths: HashMap<char, u16>,
    /// Maps characters to their glyph IDs in the font.
    pub glyph_ids: HashMap<char, u16>,
    pub default_advance: u16,
    /// x_min, y_min, x_max, y_max in font units.
    pub bbox: [i16; 4],
    pub cap_height: i16,
    pub italic_angle: f32,
}

impl FontMetrics {
    /// Parse metrics from font data using ttf-parser.
    pub fn from_font_data(data: &[u8]) -> Option<Self> {
        let face = ttf_parser::Face::parse(data, 0).ok()?;
        let units_per_em = face.units_per_em();
        let ascender = face.ascender();

        let mut advance_widths = HashMap::new();
        let mut glyph_ids = HashMap::new();
        let mut default_advance = 0u16;

        // Walk the BMP to build width and glyph ID maps
        for code in 32u32..=0xFFFF {
            if let Some(ch) = char::from_u32(code) {
                if let Some(glyph_id) = face.glyph_index(ch) {
                    let advance = face.glyph_hor_advance(glyph_id).unwrap_or(0);
                    advance_widths.insert(ch, advance);
                    glyph_ids.insert(ch, glyph_id.0);
                    if ch == ' ' {
                        default_advance = advance;
                    }
                }
            }
        }

        if default_advance == 0 {
            default_advance = units_per_em / 2;
        }

        let bbox = face.global_bounding_box();
        Some(FontMetrics {
            units_per_em,
            ascender,
            descender: face.descender(),
            line_gap: face.line_gap(),
            advance_widths,
            glyph_ids,
            default_advance,
            bbox: [bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max],
            cap_height: face.capital_height().unwrap_or(ascender),
            italic_angle: face.italic_angle(),
        })
    }

    fn scale(&self, units: f64, font_size: f64) -> f64 {
        units / self.units_per_em as f64 * font_size
    }

    /// Get the advance width of a character in points.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        let w = self
            .advance_widths
            .get(&ch)
            .copied()
            .unwrap_or(self.default_advance);
        self.scale(w as f64, font_size)
    }

    /// Width of a single line of text in points.
    pub fn measure_string(&self, text: &str, font_size: f64) -> f64 {
        text.chars().map(|ch| self.char_width(ch, font_size)).sum()
    }

    /// Distance from the top of a line to its baseline.
    pub fn ascent(&self, font_size: f64) -> f64 {
        self.scale(self.ascender as f64, font_size)
    }

    /// Height of one line, the font's own line gap included.
    pub fn line_height(&self, font_size: f64) -> f64 {
        let units = self.ascender as f64 - self.descender as f64 + self.line_gap as f64;
        self.scale(units, font_size)
    }

    /// Glyph ID for `ch`, 0 (.notdef) when the font lacks it.
    pub fn glyph_id(&self, ch: char) -> u16 {
        self.glyph_ids.get(&ch).copied().unwrap_or(0)
    }
}

/// A font file loaded for the current document.
#[derive(Debug, Clone)]
pub struct LoadedFont {
    /// PDF base font name derived from the file name.
    pub name: String,
    pub data: Vec<u8>,
    pub metrics: FontMetrics,
}

/// The fonts of one document, keyed by the path the labels use.
///
/// Also the text-metrics oracle for the placement engine.
pub struct FontContext {
    base_dir: PathBuf,
    fonts: BTreeMap<String, LoadedFont>,
    text_layout: TextLayout,
}

impl FontContext {
    /// Fonts are looked up relative to `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            fonts: BTreeMap::new(),
            text_layout: TextLayout::new(),
        }
    }

    /// Read and parse the font file `font`, unless it is already loaded.
    pub fn load(&mut self, font: &str) -> Result<&LoadedFont> {
        if !self.fonts.contains_key(font) {
            let path = self.base_dir.join(font);
            let data = fs::read(&path).map_err(|e| {
                LabelpressError::Font(format!("Cannot read {}: {}", path.display(), e))
            })?;
            self.register(font, data)?;
        }
        self.get(font)
    }

    /// Register font data under `font` without touching the file system.
    pub fn register(&mut self, font: &str, data: Vec<u8>) -> Result<()> {
        let metrics = FontMetrics::from_font_data(&data).ok_or_else(|| {
            LabelpressError::Font(format!("Not a TrueType/OpenType font: {}", font))
        })?;
        log::debug!(
            "Loaded font {} ({} glyphs mapped)",
            font,
            metrics.glyph_ids.len()
        );
        self.fonts.insert(
            font.to_string(),
            LoadedFont {
                name: pdf_font_name(font),
                data,
                metrics,
            },
        );
        Ok(())
    }

    /// Look up a loaded font.
    pub fn get(&self, font: &str) -> Result<&LoadedFont> {
        self.fonts
            .get(font)
            .ok_or_else(|| LabelpressError::Font(format!("Font not loaded: {}", font)))
    }

    pub fn text_layout(&self) -> &TextLayout {
        &self.text_layout
    }
}

impl TextMetrics for FontContext {
    fn width_of(&self, font: &str, font_size: f64, text: &str, _line_gap: f64) -> Result<f64> {
        let metrics = &self.get(font)?.metrics;
        Ok(self.text_layout.measure_width(metrics, text, font_size))
    }

    fn height_of(
        &self,
        font: &str,
        font_size: f64,
        text: &str,
        width: f64,
        line_gap: f64,
    ) -> Result<f64> {
        let metrics = &self.get(font)?.metrics;
        let lines = self
            .text_layout
            .break_into_lines(metrics, text, font_size, width)
            .len();
        Ok(lines as f64 * (metrics.line_height(font_size) + line_gap))
    }
}

/// A PDF name for a font file: its stem with anything but alphanumerics,
/// `-` and `_` stripped.
fn pdf_font_name(font: &str) -> String {
    let stem = Path::new(font)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name: String = stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if name.is_empty() {
        "CustomFont".to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_font_data() {
        let mut ctx = FontContext::new(".");
        let err = ctx.register("fake.ttf", b"definitely not a font".to_vec());
        assert!(matches!(err, Err(LabelpressError::Font(_))));
    }

    #[test]
    fn test_missing_font_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = FontContext::new(dir.path());
        let err = ctx.load("nowhere.ttf").unwrap_err();
        assert!(err.to_string().starts_with("Font error: Cannot read"));
    }

    #[test]
    fn test_unloaded_font_is_an_error_not_a_panic() {
        let ctx = FontContext::new(".");
        assert!(ctx.width_of("ghost.ttf", 12.0, "boo", 0.0).is_err());
        assert!(ctx.height_of("ghost.ttf", 12.0, "boo", 10.0, 0.0).is_err());
    }

    #[test]
    fn test_pdf_font_name() {
        assert_eq!(pdf_font_name("fonts/Open Sans-Bold.ttf"), "OpenSans-Bold");
        assert_eq!(pdf_font_name("../???.otf"), "CustomFont");
    }

    #[test]
    fn test_line_height_includes_font_gap() {
        let metrics = FontMetrics {
            units_per_em: 2048,
            ascender: 1638,
            descender: -410,
            line_gap: 67,
            advance_widths: HashMap::new(),
            glyph_ids: HashMap::new(),
            default_advance: 1024,
            bbox: [0, -410, 2048, 1638],
            cap_height: 1400,
            italic_angle: 0.0,
        };
        let expected = (1638.0 + 410.0 + 67.0) / 2048.0 * 10.0;
        assert!((metrics.line_height(10.0) - expected).abs() < 1e-9);
        assert!((metrics.char_width('x', 20.48) - 10.24).abs() < 1e-9);
        assert_eq!(metrics.glyph_id('x'), 0);
    }
}

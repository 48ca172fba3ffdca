//! # PDF Serializer
//!
//! Takes the draw commands from the placement engine and writes a one-page
//! PDF file.
//!
//! This is a from-scratch PDF 1.7 writer. Fonts are embedded whole as
//! CIDFontType2 with Identity-H encoding, so text is written as hex glyph
//! IDs and every font carries a /W array and a ToUnicode CMap for copy and
//! paste.
//!
//! ## PDF Structure (simplified)
//!
//! ```text
//! %PDF-1.7            <- header
//! 1 0 obj ... endobj  <- catalog
//! 2 0 obj ... endobj  <- page tree
//! ...                 <- fonts, content stream, page, info
//! xref                <- cross-reference table (byte offsets of each object)
//! trailer             <- points to the root object
//! %%EOF
//! ```
//!
//! Output is deterministic: fonts are emitted in name order and no dates or
//! random IDs are written.

use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite; // for write! on String
use std::io::Write as IoWrite; // for write! on Vec<u8>

use miniz_oxide::deflate::compress_to_vec_zlib;

use crate::error::Result;
use crate::font::{FontContext, FontMetrics, LoadedFont};
use crate::layout::DrawCommand;
use crate::model::Page;
use crate::text::TextLayout;

pub struct PdfWriter;

/// Tracks allocated PDF objects during writing. Index 0 is the unused free
/// entry; object IDs are vector indices.
struct PdfBuilder {
    objects: Vec<Vec<u8>>,
}

impl PdfBuilder {
    fn new() -> Self {
        // 0 = placeholder, 1 = Catalog, 2 = Pages
        Self {
            objects: vec![Vec::new(), Vec::new(), Vec::new()],
        }
    }

    fn push(&mut self, data: Vec<u8>) -> usize {
        self.objects.push(data);
        self.objects.len() - 1
    }

    fn push_stream(&mut self, extra_dict: &str, raw: &[u8]) -> usize {
        let compressed = compress_to_vec_zlib(raw, 6);
        let mut data: Vec<u8> = Vec::new();
        let _ = write!(
            data,
            "<< /Length {}{} /Filter /FlateDecode >>\nstream\n",
            compressed.len(),
            extra_dict
        );
        data.extend_from_slice(&compressed);
        data.extend_from_slice(b"\nendstream");
        self.push(data)
    }
}

/// A font as used on the page: its resource name and the characters drawn
/// with it.
struct UsedFont<'a> {
    resource: String,
    loaded: &'a LoadedFont,
    chars: BTreeMap<char, u16>,
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfWriter {
    pub fn new() -> Self {
        Self
    }

    /// Write one page with the given draw commands to a PDF byte vector.
    ///
    /// Every font named by a command must already be loaded in `fonts`.
    pub fn write(&self, page: &Page, commands: &[DrawCommand], fonts: &FontContext) -> Result<Vec<u8>> {
        let mut builder = PdfBuilder::new();

        let used = self.collect_fonts(commands, fonts)?;
        let mut font_refs = Vec::with_capacity(used.len());
        for font in used.values() {
            let id = Self::write_font_objects(&mut builder, font);
            font_refs.push(format!("/{} {} 0 R", font.resource, id));
        }

        let content = self.build_content_stream(page, commands, &used, fonts.text_layout());
        let content_id = builder.push_stream("", content.as_bytes());

        let page_dict = format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
             /Contents {} 0 R /Resources << /Font << {} >> >> >>",
            page.width,
            page.height,
            content_id,
            font_refs.join(" ")
        );
        let page_id = builder.push(page_dict.into_bytes());

        builder.objects[1] = b"<< /Type /Catalog /Pages 2 0 R >>".to_vec();
        builder.objects[2] =
            format!("<< /Type /Pages /Kids [{} 0 R] /Count 1 >>", page_id).into_bytes();

        let info_id = builder.push(b"<< /Producer (labelpress) /Creator (labelpress) >>".to_vec());

        Ok(self.serialize(&builder, info_id))
    }

    /// Every font drawn with, keyed by font path, with the characters it
    /// has to cover.
    fn collect_fonts<'a>(
        &self,
        commands: &[DrawCommand],
        fonts: &'a FontContext,
    ) -> Result<BTreeMap<String, UsedFont<'a>>> {
        let mut used: BTreeMap<String, UsedFont<'a>> = BTreeMap::new();
        for command in commands {
            let loaded = fonts.get(&command.font)?;
            let entry = used
                .entry(command.font.clone())
                .or_insert_with(|| UsedFont {
                    resource: String::new(),
                    loaded,
                    chars: BTreeMap::new(),
                });
            for ch in command.text.chars() {
                entry.chars.insert(ch, loaded.metrics.glyph_id(ch));
            }
        }
        for (i, font) in used.values_mut().enumerate() {
            font.resource = format!("F{}", i);
        }
        Ok(used)
    }

    /// Write the 5 objects of an embedded TrueType font. Returns the object
    /// ID of the Type0 root font dictionary.
    fn write_font_objects(builder: &mut PdfBuilder, font: &UsedFont<'_>) -> usize {
        let metrics = &font.loaded.metrics;
        let name = &font.loaded.name;
        let scale = 1000.0 / metrics.units_per_em as f64;

        // 1. FontFile2 stream with the whole font program
        let fontfile2_id = builder.push_stream(
            &format!(" /Length1 {}", font.loaded.data.len()),
            &font.loaded.data,
        );

        // 2. FontDescriptor
        let [x_min, y_min, x_max, y_max] = metrics.bbox;
        let descriptor = format!(
            "<< /Type /FontDescriptor /FontName /{} /Flags 4 \
             /FontBBox [{} {} {} {}] /ItalicAngle {} \
             /Ascent {} /Descent {} /CapHeight {} /StemV 80 \
             /FontFile2 {} 0 R >>",
            name,
            (x_min as f64 * scale) as i32,
            (y_min as f64 * scale) as i32,
            (x_max as f64 * scale) as i32,
            (y_max as f64 * scale) as i32,
            metrics.italic_angle,
            (metrics.ascender as f64 * scale) as i32,
            (metrics.descender as f64 * scale) as i32,
            (metrics.cap_height as f64 * scale) as i32,
            fontfile2_id,
        );
        let descriptor_id = builder.push(descriptor.into_bytes());

        // 3. CIDFont dictionary (DescendantFont)
        let cidfont = format!(
            "<< /Type /Font /Subtype /CIDFontType2 /BaseFont /{} \
             /CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> \
             /FontDescriptor {} 0 R /DW {} /W {} \
             /CIDToGIDMap /Identity >>",
            name,
            descriptor_id,
            (metrics.default_advance as f64 * scale) as u32,
            Self::build_w_array(&font.chars, metrics),
        );
        let cidfont_id = builder.push(cidfont.into_bytes());

        // 4. ToUnicode CMap
        let cmap = Self::build_tounicode_cmap(&font.chars, name);
        let tounicode_id = builder.push_stream("", cmap.as_bytes());

        // 5. Type0 font dictionary, referenced by /Resources
        let type0 = format!(
            "<< /Type /Font /Subtype /Type0 /BaseFont /{} \
             /Encoding /Identity-H \
             /DescendantFonts [{} 0 R] \
             /ToUnicode {} 0 R >>",
            name, cidfont_id, tounicode_id,
        );
        builder.push(type0.into_bytes())
    }

    /// Build the /W array for the glyphs in use: `[gid [width] ...]`.
    fn build_w_array(chars: &BTreeMap<char, u16>, metrics: &FontMetrics) -> String {
        let scale = 1000.0 / metrics.units_per_em as f64;
        let widths: BTreeMap<u16, u32> = chars
            .iter()
            .filter(|&(_, &gid)| gid != 0)
            .map(|(&ch, &gid)| {
                let advance = metrics
                    .advance_widths
                    .get(&ch)
                    .copied()
                    .unwrap_or(metrics.default_advance);
                (gid, (advance as f64 * scale) as u32)
            })
            .collect();

        let mut result = String::from("[");
        for (gid, width) in &widths {
            let _ = write!(result, " {} [{}]", gid, width);
        }
        result.push_str(" ]");
        result
    }

    /// Build a ToUnicode CMap mapping glyph IDs back to characters.
    fn build_tounicode_cmap(chars: &BTreeMap<char, u16>, font_name: &str) -> String {
        // First character wins when several share a glyph.
        let mut gid_to_char: BTreeMap<u16, char> = BTreeMap::new();
        for (&ch, &gid) in chars {
            if gid != 0 {
                gid_to_char.entry(gid).or_insert(ch);
            }
        }
        let entries: Vec<(u16, char)> = gid_to_char.into_iter().collect();

        let mut cmap = String::new();
        cmap.push_str("/CIDInit /ProcSet findresource begin\n");
        cmap.push_str("12 dict begin\n");
        cmap.push_str("begincmap\n");
        cmap.push_str("/CIDSystemInfo\n");
        cmap.push_str("<< /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
        let _ = writeln!(cmap, "/CMapName /{}-UTF16 def", font_name);
        cmap.push_str("/CMapType 2 def\n");
        cmap.push_str("1 begincodespacerange\n");
        cmap.push_str("<0000> <FFFF>\n");
        cmap.push_str("endcodespacerange\n");

        // At most 100 entries per bfchar block
        for chunk in entries.chunks(100) {
            let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
            for &(gid, ch) in chunk {
                let _ = writeln!(cmap, "<{:04X}> <{}>", gid, utf16_hex(ch));
            }
            cmap.push_str("endbfchar\n");
        }

        cmap.push_str("endcmap\n");
        cmap.push_str("CMapName currentdict /CMap defineresource pop\n");
        cmap.push_str("end\n");
        cmap.push_str("end\n");
        cmap
    }

    /// Build the page content stream. Coordinates flip here from the
    /// top-left origin of the placement engine to PDF's bottom-left.
    fn build_content_stream(
        &self,
        page: &Page,
        commands: &[DrawCommand],
        used: &BTreeMap<String, UsedFont<'_>>,
        text_layout: &TextLayout,
    ) -> String {
        let mut stream = String::new();
        for command in commands {
            if let Some(font) = used.get(&command.font) {
                write_text(
                    &mut stream,
                    command,
                    &font.resource,
                    &font.loaded.metrics,
                    text_layout,
                    page.height,
                );
            }
        }
        stream
    }

    /// Serialize all objects into the final PDF byte stream.
    fn serialize(&self, builder: &PdfBuilder, info_id: usize) -> Vec<u8> {
        let mut output: Vec<u8> = Vec::new();
        let mut offsets: Vec<usize> = vec![0; builder.objects.len()];

        output.extend_from_slice(b"%PDF-1.7\n");
        output.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");

        for (i, data) in builder.objects.iter().enumerate().skip(1) {
            offsets[i] = output.len();
            let _ = write!(output, "{} 0 obj\n", i);
            output.extend_from_slice(data);
            output.extend_from_slice(b"\nendobj\n\n");
        }

        let xref_offset = output.len();
        let _ = write!(output, "xref\n0 {}\n", builder.objects.len());
        let _ = write!(output, "0000000000 65535 f \n");
        for offset in offsets.iter().skip(1) {
            let _ = write!(output, "{:010} 00000 n \n", offset);
        }

        let _ = write!(
            output,
            "trailer\n<< /Size {} /Root 1 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            builder.objects.len(),
            info_id,
            xref_offset
        );

        output
    }
}

/// Write one draw command as a text object. The text is re-wrapped at the
/// command's box width and each line aligned inside the box.
fn write_text(
    stream: &mut String,
    command: &DrawCommand,
    resource: &str,
    metrics: &FontMetrics,
    text_layout: &TextLayout,
    page_height: f64,
) {
    let lines = text_layout.break_into_lines(metrics, &command.text, command.font_size, command.rect.width);
    if lines.is_empty() {
        return;
    }

    let ascent = metrics.ascent(command.font_size);
    let advance = metrics.line_height(command.font_size) + command.line_gap;

    let _ = write!(stream, "BT\n/{} {:.2} Tf\n", resource, command.font_size);
    for (i, line) in lines.iter().enumerate() {
        if line.text.is_empty() {
            continue;
        }
        let x = command.rect.x + command.align.offset(command.rect.width - line.width);
        let baseline = command.rect.y + ascent + i as f64 * advance;
        let hex: String = line
            .text
            .chars()
            .map(|ch| format!("{:04X}", metrics.glyph_id(ch)))
            .collect();
        let _ = write!(
            stream,
            "1 0 0 1 {:.2} {:.2} Tm\n<{}> Tj\n",
            x,
            page_height - baseline,
            hex
        );
    }
    stream.push_str("ET\n");
}

/// UTF-16BE hex of a character, surrogate pair included.
fn utf16_hex(ch: char) -> String {
    let mut buf = [0u16; 2];
    ch.encode_utf16(&mut buf)
        .iter()
        .map(|unit| format!("{:04X}", unit))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Rect;
    use crate::model::HAlign;
    use std::collections::HashMap;

    fn synthetic_metrics() -> FontMetrics {
        let mut advance_widths = HashMap::new();
        let mut glyph_ids = HashMap::new();
        for (i, ch) in ['A', 'B', ' '].into_iter().enumerate() {
            advance_widths.insert(ch, 500);
            glyph_ids.insert(ch, 36 + i as u16);
        }
        FontMetrics {
            units_per_em: 1000,
            ascender: 800,
            descender: -200,
            line_gap: 0,
            advance_widths,
            glyph_ids,
            default_advance: 500,
            bbox: [0, -200, 1000, 800],
            cap_height: 700,
            italic_angle: 0.0,
        }
    }

    fn command(text: &str, align: HAlign, width: f64) -> DrawCommand {
        DrawCommand {
            font: "F.ttf".to_string(),
            font_size: 10.0,
            text: text.to_string(),
            rect: Rect {
                x: 20.0,
                y: 30.0,
                width,
                height: 10.0,
            },
            align,
            line_gap: 2.0,
        }
    }

    #[test]
    fn test_empty_page_produces_valid_pdf() {
        let writer = PdfWriter::new();
        let fonts = FontContext::new(".");
        let page = Page::from_millimetres(210.0, 297.0);
        let bytes = writer.write(&page, &[], &fonts).unwrap();
        let text = String::from_utf8_lossy(&bytes);

        assert!(bytes.starts_with(b"%PDF-1.7"));
        assert!(text.contains("/MediaBox [0 0 595.28 841.89]"));
        assert!(text.contains("/Count 1"));
        assert!(text.contains("xref"));
        assert!(text.contains("trailer"));
        assert!(text.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let writer = PdfWriter::new();
        let fonts = FontContext::new(".");
        let page = Page::from_millimetres(100.0, 50.0);
        assert_eq!(
            writer.write(&page, &[], &fonts).unwrap(),
            writer.write(&page, &[], &fonts).unwrap()
        );
    }

    #[test]
    fn test_unloaded_font_is_an_error() {
        let writer = PdfWriter::new();
        let fonts = FontContext::new(".");
        let page = Page::from_points(100.0, 100.0);
        let cmd = command("AB", HAlign::Left, 10.0);
        assert!(writer.write(&page, &[cmd], &fonts).is_err());
    }

    #[test]
    fn test_text_is_flipped_and_hex_encoded() {
        let mut stream = String::new();
        let cmd = command("AB", HAlign::Left, 10.0);
        write_text(&mut stream, &cmd, "F0", &synthetic_metrics(), &TextLayout::new(), 100.0);

        // Baseline 30 + 8 from the top, so 62 from the bottom.
        assert!(stream.contains("/F0 10.00 Tf"));
        assert!(stream.contains("1 0 0 1 20.00 62.00 Tm\n<00240025> Tj"));
        assert!(stream.ends_with("ET\n"));
    }

    #[test]
    fn test_wrapped_lines_step_by_line_height_and_gap() {
        let mut stream = String::new();
        // 5pt box: one glyph per line.
        let cmd = command("AB", HAlign::Left, 5.0);
        write_text(&mut stream, &cmd, "F0", &synthetic_metrics(), &TextLayout::new(), 100.0);
        assert!(stream.contains("1 0 0 1 20.00 62.00 Tm\n<0024> Tj"));
        // Next baseline is 10 (line) + 2 (gap) lower.
        assert!(stream.contains("1 0 0 1 20.00 50.00 Tm\n<0025> Tj"));
    }

    #[test]
    fn test_lines_align_inside_box() {
        let mut stream = String::new();
        let cmd = command("A", HAlign::Right, 20.0);
        write_text(&mut stream, &cmd, "F0", &synthetic_metrics(), &TextLayout::new(), 100.0);
        assert!(stream.contains("1 0 0 1 35.00 62.00 Tm"));

        let mut stream = String::new();
        let cmd = command("A", HAlign::Center, 20.0);
        write_text(&mut stream, &cmd, "F0", &synthetic_metrics(), &TextLayout::new(), 100.0);
        assert!(stream.contains("1 0 0 1 27.50 62.00 Tm"));
    }

    #[test]
    fn test_empty_text_writes_nothing() {
        let mut stream = String::new();
        let cmd = command("", HAlign::Left, 0.0);
        write_text(&mut stream, &cmd, "F0", &synthetic_metrics(), &TextLayout::new(), 100.0);
        assert!(stream.is_empty());
    }

    #[test]
    fn test_w_array_skips_notdef() {
        let mut chars = BTreeMap::new();
        chars.insert('A', 36u16);
        chars.insert('?', 0u16);
        let w = PdfWriter::build_w_array(&chars, &synthetic_metrics());
        assert_eq!(w, "[ 36 [500] ]");
    }

    #[test]
    fn test_tounicode_cmap_format() {
        let mut chars = BTreeMap::new();
        chars.insert('A', 36u16);
        chars.insert('B', 37u16);
        chars.insert('😀', 90u16);

        let cmap = PdfWriter::build_tounicode_cmap(&chars, "TestFont");
        assert!(cmap.contains("/CMapName /TestFont-UTF16 def"));
        assert!(cmap.contains("3 beginbfchar"));
        assert!(cmap.contains("<0024> <0041>"));
        assert!(cmap.contains("<0025> <0042>"));
        assert!(cmap.contains("<005A> <D83DDE00>"));
        assert!(cmap.contains("<0000> <FFFF>"));
    }
}

//! # Text Layout
//!
//! Line breaking and width measurement for a single label.
//!
//! Uses real font metrics from [`FontMetrics`] for character widths and
//! UAX #14 break opportunities for where lines may end.

use unicode_linebreak::{linebreaks, BreakOpportunity};

use crate::font::FontMetrics;

/// Slack allowed when comparing a line against its wrap width. Labels are
/// often wrapped at exactly their own measured width, and summing advances
/// in a different order must not push the last glyph onto a new line.
const WIDTH_EPSILON: f64 = 1e-6;

/// A line of text after line-breaking.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokenLine {
    /// The text as a string.
    pub text: String,
    /// Total width of the line, trailing spaces excluded.
    pub width: f64,
}

/// Compute UAX#14 break opportunities indexed by char position.
///
/// Returns a vec of length `text.chars().count()`. Each entry is the break
/// opportunity *before* that character position. Index 0 is always `None`.
fn compute_break_opportunities(text: &str) -> Vec<Option<BreakOpportunity>> {
    let char_count = text.chars().count();
    let mut result = vec![None; char_count];

    let byte_to_char: Vec<usize> = {
        let mut map = vec![0usize; text.len() + 1];
        for (char_idx, (byte_idx, _)) in text.char_indices().enumerate() {
            map[byte_idx] = char_idx;
        }
        map[text.len()] = char_count;
        map
    };

    // linebreaks() yields the byte offset *after* each break; the one at
    // text.len() is the end of text and is dropped.
    for (byte_offset, opp) in linebreaks(text) {
        let char_idx = byte_to_char[byte_offset];
        if char_idx < char_count {
            result[char_idx] = Some(opp);
        }
    }

    result
}

/// Characters UAX #14 treats as mandatory breaks. They are never drawn.
fn is_line_feed(ch: char) -> bool {
    matches!(
        ch,
        '\n' | '\r' | '\u{000B}' | '\u{000C}' | '\u{0085}' | '\u{2028}' | '\u{2029}'
    )
}

pub struct TextLayout;

impl Default for TextLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLayout {
    pub fn new() -> Self {
        Self
    }

    /// Width of the widest hard line of `text`, without wrapping.
    pub fn measure_width(&self, metrics: &FontMetrics, text: &str, font_size: f64) -> f64 {
        text.split(is_line_feed)
            .map(|line| metrics.measure_string(line, font_size))
            .fold(0.0, f64::max)
    }

    /// Break `text` into lines no wider than `max_width`.
    ///
    /// Greedy: each line takes as many characters as fit, then ends at the
    /// last break opportunity. A word longer than the line is broken where
    /// it overflows. Spaces at the end of a line hang past the edge. Empty
    /// text has no lines.
    pub fn break_into_lines(
        &self,
        metrics: &FontMetrics,
        text: &str,
        font_size: f64,
        max_width: f64,
    ) -> Vec<BrokenLine> {
        if text.is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let widths: Vec<f64> = chars
            .iter()
            .map(|&ch| {
                if is_line_feed(ch) {
                    0.0
                } else {
                    metrics.char_width(ch, font_size)
                }
            })
            .collect();
        let break_opps = compute_break_opportunities(text);

        let mut lines = Vec::new();
        let mut line_start = 0;
        let mut line_width = 0.0;
        let mut last_break_point: Option<usize> = None;

        for (i, &ch) in chars.iter().enumerate() {
            if i > 0 {
                match break_opps[i] {
                    Some(BreakOpportunity::Mandatory) => {
                        let end = if is_line_feed(chars[i - 1]) { i - 1 } else { i };
                        lines.push(self.make_line(&chars[line_start..end], &widths[line_start..end]));
                        line_start = i;
                        line_width = 0.0;
                        last_break_point = None;
                    }
                    Some(BreakOpportunity::Allowed) => last_break_point = Some(i),
                    None => {}
                }
            }

            if is_line_feed(ch) {
                continue;
            }

            let char_width = widths[i];
            let overflows = line_width + char_width > max_width + WIDTH_EPSILON;
            if overflows && ch != ' ' && line_start < i {
                // Prefer the last break opportunity on this line; otherwise
                // force the break right here.
                let break_at = last_break_point
                    .filter(|&bp| bp > line_start)
                    .unwrap_or(i);
                lines.push(self.make_line(&chars[line_start..break_at], &widths[line_start..break_at]));
                line_start = break_at;
                line_width = widths[line_start..=i].iter().sum();
                last_break_point = None;
                continue;
            }

            line_width += char_width;
        }

        if line_start < chars.len() {
            let end = if is_line_feed(chars[chars.len() - 1]) {
                chars.len() - 1
            } else {
                chars.len()
            };
            lines.push(self.make_line(&chars[line_start..end], &widths[line_start..end]));
        }

        lines
    }

    /// Create a BrokenLine from characters and their widths.
    fn make_line(&self, chars: &[char], widths: &[f64]) -> BrokenLine {
        let mut width: f64 = widths.iter().sum();

        // Trim trailing spaces from width calculation
        let mut i = chars.len();
        while i > 0 && chars[i - 1] == ' ' {
            i -= 1;
            width -= widths[i];
        }

        BrokenLine {
            text: chars.iter().filter(|&&c| !is_line_feed(c)).collect(),
            width,
        }
    }
}

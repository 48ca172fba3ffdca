//! # Label Placement Engine
//!
//! Turns resolved labels into absolute draw rectangles on a page.
//!
//! ## Algorithm
//!
//! 1. Group the labels into blocks: every non-continuation label opens a new
//!    block, every continuation label joins the current one. A block shares
//!    the geometry of its opening label.
//! 2. Measure every member: intrinsic width from the metrics oracle, capped
//!    by the declared width, then the wrapped height at that width.
//! 3. Anchor the block: the members sit side by side on one line, so the
//!    block is as wide as its members combined and its left edge is pulled
//!    back from the anchor by the horizontal alignment.
//! 4. Emit one draw command per member, left to right. Each member is
//!    aligned vertically on its own height against the block's anchor.
//!
//! Coordinates are in points with the origin at the top-left of the page.
//! The PDF backend flips them.

use serde::Serialize;

use crate::error::{LabelpressError, Result};
use crate::model::{HAlign, Page};
use crate::resolve::{Geometry, ResolvedLabel};

/// Text measurement as seen by the placement engine.
///
/// Both methods take sizes in points and must not panic on empty text or a
/// zero width.
pub trait TextMetrics {
    /// Width of `text` set on a single line (explicit line feeds excepted).
    fn width_of(&self, font: &str, font_size: f64, text: &str, line_gap: f64) -> Result<f64>;

    /// Height of `text` wrapped at `width`.
    fn height_of(
        &self,
        font: &str,
        font_size: f64,
        text: &str,
        width: f64,
        line_gap: f64,
    ) -> Result<f64>;
}

/// An axis-aligned rectangle in page points, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A label ready to be drawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawCommand {
    pub font: String,
    pub font_size: f64,
    pub text: String,
    pub rect: Rect,
    /// Alignment of wrapped lines inside `rect`.
    pub align: HAlign,
    /// Extra space between wrapped lines, in points.
    pub line_gap: f64,
}

/// A resolved label with its box size.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredLabel<'a> {
    pub label: &'a ResolvedLabel,
    pub effective_width: f64,
    pub effective_height: f64,
}

/// An opening label and its continuations.
#[derive(Debug, Clone, PartialEq)]
pub struct Block<'a> {
    pub geometry: Geometry,
    pub labels: Vec<&'a ResolvedLabel>,
}

pub struct LayoutEngine;

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutEngine {
    pub fn new() -> Self {
        Self
    }

    /// Place every label on `page`. Commands come out in label order.
    pub fn place(
        &self,
        labels: &[ResolvedLabel],
        page: &Page,
        metrics: &dyn TextMetrics,
    ) -> Result<Vec<DrawCommand>> {
        let blocks = self.group(labels)?;
        let mut commands = Vec::with_capacity(labels.len());
        for block in &blocks {
            let measured = self.measure(block, page, metrics)?;
            self.emit(block, &measured, page, &mut commands);
        }
        log::debug!(
            "Placed {} labels in {} blocks on a {:.2}x{:.2}pt page",
            commands.len(),
            blocks.len(),
            page.width,
            page.height
        );
        Ok(commands)
    }

    /// Split the label sequence into blocks.
    pub fn group<'a>(&self, labels: &'a [ResolvedLabel]) -> Result<Vec<Block<'a>>> {
        let mut blocks: Vec<Block<'a>> = Vec::new();
        for (index, label) in labels.iter().enumerate() {
            match label.geometry.filter(|_| !label.continuation) {
                Some(geometry) => blocks.push(Block {
                    geometry,
                    labels: vec![label],
                }),
                None => match blocks.last_mut() {
                    Some(block) => block.labels.push(label),
                    None => return Err(LabelpressError::OrphanContinuation { index }),
                },
            }
        }
        Ok(blocks)
    }

    /// Measure every member of `block` against the page.
    pub fn measure<'a>(
        &self,
        block: &Block<'a>,
        page: &Page,
        metrics: &dyn TextMetrics,
    ) -> Result<Vec<MeasuredLabel<'a>>> {
        let line_gap = block.geometry.line_gap * page.height;
        // Continuations never carry a width of their own; only the opening
        // label is capped.
        let declared = block.geometry.width.map(|w| w * page.width);

        block
            .labels
            .iter()
            .enumerate()
            .map(|(i, &label)| {
                let intrinsic =
                    metrics.width_of(&label.font, label.font_size, &label.label, line_gap)?;
                let effective_width = match declared.filter(|_| i == 0) {
                    Some(max) => max.min(intrinsic),
                    None => intrinsic,
                };
                let effective_height = metrics.height_of(
                    &label.font,
                    label.font_size,
                    &label.label,
                    effective_width,
                    line_gap,
                )?;
                Ok(MeasuredLabel {
                    label,
                    effective_width,
                    effective_height,
                })
            })
            .collect()
    }

    fn emit(
        &self,
        block: &Block<'_>,
        measured: &[MeasuredLabel<'_>],
        page: &Page,
        out: &mut Vec<DrawCommand>,
    ) {
        let geometry = &block.geometry;
        let anchor_x = geometry.x * page.width;
        let anchor_y = geometry.y * page.height;
        let line_gap = geometry.line_gap * page.height;

        let total_width: f64 = measured.iter().map(|m| m.effective_width).sum();
        let mut x = anchor_x - geometry.align.offset(total_width);

        for m in measured {
            let y = anchor_y - geometry.vertical_align.offset(m.effective_height);
            out.push(DrawCommand {
                font: m.label.font.clone(),
                font_size: m.label.font_size,
                text: m.label.label.clone(),
                rect: Rect {
                    x,
                    y,
                    width: m.effective_width,
                    height: m.effective_height,
                },
                align: geometry.align,
                line_gap,
            });
            x += m.effective_width;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VAlign;
    use pretty_assertions::assert_eq;

    /// Every char is `size / 2` wide; every line is `size` tall.
    struct HalfEm;

    impl TextMetrics for HalfEm {
        fn width_of(&self, _font: &str, font_size: f64, text: &str, _gap: f64) -> Result<f64> {
            Ok(text.chars().count() as f64 * font_size / 2.0)
        }

        fn height_of(
            &self,
            _font: &str,
            font_size: f64,
            text: &str,
            width: f64,
            line_gap: f64,
        ) -> Result<f64> {
            let chars = text.chars().count() as f64;
            if chars == 0.0 {
                return Ok(0.0);
            }
            let per_line = (width / (font_size / 2.0)).floor().max(1.0);
            let lines = (chars / per_line).ceil();
            Ok(lines * (font_size + line_gap))
        }
    }

    fn page() -> Page {
        Page::from_points(200.0, 100.0)
    }

    fn opening(text: &str, geometry: Geometry) -> ResolvedLabel {
        ResolvedLabel {
            continuation: false,
            font: "F".to_string(),
            font_size: 10.0,
            label: text.to_string(),
            geometry: Some(geometry),
        }
    }

    fn continuation(text: &str) -> ResolvedLabel {
        ResolvedLabel {
            continuation: true,
            font: "F".to_string(),
            font_size: 20.0,
            label: text.to_string(),
            geometry: None,
        }
    }

    fn geometry(align: HAlign, vertical_align: VAlign) -> Geometry {
        Geometry {
            align,
            vertical_align,
            x: 0.5,
            y: 0.5,
            width: None,
            line_gap: 0.0,
        }
    }

    #[test]
    fn test_empty_sequence_places_nothing() {
        let commands = LayoutEngine::new().place(&[], &page(), &HalfEm).unwrap();
        assert!(commands.is_empty());
    }

    #[test]
    fn test_center_middle_single_label() {
        let labels = [opening("Hi", geometry(HAlign::Center, VAlign::Middle))];
        let commands = LayoutEngine::new().place(&labels, &page(), &HalfEm).unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(
            commands[0].rect,
            Rect {
                x: 100.0 - 5.0,
                y: 50.0 - 5.0,
                width: 10.0,
                height: 10.0,
            }
        );
    }

    #[test]
    fn test_left_edge_per_alignment() {
        let engine = LayoutEngine::new();
        // "AB" at 10pt is 10 wide, "CD" at 20pt is 20 wide: the block is 30.
        for (align, left) in [
            (HAlign::Left, 100.0),
            (HAlign::Center, 85.0),
            (HAlign::Right, 70.0),
        ] {
            let labels = [
                opening("AB", geometry(align, VAlign::Top)),
                continuation("CD"),
            ];
            let commands = engine.place(&labels, &page(), &HalfEm).unwrap();
            let total: f64 = commands.iter().map(|c| c.rect.width).sum();
            assert_eq!(total, 30.0);
            assert_eq!(commands[0].rect.x, left, "{:?}", align);
            assert_eq!(commands[1].rect.x, left + 10.0, "{:?}", align);
        }
    }

    #[test]
    fn test_members_align_vertically_on_own_height() {
        let labels = [
            opening("AB", geometry(HAlign::Left, VAlign::Bottom)),
            continuation("CD"),
        ];
        let commands = LayoutEngine::new().place(&labels, &page(), &HalfEm).unwrap();
        assert_eq!(commands[0].rect.y, 50.0 - 10.0);
        assert_eq!(commands[1].rect.y, 50.0 - 20.0);

        let labels = [
            opening("AB", geometry(HAlign::Left, VAlign::Middle)),
            continuation("CD"),
        ];
        let commands = LayoutEngine::new().place(&labels, &page(), &HalfEm).unwrap();
        assert_eq!(commands[0].rect.y, 50.0 - 5.0);
        assert_eq!(commands[1].rect.y, 50.0 - 10.0);
    }

    #[test]
    fn test_declared_width_caps_intrinsic() {
        let mut g = geometry(HAlign::Left, VAlign::Top);
        g.width = Some(0.1); // 20pt on a 200pt page
        let labels = [opening("ABCDEFGH", g)];
        let commands = LayoutEngine::new().place(&labels, &page(), &HalfEm).unwrap();
        assert_eq!(commands[0].rect.width, 20.0);
        // 4 chars per line, 2 lines.
        assert_eq!(commands[0].rect.height, 20.0);
    }

    #[test]
    fn test_wider_declared_width_keeps_intrinsic() {
        let mut g = geometry(HAlign::Left, VAlign::Top);
        g.width = Some(0.9);
        let labels = [opening("AB", g)];
        let commands = LayoutEngine::new().place(&labels, &page(), &HalfEm).unwrap();
        assert_eq!(commands[0].rect.width, 10.0);
    }

    #[test]
    fn test_line_gap_scales_with_page_height() {
        let mut g = geometry(HAlign::Left, VAlign::Top);
        g.width = Some(0.05); // 10pt: two chars per line
        g.line_gap = 0.02; // 2pt
        let labels = [opening("ABCD", g)];
        let commands = LayoutEngine::new().place(&labels, &page(), &HalfEm).unwrap();
        assert_eq!(commands[0].line_gap, 2.0);
        assert_eq!(commands[0].rect.height, 2.0 * (10.0 + 2.0));
    }

    #[test]
    fn test_blocks_start_at_every_opening_label() {
        let labels = [
            opening("A", geometry(HAlign::Left, VAlign::Top)),
            continuation("B"),
            opening("C", geometry(HAlign::Right, VAlign::Bottom)),
        ];
        let blocks = LayoutEngine::new().group(&labels).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].labels.len(), 2);
        assert_eq!(blocks[1].geometry.align, HAlign::Right);
    }

    #[test]
    fn test_orphan_continuation_is_rejected() {
        let labels = [continuation("lonely")];
        let err = LayoutEngine::new().group(&labels).unwrap_err();
        assert!(matches!(err, LabelpressError::OrphanContinuation { index: 0 }));
    }

    #[test]
    fn test_empty_text_and_zero_width_do_not_panic() {
        let mut g = geometry(HAlign::Center, VAlign::Middle);
        g.width = Some(0.0);
        let labels = [opening("", g)];
        let commands = LayoutEngine::new().place(&labels, &page(), &HalfEm).unwrap();
        assert_eq!(commands[0].rect.width, 0.0);
        assert_eq!(commands[0].rect.height, 0.0);
    }

    #[test]
    fn test_placement_is_deterministic() {
        let labels = [
            opening("Alpha", geometry(HAlign::Right, VAlign::Bottom)),
            continuation("Beta"),
        ];
        let engine = LayoutEngine::new();
        let first = engine.place(&labels, &page(), &HalfEm).unwrap();
        let second = engine.place(&labels, &page(), &HalfEm).unwrap();
        assert_eq!(first, second);
    }
}

//! # Label Resolution
//!
//! Turns raw label descriptors into fully resolved labels. Per field, the
//! precedence is: literal value, then the named preset, then a built-in
//! default. Continuation labels additionally fall back to the previous
//! resolved label for their font and size, which is how a run inherits its
//! typeface from the label that opened it.
//!
//! Resolution is a single left-to-right fold. The only state carried from
//! one label to the next is the previous resolved label.

use thiserror::Error;

use crate::error::{LabelpressError, Result};
use crate::model::{HAlign, Presets, TextOptions, VAlign};

/// Placement attributes of a block, owned by its opening label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub align: HAlign,
    pub vertical_align: VAlign,
    /// Anchor as a fraction of the page width.
    pub x: f64,
    /// Anchor as a fraction of the page height.
    pub y: f64,
    /// Maximum width as a fraction of the page width. `None` is intrinsic.
    pub width: Option<f64>,
    /// Line gap as a fraction of the page height.
    pub line_gap: f64,
}

/// A label with every attribute decided.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLabel {
    pub continuation: bool,
    pub font: String,
    pub font_size: f64,
    pub label: String,
    /// Present exactly when `continuation` is false.
    pub geometry: Option<Geometry>,
}

/// A required attribute that neither the descriptor, its preset nor the
/// previous label supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("missing \"{0}\"")]
pub struct MissingField(pub &'static str);

/// Resolve one descriptor against the presets and the previously resolved
/// label.
pub fn resolve(
    descriptor: &TextOptions,
    presets: &Presets,
    previous: Option<&ResolvedLabel>,
) -> std::result::Result<ResolvedLabel, MissingField> {
    let empty = TextOptions::default();
    let preset = descriptor
        .preset
        .as_ref()
        .and_then(|name| presets.get(name))
        .unwrap_or(&empty);
    let opts = descriptor.layered_over(preset);

    let continuation = opts.continuation.unwrap_or(false);
    let inherited = previous.filter(|_| continuation);

    let font = opts
        .font
        .or_else(|| inherited.map(|p| p.font.clone()))
        .ok_or(MissingField("font"))?;
    let font_size = opts
        .font_size
        .or_else(|| inherited.map(|p| p.font_size))
        .ok_or(MissingField("fontSize"))?;
    let label = opts.label.ok_or(MissingField("label"))?;

    let geometry = if continuation {
        None
    } else {
        let align = opts.align.unwrap_or_default();
        let vertical_align = opts.vertical_align.unwrap_or_default();
        Some(Geometry {
            align,
            vertical_align,
            x: opts.x.unwrap_or_else(|| align.anchor()),
            y: opts.y.unwrap_or_else(|| vertical_align.anchor()),
            width: opts.width,
            line_gap: opts.line_gap.unwrap_or(0.0),
        })
    };

    Ok(ResolvedLabel {
        continuation,
        font,
        font_size,
        label,
        geometry,
    })
}

/// Resolve a whole label sequence in order.
pub fn resolve_all(descriptors: &[TextOptions], presets: &Presets) -> Result<Vec<ResolvedLabel>> {
    let mut resolved: Vec<ResolvedLabel> = Vec::with_capacity(descriptors.len());
    for (index, descriptor) in descriptors.iter().enumerate() {
        let label = resolve(descriptor, presets, resolved.last())
            .map_err(|MissingField(field)| LabelpressError::MissingAttribute { index, field })?;
        resolved.push(label);
    }
    Ok(resolved)
}

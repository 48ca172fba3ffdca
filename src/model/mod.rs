//! # Document Model
//!
//! The input representation: a JSON document describing one or more output
//! files, each a single page of absolutely placed text labels.
//!
//! ```text
//! {
//!   "format": { "width": 210, "height": 297 },
//!   "textPresets": { "title": { "font": "fonts/Serif.ttf", "fontSize": 24 } },
//!   "files": [
//!     { "output": "out.pdf", "text": [ { "preset": "title", "label": "Hello" } ] }
//!   ]
//! }
//! ```
//!
//! Every field of a label is optional at this level. Presets and defaults
//! are layered in by [`crate::resolve`]; shape rules are enforced beforehand
//! by [`crate::validate`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Points per millimetre. Page formats are given in millimetres.
pub const POINTS_PER_MM: f64 = 72.0 / 25.4;

/// Named label presets, looked up by [`TextOptions::preset`].
pub type Presets = BTreeMap<String, TextOptions>;

/// A complete input document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Default page format for every file.
    #[serde(default)]
    pub format: Format,

    #[serde(default)]
    pub text_presets: Presets,

    /// Output files, processed strictly in order.
    pub files: Vec<FileSpec>,
}

/// A page format in millimetres. Either side may be left to the document
/// default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Format {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl Format {
    /// Layer `self` over `defaults`: fields set here win.
    pub fn layered_over(&self, defaults: &Format) -> Format {
        Format {
            width: self.width.or(defaults.width),
            height: self.height.or(defaults.height),
        }
    }

    /// The concrete page for this format, if both sides are known.
    pub fn page(&self) -> Option<Page> {
        Some(Page::from_millimetres(self.width?, self.height?))
    }
}

/// One output file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSpec {
    /// Overrides for the document's default format.
    #[serde(default)]
    pub format: Format,

    /// Labels in drawing order.
    #[serde(default)]
    pub text: Vec<TextOptions>,

    /// Output path, relative to the document's directory.
    pub output: String,

    /// Shell command run after the file is written. `$output` is replaced
    /// with the output path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postprocess: Option<String>,
}

/// A raw label descriptor or a preset. All fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    /// Path to a TrueType/OpenType font file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<HAlign>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical_align: Option<VAlign>,
    /// Anchor as a fraction of the page width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    /// Anchor as a fraction of the page height.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    /// Maximum width as a fraction of the page width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// Extra space between wrapped lines as a fraction of the page height.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_gap: Option<f64>,
    /// Continue the previous label on the same line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation: Option<bool>,
}

impl TextOptions {
    /// Layer `self` over `preset`: every field set here wins, unset fields
    /// fall back to the preset's value.
    pub fn layered_over(&self, preset: &TextOptions) -> TextOptions {
        TextOptions {
            preset: self.preset.clone(),
            font: self.font.clone().or_else(|| preset.font.clone()),
            font_size: self.font_size.or(preset.font_size),
            label: self.label.clone().or_else(|| preset.label.clone()),
            align: self.align.or(preset.align),
            vertical_align: self.vertical_align.or(preset.vertical_align),
            x: self.x.or(preset.x),
            y: self.y.or(preset.y),
            width: self.width.or(preset.width),
            line_gap: self.line_gap.or(preset.line_gap),
            continuation: self.continuation.or(preset.continuation),
        }
    }
}

/// Horizontal alignment of a block around its anchor, and of wrapped lines
/// inside a label's box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HAlign {
    Left,
    #[default]
    Center,
    Right,
}

impl HAlign {
    pub const ALL: [HAlign; 3] = [HAlign::Left, HAlign::Center, HAlign::Right];

    pub fn as_str(self) -> &'static str {
        match self {
            HAlign::Left => "left",
            HAlign::Center => "center",
            HAlign::Right => "right",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }

    /// Default normalized anchor when no `x` is given.
    pub fn anchor(self) -> f64 {
        match self {
            HAlign::Left => 0.0,
            HAlign::Center => 0.5,
            HAlign::Right => 1.0,
        }
    }

    /// Distance from the anchor back to the left edge of something `extent`
    /// wide.
    pub fn offset(self, extent: f64) -> f64 {
        match self {
            HAlign::Left => 0.0,
            HAlign::Center => extent / 2.0,
            HAlign::Right => extent,
        }
    }
}

/// Vertical alignment of each label around its block's anchor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VAlign {
    Top,
    #[default]
    Middle,
    Bottom,
}

impl VAlign {
    pub const ALL: [VAlign; 3] = [VAlign::Top, VAlign::Middle, VAlign::Bottom];

    pub fn as_str(self) -> &'static str {
        match self {
            VAlign::Top => "top",
            VAlign::Middle => "middle",
            VAlign::Bottom => "bottom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }

    /// Default normalized anchor when no `y` is given.
    pub fn anchor(self) -> f64 {
        match self {
            VAlign::Top => 0.0,
            VAlign::Middle => 0.5,
            VAlign::Bottom => 1.0,
        }
    }

    /// Distance from the anchor back to the top edge of something `extent`
    /// tall.
    pub fn offset(self, extent: f64) -> f64 {
        match self {
            VAlign::Top => 0.0,
            VAlign::Middle => extent / 2.0,
            VAlign::Bottom => extent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// A page in both physical (millimetre) and point units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Page {
    pub width_mm: f64,
    pub height_mm: f64,
    /// Width in points.
    pub width: f64,
    /// Height in points.
    pub height: f64,
}

impl Page {
    pub fn from_millimetres(width_mm: f64, height_mm: f64) -> Self {
        // The short side is the media width in portrait; landscape swaps it,
        // so the point box always follows the physical sides.
        let short = POINTS_PER_MM * width_mm.min(height_mm);
        let long = POINTS_PER_MM * width_mm.max(height_mm);
        let (width, height) = match Self::orientation_of(width_mm, height_mm) {
            Orientation::Portrait => (short, long),
            Orientation::Landscape => (long, short),
        };
        Self {
            width_mm,
            height_mm,
            width,
            height,
        }
    }

    /// A page given directly in points. Used where the physical size is
    /// irrelevant.
    pub fn from_points(width: f64, height: f64) -> Self {
        Self {
            width_mm: width / POINTS_PER_MM,
            height_mm: height / POINTS_PER_MM,
            width,
            height,
        }
    }

    pub fn orientation(&self) -> Orientation {
        Self::orientation_of(self.width_mm, self.height_mm)
    }

    fn orientation_of(width_mm: f64, height_mm: f64) -> Orientation {
        if width_mm < height_mm {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }
}

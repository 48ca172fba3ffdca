//! # labelpress
//!
//! Batch label rendering: a JSON document describes one or more single-page
//! PDF files, each a set of short text labels placed on the page by
//! normalized anchor coordinates.
//!
//! A label can *continue* the one before it. Continuations are laid out on
//! the same line as the label they follow, inherit its font, and share its
//! anchor and alignment, so a run like `Total: ` + `42` in a bigger size can
//! be centred as one unit.
//!
//! ## Architecture
//!
//! ```text
//! Input (JSON file)
//!       ↓
//!   [document] Existence checks, parse, [validate], typed [model]
//!       ↓
//!   [resolve]  Presets, defaults, continuation inheritance
//!       ↓
//!   [layout]   Group into blocks, measure via [font], anchor
//!       ↓
//!   [pdf]      Serialize to PDF bytes
//!       ↓
//!   write + optional post-process command
//! ```

pub mod document;
pub mod error;
pub mod font;
pub mod layout;
pub mod model;
pub mod pdf;
pub mod resolve;
pub mod text;
pub mod validate;

use std::fs;
use std::path::Path;
use std::process::Command;

use error::{LabelpressError, Result};
use font::FontContext;
use layout::LayoutEngine;
use model::{FileSpec, Page, Presets};
use pdf::PdfWriter;
use resolve::resolve_all;

/// Render one output file to PDF bytes.
///
/// `fonts` is the font context for the document; fonts the labels name are
/// loaded into it on first use.
pub fn render_file(
    file: &FileSpec,
    page: &Page,
    presets: &Presets,
    fonts: &mut FontContext,
) -> Result<Vec<u8>> {
    let labels = resolve_all(&file.text, presets)?;
    for label in &labels {
        fonts.load(&label.font)?;
    }
    let commands = LayoutEngine::new().place(&labels, page, &*fonts)?;
    PdfWriter::new().write(page, &commands, fonts)
}

/// Process every file of the document at `path`, in order. The first
/// failure aborts the batch.
pub fn run(path: &Path) -> Result<()> {
    let loaded = document::load(path)?;
    let doc = &loaded.document;
    let base_dir = &loaded.base_dir;
    let mut fonts = FontContext::new(base_dir);

    let count = doc.files.len();
    for (index, file) in doc.files.iter().enumerate() {
        log::info!("Processing file {} of {}...", index + 1, count);

        let format = file.format.layered_over(&doc.format);
        let page = format
            .page()
            .ok_or_else(|| LabelpressError::MissingPageFormat {
                output: file.output.clone(),
            })?;
        log::debug!(
            "Page {}x{} mm ({:?}), {:.2}x{:.2} pt",
            page.width_mm,
            page.height_mm,
            page.orientation(),
            page.width,
            page.height
        );
        let bytes = render_file(file, &page, &doc.text_presets, &mut fonts)?;

        let output = base_dir.join(&file.output);
        fs::write(&output, &bytes).map_err(|source| LabelpressError::Write {
            path: output.clone(),
            source,
        })?;
        log::debug!("Wrote {} bytes to {}", bytes.len(), output.display());

        if let Some(command) = &file.postprocess {
            log::info!("Postprocessing...");
            postprocess(command, &file.output, base_dir)?;
        }
    }

    log::info!("Done");
    Ok(())
}

/// Replace every `$output` token not followed by a word character.
pub fn substitute_output(command: &str, output: &str) -> String {
    const TOKEN: &str = "$output";
    let mut result = String::with_capacity(command.len());
    let mut rest = command;
    while let Some(pos) = rest.find(TOKEN) {
        let after = &rest[pos + TOKEN.len()..];
        let at_boundary = after
            .chars()
            .next()
            .map_or(true, |c| !(c.is_ascii_alphanumeric() || c == '_'));
        result.push_str(&rest[..pos]);
        result.push_str(if at_boundary { output } else { TOKEN });
        rest = after;
    }
    result.push_str(rest);
    result
}

/// Run a post-process command through the platform shell in `dir`.
pub fn postprocess(command: &str, output: &str, dir: &Path) -> Result<()> {
    let line = substitute_output(command, output);
    log::debug!("Running `{}` in {}", line, dir.display());

    let mut shell = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C");
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c");
        c
    };
    let status = shell
        .arg(&line)
        .current_dir(dir)
        .status()
        .map_err(|e| LabelpressError::Postprocess {
            command: line.clone(),
            reason: e.to_string(),
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(LabelpressError::Postprocess {
            command: line,
            reason: status.to_string(),
        })
    }
}

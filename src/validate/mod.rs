//! # Document Validation
//!
//! Checks the raw JSON tree before anything is deserialized, resolved or
//! measured. Each field has a small predicate; the walker visits the tree in
//! document order and stops at the first violation, reporting it together
//! with its JSON path (`json.files[0].text[2].fontSize`).
//!
//! Font paths are checked against the file system relative to the
//! document's directory, so a document that validates can be rendered
//! without further shape checks.

use std::fmt;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::model::{HAlign, VAlign};

type Check = Result<(), ValidationError>;
type Object = Map<String, Value>;

const DOCUMENT_KEYS: &[&str] = &["format", "textPresets", "files"];
const FORMAT_KEYS: &[&str] = &["width", "height"];
const FILE_KEYS: &[&str] = &["format", "text", "output", "postprocess"];
const TEXT_KEYS: &[&str] = &[
    "preset",
    "font",
    "fontSize",
    "label",
    "align",
    "verticalAlign",
    "x",
    "y",
    "width",
    "lineGap",
    "continuation",
];
/// Fields a continuation label inherits from its block and may not set.
const GEOMETRY_KEYS: &[&str] = &["align", "verticalAlign", "x", "y", "width", "lineGap"];
/// Fields that make a label impossible to continue.
const WRAPPING_KEYS: &[&str] = &["width", "lineGap"];

/// Validate a parsed document. `base_dir` is the directory font paths are
/// relative to.
pub fn validate(root: &Value, base_dir: &Path) -> Check {
    Validator { root, base_dir }.document()
}

/// A dotted JSON path rooted at `json`.
#[derive(Debug, Clone)]
struct JsonPath(String);

impl JsonPath {
    fn root() -> Self {
        JsonPath("json".to_string())
    }

    fn key(&self, key: &str) -> Self {
        JsonPath(format!("{}.{}", self.0, key))
    }

    fn index(&self, index: usize) -> Self {
        JsonPath(format!("{}[{}]", self.0, index))
    }

    fn error(&self, message: impl Into<String>) -> ValidationError {
        ValidationError {
            message: message.into(),
            path: self.0.clone(),
        }
    }

    fn fail(&self, message: impl Into<String>) -> Check {
        Err(self.error(message))
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a set of text options sits in the document.
#[derive(Clone, Copy)]
enum Scope<'v> {
    /// An entry of `textPresets`.
    Preset,
    /// An element of a file's `text` list.
    Item {
        index: usize,
        previous: Option<&'v Value>,
    },
}

struct Validator<'a> {
    root: &'a Value,
    base_dir: &'a Path,
}

impl<'a> Validator<'a> {
    fn document(&self) -> Check {
        let path = JsonPath::root();
        let obj = self
            .root
            .as_object()
            .ok_or_else(|| path.error("Expected JSON to be an object"))?;

        if let Some(format) = obj.get("format") {
            self.format(format, true, &path.key("format"))?;
        }
        if let Some(presets) = obj.get("textPresets") {
            self.presets(presets, &path.key("textPresets"))?;
        }
        match obj.get("files") {
            Some(files) => self.files(files, &path.key("files"))?,
            None => path.key("files").fail("Missing \"files\" list")?,
        }
        reject_unexpected(obj, DOCUMENT_KEYS, &path, "property")
    }

    /// `is_default` is true for the document-wide format, where both sides
    /// are optional.
    fn format(&self, value: &Value, is_default: bool, path: &JsonPath) -> Check {
        let obj = value
            .as_object()
            .ok_or_else(|| path.error("Expected \"format\" to be an object"))?;
        for &key in FORMAT_KEYS {
            let at = path.key(key);
            match obj.get(key) {
                Some(v) if !is_positive(v) => {
                    at.fail(format!("Expected \"{}\" to be a positive number", key))?
                }
                None if !is_default && !self.default_format_defines(key) => {
                    at.fail(format!("\"{}\" is not defined for a file", key))?
                }
                _ => {}
            }
        }
        reject_unexpected(obj, FORMAT_KEYS, path, "format property")
    }

    fn presets(&self, value: &Value, path: &JsonPath) -> Check {
        let obj = value
            .as_object()
            .ok_or_else(|| path.error("Expected \"textPresets\" to be an object"))?;
        for (name, preset) in obj {
            self.text_options(preset, Scope::Preset, &path.key(name))?;
        }
        Ok(())
    }

    fn files(&self, value: &Value, path: &JsonPath) -> Check {
        let files = value
            .as_array()
            .ok_or_else(|| path.error("Expected \"files\" to be an array"))?;
        for (i, file) in files.iter().enumerate() {
            self.file(file, &path.index(i))?;
        }
        Ok(())
    }

    fn file(&self, value: &Value, path: &JsonPath) -> Check {
        let obj = value
            .as_object()
            .ok_or_else(|| path.error("Expected each element of \"files\" to be an object"))?;

        let no_format = Value::Object(Map::new());
        self.format(
            obj.get("format").unwrap_or(&no_format),
            false,
            &path.key("format"),
        )?;

        if let Some(text) = obj.get("text") {
            let at = path.key("text");
            let items = text
                .as_array()
                .ok_or_else(|| at.error("Expected \"text\" to be an array"))?;
            for (index, item) in items.iter().enumerate() {
                let previous = index.checked_sub(1).map(|i| &items[i]);
                self.text_options(item, Scope::Item { index, previous }, &at.index(index))?;
            }
        }

        let at = path.key("output");
        match obj.get("output") {
            None => at.fail("Missing \"output\"")?,
            Some(v) if !v.is_string() => at.fail("Expected \"output\" to be a file path")?,
            _ => {}
        }

        if let Some(v) = obj.get("postprocess") {
            if !v.is_string() {
                path.key("postprocess")
                    .fail("Expected \"postprocess\" to be a CLI command")?;
            }
        }

        reject_unexpected(obj, FILE_KEYS, path, "property")
    }

    fn text_options(&self, value: &Value, scope: Scope<'_>, path: &JsonPath) -> Check {
        let obj = value.as_object().ok_or_else(|| {
            path.error(match scope {
                Scope::Preset => "Expected preset to be an object",
                Scope::Item { .. } => "Expected each \"text\" item to be an object",
            })
        })?;
        let is_item = matches!(scope, Scope::Item { .. });

        if let Some(v) = obj.get("preset") {
            let at = path.key("preset");
            if !is_item {
                at.fail("Cannot set \"preset\" for another preset")?;
            }
            let name = v
                .as_str()
                .ok_or_else(|| at.error("\"preset\" must be a preset name"))?;
            if self.preset_named(name).is_none() {
                at.fail(format!("Preset not found: \"{}\"", name))?;
            }
        }

        let preset = if is_item { self.preset_of(obj) } else { None };
        let continuation = is_continuation(obj, preset);
        // Required on items, through the preset if not literally. A
        // continuation may inherit its font from the label before it.
        let require = |key: &str, inheritable: bool| -> Check {
            if is_item && !(inheritable && continuation) && !defines(obj, preset, key) {
                path.key(key)
                    .fail(format!("\"{}\" is not defined for a text label", key))?;
            }
            Ok(())
        };

        if let Some(v) = obj.get("font") {
            self.font_file(v, &path.key("font"))?;
        }
        require("font", true)?;

        if let Some(v) = obj.get("fontSize") {
            if !is_positive(v) {
                path.key("fontSize")
                    .fail("Expected \"fontSize\" to be a positive number")?;
            }
        }
        require("fontSize", true)?;

        if let Some(v) = obj.get("label") {
            if !v.is_string() {
                path.key("label").fail("Expected \"label\" to be a string")?;
            }
        }
        require("label", false)?;

        if let Some(v) = obj.get("align") {
            if v.as_str().and_then(HAlign::parse).is_none() {
                let allowed: Vec<&str> = HAlign::ALL.iter().map(|a| a.as_str()).collect();
                path.key("align").fail(one_of("align", &allowed, v))?;
            }
        }
        if let Some(v) = obj.get("verticalAlign") {
            if v.as_str().and_then(VAlign::parse).is_none() {
                let allowed: Vec<&str> = VAlign::ALL.iter().map(|a| a.as_str()).collect();
                path.key("verticalAlign")
                    .fail(one_of("verticalAlign", &allowed, v))?;
            }
        }

        for key in ["x", "y"] {
            if let Some(v) = obj.get(key) {
                if !is_unit(v) {
                    path.key(key)
                        .fail(format!("Expected \"{}\" to be a number between 0 and 1", key))?;
                }
            }
        }
        if let Some(v) = obj.get("width") {
            if !is_positive(v) {
                path.key("width")
                    .fail("Expected \"width\" to be a positive number")?;
            }
        }
        if let Some(v) = obj.get("lineGap") {
            if !is_non_negative(v) {
                path.key("lineGap")
                    .fail("Expected \"lineGap\" to be a non-negative number")?;
            }
        }
        if let Some(v) = obj.get("continuation") {
            if !v.is_boolean() {
                path.key("continuation")
                    .fail("Expected \"continuation\" to be a boolean")?;
            }
        }

        if let Scope::Item { index, previous } = scope {
            if continuation {
                self.continuation_rules(obj, preset, index, previous, path)?;
            }
        }

        reject_unexpected(obj, TEXT_KEYS, path, "option")
    }

    fn continuation_rules(
        &self,
        obj: &Object,
        preset: Option<&Object>,
        index: usize,
        previous: Option<&Value>,
        path: &JsonPath,
    ) -> Check {
        let at = path.key("continuation");
        if index == 0 {
            at.fail("The first text label cannot be a continuation")?;
        }
        if let Some(&key) = GEOMETRY_KEYS.iter().find(|k| defines(obj, preset, k)) {
            path.key(key)
                .fail(format!("Cannot set \"{}\" on a continuation label", key))?;
        }
        if let Some(prev) = previous.and_then(Value::as_object) {
            let prev_preset = self.preset_of(prev);
            if let Some(key) = WRAPPING_KEYS.iter().find(|k| defines(prev, prev_preset, k)) {
                at.fail(format!("Cannot continue a label that sets \"{}\"", key))?;
            }
        }
        Ok(())
    }

    fn font_file(&self, value: &Value, path: &JsonPath) -> Check {
        let name = value
            .as_str()
            .ok_or_else(|| path.error("Expected \"font\" to be a string"))?;
        let file = self.base_dir.join(name);
        if !file.exists() {
            path.fail(format!("File does not exist: {}", name))?;
        }
        if !file.is_file() {
            path.fail(format!("Path is not a file: {}", name))?;
        }
        Ok(())
    }

    fn default_format_defines(&self, key: &str) -> bool {
        self.root
            .get("format")
            .and_then(|f| f.get(key))
            .is_some()
    }

    fn preset_named(&self, name: &str) -> Option<&'a Object> {
        self.root
            .get("textPresets")
            .and_then(|p| p.get(name))
            .and_then(Value::as_object)
    }

    fn preset_of(&self, obj: &Object) -> Option<&'a Object> {
        obj.get("preset")
            .and_then(Value::as_str)
            .and_then(|name| self.preset_named(name))
    }
}

/// Whether `key` is set literally or by the preset.
fn defines(obj: &Object, preset: Option<&Object>, key: &str) -> bool {
    obj.contains_key(key) || preset.is_some_and(|p| p.contains_key(key))
}

fn is_continuation(obj: &Object, preset: Option<&Object>) -> bool {
    obj.get("continuation")
        .or_else(|| preset.and_then(|p| p.get("continuation")))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn is_positive(v: &Value) -> bool {
    v.as_f64().is_some_and(|n| n > 0.0)
}

fn is_non_negative(v: &Value) -> bool {
    v.as_f64().is_some_and(|n| n >= 0.0)
}

fn is_unit(v: &Value) -> bool {
    v.as_f64().is_some_and(|n| (0.0..=1.0).contains(&n))
}

fn one_of(key: &str, allowed: &[&str], got: &Value) -> String {
    let got = match got {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    format!(
        "Expected \"{}\" to be one of \"{}\", got \"{}\"",
        key,
        allowed.join("\", \""),
        got
    )
}

fn reject_unexpected(obj: &Object, allowed: &[&str], path: &JsonPath, noun: &str) -> Check {
    match obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => path
            .key(key)
            .fail(format!("Unexpected {}: \"{}\"", noun, key)),
        None => Ok(()),
    }
}

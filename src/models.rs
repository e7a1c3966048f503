//! Data model for test definitions and their derived fields.
//!
//! A test definition is a free-form YAML mapping; it is kept as a dynamic
//! `serde_json` map (with insertion order preserved) because variant
//! dimensions may overlay arbitrary fields and templates can reference any
//! of them. The closed sets - hosting contexts and template kinds - are
//! typed enums.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A test definition or resolved variant instance: field name to value.
///
/// Insertion order is significant (variant dimensions iterate in declared
/// order), which is why `serde_json` is built with `preserve_order`.
pub type Params = Map<String, Value>;

/// The environments a generated test can run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanvasType {
    /// A canvas element embedded in an HTML page.
    HtmlCanvas,
    /// An OffscreenCanvas used on the main thread.
    OffscreenCanvas,
    /// An OffscreenCanvas used inside a worker.
    Worker,
}

impl CanvasType {
    /// Every hosting context, in emission order.
    pub const ALL: [CanvasType; 3] =
        [CanvasType::HtmlCanvas, CanvasType::OffscreenCanvas, CanvasType::Worker];

    /// The name used in YAML `canvas_types` lists and in templates.
    pub fn as_str(&self) -> &'static str {
        match self {
            CanvasType::HtmlCanvas => "HtmlCanvas",
            CanvasType::OffscreenCanvas => "OffscreenCanvas",
            CanvasType::Worker => "Worker",
        }
    }

    /// Parse a hosting-context name as written in a test definition.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "HtmlCanvas" => Some(CanvasType::HtmlCanvas),
            "OffscreenCanvas" => Some(CanvasType::OffscreenCanvas),
            "Worker" => Some(CanvasType::Worker),
            _ => None,
        }
    }
}

impl std::fmt::Display for CanvasType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a finalized test is emitted, derived from the presence of the
/// `reference` / `html_reference` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    /// Same-page reference comparison (`reference` field).
    Reference,
    /// Cross-document reference comparison (`html_reference` field).
    HtmlReference,
    /// Assertion-style testharness test (the default).
    Testharness,
}

impl TemplateType {
    /// The value exposed to templates as `template_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::Reference => "reference",
            TemplateType::HtmlReference => "html_reference",
            TemplateType::Testharness => "testharness",
        }
    }
}

/// The test's `name` field, or a placeholder for diagnostics on nameless
/// definitions.
pub fn name_of(params: &Params) -> &str {
    params.get("name").and_then(Value::as_str).unwrap_or("<unnamed>")
}

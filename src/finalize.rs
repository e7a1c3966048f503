//! Per-variant finalization: defaults, naming, classification, validation.

use std::sync::OnceLock;

use minijinja::Environment;
use serde_json::{json, Value};

use crate::directives;
use crate::error::GenError;
use crate::models::{name_of, CanvasType, Params, TemplateType};

/// A fully finalized test instance, ready for output synthesis.
///
/// `params` keeps every field visible to templates (including the derived
/// `name`, `file_name`, `canvas_types` and `template_type`); the typed
/// fields are what the driver and synthesizer branch on.
#[derive(Debug, Clone)]
pub struct ResolvedTest {
    pub params: Params,
    pub canvas_types: Vec<CanvasType>,
    pub template_type: TemplateType,
}

impl ResolvedTest {
    pub fn name(&self) -> &str {
        self.params.get("name").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn file_name(&self) -> &str {
        self.params.get("file_name").and_then(Value::as_str).unwrap_or_default()
    }
}

/// Overlay the hard defaults under a test's own fields. Explicit fields win.
pub fn add_default_params(test: &Params) -> Params {
    let mut params = Params::new();
    params.insert("desc".to_string(), json!(""));
    params.insert("size".to_string(), json!([100, 50]));
    params.insert("variant_names".to_string(), json!([]));
    for (key, value) in test {
        params.insert(key.clone(), value.clone());
    }
    params
}

/// Validate a base test definition, before variant expansion.
///
/// Fatal: a `size` that is not a two-element numeric array, or a
/// `test_type` other than `promise`. Non-fatal: a test expecting an
/// all-clear result while asserting a fully-transparent pixel, which is
/// usually a mistake but is only warned about.
pub fn validate_test(test: &Params) -> Result<(), GenError> {
    let name = name_of(test);

    if test.get("expected").and_then(Value::as_str) == Some("green") {
        if let Some(code) = test.get("code").and_then(Value::as_str) {
            static SUSPICIOUS: OnceLock<regex::Regex> = OnceLock::new();
            let suspicious = SUSPICIOUS.get_or_init(|| {
                regex::Regex::new(r"@assert pixel .* 0,0,0,0;").expect("static regex pattern")
            });
            if suspicious.is_match(code) {
                eprintln!("Warning: probable incorrect pixel test in {name}");
            }
        }
    }

    if let Some(size) = test.get("size") {
        let well_formed = size
            .as_array()
            .map_or(false, |pair| pair.len() == 2 && pair.iter().all(Value::is_number));
        if !well_formed {
            return Err(GenError::definition(format!(
                "invalid canvas size \"{size}\" in test {name}; \
                 expected an array with two numbers"
            )));
        }
    }

    if let Some(test_type) = test.get("test_type") {
        if test_type.as_str() != Some("promise") {
            return Err(GenError::definition(format!(
                "test {name} has an invalid test_type; only \"promise\" is accepted"
            )));
        }
    }

    Ok(())
}

/// Compute the final test name: the base name joined with the chosen
/// variant names, then rendered as a template so names can embed parameter
/// values.
fn variant_name(env: &Environment, params: &Params) -> Result<String, GenError> {
    let base = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| GenError::definition("test definition is missing a \"name\""))?;

    let append =
        params.get("append_variants_to_name").and_then(Value::as_bool).unwrap_or(true);
    let mut name = base.to_string();
    if append {
        if let Some(variant_names) = params.get("variant_names").and_then(Value::as_array) {
            for variant in variant_names.iter().filter_map(Value::as_str) {
                name.push('.');
                name.push_str(variant);
            }
        }
    }

    let context = minijinja::Value::from_serialize(params);
    Ok(env.render_str(&name, &context)?)
}

fn resolve_canvas_types(params: &Params) -> Result<Vec<CanvasType>, GenError> {
    let Some(requested) = params.get("canvas_types") else {
        return Ok(CanvasType::ALL.to_vec());
    };
    let entries = requested.as_array().ok_or_else(|| {
        GenError::definition(format!(
            "canvas_types in test {} must be a list",
            name_of(params)
        ))
    })?;

    let mut types = Vec::new();
    let mut invalid = Vec::new();
    for entry in entries {
        match entry.as_str().and_then(CanvasType::from_name) {
            Some(canvas_type) => {
                if !types.contains(&canvas_type) {
                    types.push(canvas_type);
                }
            }
            None => invalid.push(entry.to_string()),
        }
    }
    if !invalid.is_empty() {
        let accepted: Vec<_> = CanvasType::ALL.iter().map(CanvasType::as_str).collect();
        return Err(GenError::definition(format!(
            "invalid canvas_types: {invalid:?}; accepted values are: {accepted:?}"
        )));
    }
    Ok(types)
}

fn resolve_template_type(params: &Params) -> Result<TemplateType, GenError> {
    let has_reference = params.contains_key("reference");
    let has_html_reference = params.contains_key("html_reference");
    if has_reference && has_html_reference {
        return Err(GenError::definition(format!(
            "test {} is invalid, \"reference\" and \"html_reference\" \
             can't both be specified at the same time",
            name_of(params)
        )));
    }
    Ok(if has_reference {
        TemplateType::Reference
    } else if has_html_reference {
        TemplateType::HtmlReference
    } else {
        TemplateType::Testharness
    })
}

/// Finalize a variant instance into a [`ResolvedTest`].
///
/// Order matters: the name is computed before the file name, canvas types
/// and template kind are resolved before code expansion so a failed
/// classification never leaves half-expanded code behind.
pub fn finalize(env: &Environment, mut params: Params) -> Result<ResolvedTest, GenError> {
    let name = variant_name(env, &params)?;
    params.insert("name".to_string(), json!(name));

    let file_name = if params.contains_key("manual") {
        format!("{name}-manual")
    } else {
        name.clone()
    };
    params.insert("file_name".to_string(), json!(file_name));

    let canvas_types = resolve_canvas_types(&params)?;
    let type_names: Vec<_> = canvas_types.iter().map(CanvasType::as_str).collect();
    params.insert("canvas_types".to_string(), json!(type_names));

    let template_type = resolve_template_type(&params)?;
    params.insert("template_type".to_string(), json!(template_type.as_str()));

    let code = params
        .get("code")
        .and_then(Value::as_str)
        .ok_or_else(|| GenError::definition(format!("test {name} has no code")))?;
    let expanded = directives::expand_code(code)?;
    params.insert("code".to_string(), json!(expanded));

    Ok(ResolvedTest { params, canvas_types, template_type })
}

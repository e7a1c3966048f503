//! Fixed-point template rendering.
//!
//! Parameter values may themselves contain template references to other
//! parameters (the code block referencing name- or size-derived values, for
//! instance), so a single render pass cannot resolve transitive references.
//! The output of each pass is re-parsed as a template and re-rendered until
//! it stops changing.

use std::path::Path;

use minijinja::Environment;
use serde_json::Value;

use crate::directives::double_quote_escape;
use crate::error::GenError;
use crate::models::Params;

/// Render passes beyond this count are assumed to be a pathological
/// self-referential template rather than slow convergence.
pub const MAX_RENDER_PASSES: usize = 100;

/// Build the template environment used for every render in a run.
///
/// The loader serves the external page templates (`testharness_*.html`,
/// `reftest_*.html`, ...) from `templates_dir`; inline strings from test
/// definitions are rendered through the same environment so they see the
/// same filters and settings.
pub fn build_env(templates_dir: &Path) -> Environment<'static> {
    let mut env = base_env();
    env.set_loader(minijinja::path_loader(templates_dir));
    env
}

/// An environment without a template loader, for rendering inline strings.
pub fn base_env() -> Environment<'static> {
    let mut env = Environment::new();
    // Jinja2 does not auto-escape by default; minijinja escapes templates
    // named `*.html` unless told otherwise, which would mangle emitted code.
    env.set_auto_escape_callback(|_| minijinja::AutoEscape::None);
    env.set_keep_trailing_newline(true);
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_filter("double_quote_escape", |s: String| double_quote_escape(&s));
    env
}

/// Render `text` repeatedly against `params` until the output stabilizes.
///
/// Returns [`GenError::NonConvergence`] if [`MAX_RENDER_PASSES`] passes do
/// not reach a fixed point.
pub fn render_to_fixpoint(
    env: &Environment,
    text: &str,
    params: &Params,
) -> Result<String, GenError> {
    let context = minijinja::Value::from_serialize(params);
    let mut rendered = env.render_str(text, &context)?;
    for _ in 0..MAX_RENDER_PASSES {
        let next = env.render_str(&rendered, &context)?;
        if next == rendered {
            return Ok(next);
        }
        rendered = next;
    }
    Err(GenError::NonConvergence(MAX_RENDER_PASSES))
}

/// Render a named page template against `params`, to a fixed point.
///
/// The `code` parameter is rendered on its own first: it can expand into
/// multiple lines, and pre-rendering it keeps the indentation correct when
/// it is substituted into the surrounding page.
pub fn render_file(
    env: &Environment,
    template_name: &str,
    params: &Params,
) -> Result<String, GenError> {
    let mut params = params.clone();
    if let Some(code) = params.get("code").and_then(Value::as_str).map(str::to_string) {
        let rendered_code = render_to_fixpoint(env, &code, &params)?;
        params.insert("code".to_string(), Value::String(rendered_code));
    }

    let context = minijinja::Value::from_serialize(&params);
    let first = env.get_template(template_name)?.render(&context)?;
    render_to_fixpoint(env, &first, &params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params_from(pairs: &[(&str, Value)]) -> Params {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn plain_text_is_already_a_fixpoint() {
        let env = base_env();
        let params = Params::new();
        assert_eq!(render_to_fixpoint(&env, "hello", &params).unwrap(), "hello");
    }

    #[test]
    fn transitive_references_resolve() {
        let env = base_env();
        let params = params_from(&[
            ("a", json!("{{ b }}!")),
            ("b", json!("{{ c }}")),
            ("c", json!("deep")),
        ]);
        assert_eq!(render_to_fixpoint(&env, "{{ a }}", &params).unwrap(), "deep!");
    }

    #[test]
    fn rendering_is_idempotent_on_its_output() {
        let env = base_env();
        let params = params_from(&[("name", json!("t"))]);
        let once = render_to_fixpoint(&env, "test {{ name }}", &params).unwrap();
        let twice = render_to_fixpoint(&env, &once, &params).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn self_referential_params_fail_instead_of_looping() {
        let env = base_env();
        // `a` keeps producing new template text on every pass.
        let params = params_from(&[("a", json!("x{{ a }}"))]);
        let err = render_to_fixpoint(&env, "{{ a }}", &params).unwrap_err();
        assert!(matches!(err, GenError::NonConvergence(_)));
    }

    #[test]
    fn double_quote_escape_filter_is_registered() {
        let env = base_env();
        let params = params_from(&[("desc", json!("say \"hi\""))]);
        assert_eq!(
            render_to_fixpoint(&env, "{{ desc | double_quote_escape }}", &params).unwrap(),
            "say \\\"hi\\\""
        );
    }
}

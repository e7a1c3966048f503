//! Output synthesis: maps finalized tests to concrete files on disk.
//!
//! Also hosts the run driver, `generate_all`, which sequences loading,
//! expansion, finalization and emission in a fixed order. Emission order is
//! observable (progress lines, uniqueness registration), so nothing here
//! may be parallelized or reordered.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use minijinja::Environment;
use serde_json::{json, Value};

use crate::error::GenError;
use crate::finalize::{self, ResolvedTest};
use crate::models::{name_of, CanvasType, Params, TemplateType};
use crate::output::{self, OutputPaths};
use crate::raster::{DrawingRenderer, ScriptRenderer};
use crate::registry::UsedTests;
use crate::template::{self, render_file};
use crate::variants;

/// Well-known pre-existing reference images for the `green` and `clear`
/// expected-output shortcuts.
const GREEN_IMAGE: &str = "/images/green-100x50.png";
const CLEAR_IMAGE: &str = "/images/clear-100x50.png";

fn with_canvas_type(params: &Params, canvas_type: CanvasType) -> Params {
    let mut params = params.clone();
    params.insert("canvas_type".to_string(), json!(canvas_type.as_str()));
    params
}

fn targets_offscreen(test: &ResolvedTest) -> bool {
    test.canvas_types.contains(&CanvasType::OffscreenCanvas)
        || test.canvas_types.contains(&CanvasType::Worker)
}

fn write_reference_test(
    env: &Environment,
    test: &ResolvedTest,
    output_files: &OutputPaths,
) -> Result<(), GenError> {
    let params = &test.params;
    if test.canvas_types.contains(&CanvasType::HtmlCanvas) {
        let html_params = with_canvas_type(params, CanvasType::HtmlCanvas);
        fs::write(
            output_files.element_file(".html"),
            render_file(env, "reftest_element.html", &html_params)?,
        )?;
    }
    if test.canvas_types.contains(&CanvasType::OffscreenCanvas) {
        let offscreen_params = with_canvas_type(params, CanvasType::OffscreenCanvas);
        fs::write(
            output_files.offscreen_file(".html"),
            render_file(env, "reftest_offscreen.html", &offscreen_params)?,
        )?;
    }
    if test.canvas_types.contains(&CanvasType::Worker) {
        let worker_params = with_canvas_type(params, CanvasType::Worker);
        fs::write(
            output_files.offscreen_file(".w.html"),
            render_file(env, "reftest_worker.html", &worker_params)?,
        )?;
    }

    // The comparison target: the reference script takes the place of the
    // test code. A JS reference renders on a canvas page; an HTML reference
    // is a plain document.
    let js_reference = params.get("reference").and_then(Value::as_str).unwrap_or("");
    let html_reference = params.get("html_reference").and_then(Value::as_str).unwrap_or("");
    let mut reference_params = params.clone();
    reference_params.insert("is_test_reference".to_string(), json!(true));
    reference_params.insert(
        "code".to_string(),
        json!(if js_reference.is_empty() { html_reference } else { js_reference }),
    );
    let reference_template =
        if js_reference.is_empty() { "reftest.html" } else { "reftest_element.html" };

    if test.canvas_types.contains(&CanvasType::HtmlCanvas) {
        fs::write(
            output_files.element_file("-expected.html"),
            render_file(env, reference_template, &reference_params)?,
        )?;
    }
    if targets_offscreen(test) {
        fs::write(
            output_files.offscreen_file("-expected.html"),
            render_file(env, reference_template, &reference_params)?,
        )?;
    }
    Ok(())
}

fn write_testharness_test(
    env: &Environment,
    test: &ResolvedTest,
    output_files: &OutputPaths,
) -> Result<(), GenError> {
    let params = &test.params;
    if test.canvas_types.contains(&CanvasType::HtmlCanvas) {
        let html_params = with_canvas_type(params, CanvasType::HtmlCanvas);
        fs::write(
            output_files.element_file(".html"),
            render_file(env, "testharness_element.html", &html_params)?,
        )?;
    }
    if test.canvas_types.contains(&CanvasType::OffscreenCanvas) {
        let offscreen_params = with_canvas_type(params, CanvasType::OffscreenCanvas);
        fs::write(
            output_files.offscreen_file(".html"),
            render_file(env, "testharness_offscreen.html", &offscreen_params)?,
        )?;
    }
    if test.canvas_types.contains(&CanvasType::Worker) {
        let worker_params = with_canvas_type(params, CanvasType::Worker);
        fs::write(
            output_files.offscreen_file(".worker.js"),
            render_file(env, "testharness_worker.js", &worker_params)?,
        )?;
    }
    Ok(())
}

/// Rasterize the expected image for a test, if it declares one, and record
/// the image's relative path in the parameter set as `expected_img`.
///
/// The `green` and `clear` shortcuts map to fixed pre-existing images; any
/// other value is a drawing script handed to `renderer`.
pub fn generate_expected_image(
    renderer: &dyn DrawingRenderer,
    test: &mut ResolvedTest,
    output_dirs: &OutputPaths,
) -> Result<(), GenError> {
    let Some(expected) = test.params.get("expected").and_then(Value::as_str).map(str::to_string)
    else {
        return Ok(());
    };
    let name = test.name().to_string();

    match expected.as_str() {
        "green" => {
            test.params.insert("expected_img".to_string(), json!(GREEN_IMAGE));
            return Ok(());
        }
        "clear" => {
            test.params.insert("expected_img".to_string(), json!(CLEAR_IMAGE));
            return Ok(());
        }
        _ => {}
    }

    if expected.contains(';') {
        eprintln!("Warning: found semicolon in {name}");
    }

    let image = renderer.rasterize(&expected, &name)?;
    let output_paths = output_dirs.sub_path(&name);
    if test.canvas_types.contains(&CanvasType::HtmlCanvas) {
        output::save_png(&image, &output_paths.element_file(".png"))?;
    }
    if targets_offscreen(test) {
        output::save_png(&image, &output_paths.offscreen_file(".png"))?;
    }
    test.params.insert("expected_img".to_string(), json!(format!("{name}.png")));
    Ok(())
}

/// Write every page file for a finalized test.
pub fn generate_test(
    env: &Environment,
    test: &ResolvedTest,
    output_dirs: &OutputPaths,
) -> Result<(), GenError> {
    let output_files = output_dirs.sub_path(test.file_name());
    match test.template_type {
        TemplateType::Reference | TemplateType::HtmlReference => {
            write_reference_test(env, test, &output_files)
        }
        TemplateType::Testharness => write_testharness_test(env, test, &output_files),
    }
}

/// Everything `generate_all` needs to run.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    /// Directory containing `*.yaml` test definition files.
    pub yaml_dir: PathBuf,
    /// YAML file mapping test-name prefixes to output subdirectories.
    pub name_to_dir: PathBuf,
    /// Directory holding the page templates.
    pub templates_dir: PathBuf,
    /// Output directory for element-hosted tests.
    pub element_out: PathBuf,
    /// Output directory for offscreen-hosted tests.
    pub offscreen_out: PathBuf,
}

fn load_tests(yaml_dir: &Path) -> Result<Vec<Params>, GenError> {
    let mut files: Vec<PathBuf> = fs::read_dir(yaml_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().map_or(false, |ext| ext == "yaml"))
        .collect();
    files.sort();

    let mut tests = Vec::new();
    for file in files {
        let text = fs::read_to_string(&file)?;
        let entries: Vec<Value> = serde_yaml::from_str(&text).map_err(|e| {
            GenError::definition(format!("{}: {e}", file.display()))
        })?;
        for entry in entries {
            let Some(test) = entry.as_object() else {
                return Err(GenError::definition(format!(
                    "{}: every entry must be a mapping",
                    file.display()
                )));
            };
            if test.contains_key("DISABLED") {
                continue;
            }
            if test.contains_key("meta") {
                eprintln!("Warning: skipping meta entry in {}", file.display());
                continue;
            }
            tests.push(test.clone());
        }
    }
    Ok(tests)
}

/// Run the whole generation pipeline: load, expand, finalize, emit.
///
/// Fail-fast: the first definition error aborts the run. Files written
/// before the failure stay on disk; there is no rollback.
pub fn generate_all(config: &GenerateConfig) -> Result<(), GenError> {
    let name_to_sub_dir: HashMap<String, String> =
        serde_yaml::from_str(&fs::read_to_string(&config.name_to_dir)?)?;

    let env = template::build_env(&config.templates_dir);
    let output_dirs = OutputPaths::new(&config.element_out, &config.offscreen_out);
    output::ensure_output_dirs(&output_dirs, name_to_sub_dir.values())?;

    let tests = load_tests(&config.yaml_dir)?;
    let renderer = ScriptRenderer;
    let mut used_tests = UsedTests::new();

    for test in tests {
        println!("{}", name_of(&test));
        finalize::validate_test(&test)?;
        let test = finalize::add_default_params(&test);
        let base_name = name_of(&test).to_string();

        for variant in variants::expand_variants(&test)? {
            let mut resolved = finalize::finalize(&env, variant)?;
            if resolved.name() != base_name {
                println!("  {}", resolved.name());
            }

            let sub_dir = output::test_sub_dir(resolved.file_name(), &name_to_sub_dir)?;
            let output_sub_dirs = output_dirs.sub_path(sub_dir);

            used_tests.check_and_register(resolved.name(), &resolved.canvas_types)?;
            generate_expected_image(&renderer, &mut resolved, &output_sub_dirs)?;
            generate_test(&env, &resolved, &output_sub_dirs)?;
        }
    }

    println!();
    Ok(())
}

//! Rasterization of expected-output drawing scripts.
//!
//! Reference tests describe their expected pixels with a small declarative
//! drawing script in the `expected:` field. The synthesizer only needs a
//! narrow "script in, pixels out" contract, expressed by
//! [`DrawingRenderer`]; [`ScriptRenderer`] is the built-in interpreter.
//!
//! Script format, one command per line (`#` starts a comment):
//!
//! ```text
//! size 100 50
//! fill 0 1 0 1
//! rect 20 10 60 30 1 0 0 1
//! ```
//!
//! Color channels are floats in 0..1. `size` resets the surface and
//! defaults to 100x50 when omitted.

use image::{Rgba, RgbaImage};

use crate::error::GenError;

/// Narrow contract for turning an `expected:` drawing script into pixels.
pub trait DrawingRenderer {
    /// Rasterize `script` for the test `name` (used in error messages).
    fn rasterize(&self, script: &str, name: &str) -> Result<RgbaImage, GenError>;
}

/// Interpreter for the declarative drawing language used in `expected:`
/// blocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptRenderer;

const DEFAULT_WIDTH: u32 = 100;
const DEFAULT_HEIGHT: u32 = 50;

fn channel(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn parse_args<const N: usize>(
    args: &[&str],
    name: &str,
    line_number: usize,
) -> Result<[f64; N], GenError> {
    if args.len() != N {
        return Err(GenError::definition(format!(
            "test {name}: expected {N} arguments on drawing script line {line_number}, \
             got {}",
            args.len()
        )));
    }
    let mut values = [0.0; N];
    for (slot, arg) in values.iter_mut().zip(args) {
        *slot = arg.parse().map_err(|_| {
            GenError::definition(format!(
                "test {name}: invalid number \"{arg}\" on drawing script line {line_number}"
            ))
        })?;
    }
    Ok(values)
}

impl DrawingRenderer for ScriptRenderer {
    fn rasterize(&self, script: &str, name: &str) -> Result<RgbaImage, GenError> {
        let mut image =
            RgbaImage::from_pixel(DEFAULT_WIDTH, DEFAULT_HEIGHT, Rgba([0, 0, 0, 0]));

        for (index, raw_line) in script.lines().enumerate() {
            let line_number = index + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let command = parts.next().unwrap_or_default();
            let args: Vec<&str> = parts.collect();
            match command {
                "size" => {
                    let [width, height] = parse_args::<2>(&args, name, line_number)?;
                    if width < 1.0 || height < 1.0 {
                        return Err(GenError::definition(format!(
                            "test {name}: invalid surface size on line {line_number}"
                        )));
                    }
                    image = RgbaImage::from_pixel(
                        width as u32,
                        height as u32,
                        Rgba([0, 0, 0, 0]),
                    );
                }
                "fill" => {
                    let [r, g, b, a] = parse_args::<4>(&args, name, line_number)?;
                    let pixel = Rgba([channel(r), channel(g), channel(b), channel(a)]);
                    for p in image.pixels_mut() {
                        *p = pixel;
                    }
                }
                "rect" => {
                    let [x, y, w, h, r, g, b, a] = parse_args::<8>(&args, name, line_number)?;
                    let pixel = Rgba([channel(r), channel(g), channel(b), channel(a)]);
                    let x0 = x.max(0.0) as u32;
                    let y0 = y.max(0.0) as u32;
                    let x1 = ((x + w).max(0.0) as u32).min(image.width());
                    let y1 = ((y + h).max(0.0) as u32).min(image.height());
                    for py in y0..y1 {
                        for px in x0..x1 {
                            image.put_pixel(px, py, pixel);
                        }
                    }
                }
                other => {
                    return Err(GenError::definition(format!(
                        "test {name}: unknown drawing command \"{other}\" on line {line_number}"
                    )));
                }
            }
        }

        Ok(image)
    }
}

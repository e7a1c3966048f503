//! Output path computation, directory preparation, and PNG writing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::error::GenError;

/// Paired output locations: one base path for element-hosted files, one for
/// offscreen-hosted files.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub element: PathBuf,
    pub offscreen: PathBuf,
}

impl OutputPaths {
    pub fn new(element: impl Into<PathBuf>, offscreen: impl Into<PathBuf>) -> Self {
        Self { element: element.into(), offscreen: offscreen.into() }
    }

    /// A new pair with `sub` appended to both sides.
    pub fn sub_path(&self, sub: &str) -> OutputPaths {
        OutputPaths { element: self.element.join(sub), offscreen: self.offscreen.join(sub) }
    }

    /// The element-side path with a file suffix appended (e.g. `.html`,
    /// `-expected.html`).
    pub fn element_file(&self, suffix: &str) -> PathBuf {
        PathBuf::from(format!("{}{suffix}", self.element.display()))
    }

    /// The offscreen-side path with a file suffix appended.
    pub fn offscreen_file(&self, suffix: &str) -> PathBuf {
        PathBuf::from(format!("{}{suffix}", self.offscreen.display()))
    }
}

/// Find the output subdirectory for a test name by longest matching prefix.
///
/// Every test must have a mapping; a miss is a hard error rather than a
/// silently misplaced file.
pub fn test_sub_dir<'a>(
    name: &str,
    name_to_sub_dir: &'a HashMap<String, String>,
) -> Result<&'a str, GenError> {
    let mut prefixes: Vec<&String> = name_to_sub_dir.keys().collect();
    prefixes.sort_by_key(|prefix| std::cmp::Reverse(prefix.len()));
    for prefix in prefixes {
        if name.starts_with(prefix.as_str()) {
            return Ok(&name_to_sub_dir[prefix]);
        }
    }
    Err(GenError::definition(format!(
        "test \"{name}\" has no defined target directory mapping"
    )))
}

/// Create the element and offscreen output directories plus every mapped
/// subdirectory underneath them.
pub fn ensure_output_dirs<'a>(
    output_dirs: &OutputPaths,
    sub_dirs: impl Iterator<Item = &'a String>,
) -> Result<(), GenError> {
    std::fs::create_dir_all(&output_dirs.element)?;
    std::fs::create_dir_all(&output_dirs.offscreen)?;
    for sub_dir in sub_dirs {
        std::fs::create_dir_all(output_dirs.element.join(sub_dir))?;
        std::fs::create_dir_all(output_dirs.offscreen.join(sub_dir))?;
    }
    Ok(())
}

/// Save an RGBA image to a PNG file, creating parent directories as needed.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), GenError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    image.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn longest_prefix_wins() {
        let map = mapping(&[("2d", "2d-tests"), ("2d.fill", "fill-tests")]);
        assert_eq!(test_sub_dir("2d.fill.style", &map).unwrap(), "fill-tests");
        assert_eq!(test_sub_dir("2d.stroke", &map).unwrap(), "2d-tests");
    }

    #[test]
    fn missing_mapping_is_a_hard_error() {
        let map = mapping(&[("2d", "2d-tests")]);
        let err = test_sub_dir("webgl.clear", &map).unwrap_err();
        assert!(matches!(err, GenError::Definition(_)));
    }

    #[test]
    fn sub_path_extends_both_sides() {
        let paths = OutputPaths::new("element", "offscreen");
        let sub = paths.sub_path("fill").sub_path("t");
        assert_eq!(sub.element, PathBuf::from("element/fill/t"));
        assert_eq!(sub.offscreen, PathBuf::from("offscreen/fill/t"));
        assert_eq!(sub.element_file(".html"), PathBuf::from("element/fill/t.html"));
        assert_eq!(
            sub.offscreen_file("-expected.html"),
            PathBuf::from("offscreen/fill/t-expected.html")
        );
    }

    #[test]
    fn save_png_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deep/out.png");
        let image = RgbaImage::from_pixel(2, 2, image::Rgba([0, 255, 0, 255]));
        save_png(&image, &path).unwrap();
        assert!(path.exists());
    }
}

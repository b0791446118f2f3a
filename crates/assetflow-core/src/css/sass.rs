//! SCSS compilation using grass.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Output formatting of the Sass compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SassStyle {
    /// One declaration per line, two-space indentation.
    #[default]
    Expanded,
    /// No insignificant whitespace.
    Compressed,
}

/// Sass compilation options.
#[derive(Debug, Clone, Default)]
pub struct SassOptions {
    pub style: SassStyle,
    /// Source file path (for error messages and imports).
    pub filename: Option<PathBuf>,
}

/// Compile SCSS source to CSS.
pub fn compile_sass(source: &str, options: &SassOptions) -> Result<String, SassError> {
    let mut grass_options = grass::Options::default().style(match options.style {
        SassStyle::Expanded => grass::OutputStyle::Expanded,
        SassStyle::Compressed => grass::OutputStyle::Compressed,
    });

    // Imports resolve relative to the file being compiled.
    if let Some(parent) = options.filename.as_deref().and_then(Path::parent) {
        grass_options = grass_options.load_path(parent);
    }

    grass::from_string(source.to_string(), &grass_options).map_err(|e| {
        let origin = options
            .filename
            .as_deref()
            .map_or_else(|| "input.scss".to_string(), |p| p.display().to_string());
        SassError::Compile(format!("{origin}: {e}"))
    })
}

/// Read and compile an SCSS file.
pub fn compile_sass_file(path: &Path, style: SassStyle) -> Result<String, SassError> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| SassError::Io(format!("Failed to read {}: {}", path.display(), e)))?;

    let options = SassOptions {
        style,
        filename: Some(path.to_path_buf()),
    };

    compile_sass(&source, &options)
}

/// Partials (`_name.scss`) are only compiled through the files that import them.
#[must_use]
pub fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

/// Sass compilation error.
#[derive(Debug, Error)]
pub enum SassError {
    #[error("Sass IO error: {0}")]
    Io(String),
    #[error("Sass compile error: {0}")]
    Compile(String),
}

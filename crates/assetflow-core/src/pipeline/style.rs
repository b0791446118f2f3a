//! SCSS → CSS.

use super::{PipelineError, Rendered};
use crate::config::Mode;
use crate::css::sass::{self, SassStyle};
use crate::css::{process_css, CssOptions};
use crate::paths::CategoryPaths;
use crate::sourcemap::{self, CommentStyle, MapPlacement};
use std::path::Path;

/// Style pipeline settings for one mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleOptions {
    pub sass_style: SassStyle,
    pub autoprefixer: bool,
    pub merge_rules: bool,
    pub consolidate_media: bool,
    pub minify: bool,
    pub sourcemap: bool,
}

impl StyleOptions {
    #[must_use]
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Development => Self {
                sass_style: SassStyle::Expanded,
                autoprefixer: true,
                merge_rules: true,
                consolidate_media: true,
                minify: false,
                sourcemap: true,
            },
            Mode::Production => Self {
                sass_style: SassStyle::Compressed,
                autoprefixer: true,
                merge_rules: true,
                consolidate_media: true,
                minify: true,
                sourcemap: false,
            },
        }
    }
}

/// Compile one stylesheet. Nothing is written.
pub fn render(
    source: &Path,
    paths: &CategoryPaths,
    options: &StyleOptions,
) -> Result<Rendered, PipelineError> {
    let source_name = paths.source_name(source);
    let output_path = paths.output_for(source, "css");

    let compiled = sass::compile_sass_file(source, options.sass_style).map_err(|e| {
        PipelineError::Sass {
            path: source.to_path_buf(),
            source: e,
        }
    })?;

    let css_options = CssOptions {
        minify: options.minify,
        autoprefixer: options.autoprefixer,
        merge_rules: options.merge_rules,
        consolidate_media: options.consolidate_media,
        normalize_charset: true,
        sourcemap: options.sourcemap,
        filename: Some(source_name.clone()),
        targets: None,
    };
    let processed = process_css(&compiled, &css_options).map_err(|e| PipelineError::Css {
        path: source.to_path_buf(),
        source: e,
    })?;

    let Some(raw_map) = processed.map else {
        return Ok(Rendered {
            output_path,
            code: processed.code,
            map_file: None,
        });
    };

    let file_name = output_file_name(&output_path);
    let map = sourcemap::finalize(&raw_map, &file_name, &source_name, &paths.map_root).map_err(
        |e| PipelineError::SourceMap {
            path: source.to_path_buf(),
            source: e,
        },
    )?;
    let placement = MapPlacement {
        dist_dir: &paths.dist_dir,
        map_dir: paths.map_dir.as_deref(),
        style: CommentStyle::Css,
    };
    let attached = sourcemap::attach(&processed.code, &map, &output_path, placement);

    Ok(Rendered {
        output_path,
        code: attached.code,
        map_file: attached.map_file,
    })
}

pub(super) fn output_file_name(output_path: &Path) -> String {
    output_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

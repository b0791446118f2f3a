//! ES6 / TypeScript → JS.

use super::style::output_file_name;
use super::{PipelineError, Rendered};
use crate::compiler::{CompilerBackend, TranspileSpec};
use crate::config::Mode;
use crate::paths::CategoryPaths;
use crate::sourcemap::{self, CommentStyle, MapPlacement};
use std::path::Path;

/// Script pipeline settings for one mode.
///
/// Both modes lower syntax for `targets`; production also minifies and
/// drops the sourcemap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOptions {
    /// Browserslist query; `None` means ES5.
    pub targets: Option<String>,
    pub minify: bool,
    pub sourcemap: bool,
}

impl ScriptOptions {
    #[must_use]
    pub fn for_mode(mode: Mode, targets: Option<String>) -> Self {
        match mode {
            Mode::Development => Self {
                targets,
                minify: false,
                sourcemap: true,
            },
            Mode::Production => Self {
                targets,
                minify: true,
                sourcemap: false,
            },
        }
    }
}

/// Transpile one script. Nothing is written.
pub fn render(
    backend: &dyn CompilerBackend,
    source: &Path,
    paths: &CategoryPaths,
    options: &ScriptOptions,
) -> Result<Rendered, PipelineError> {
    let output_path = paths.output_for(source, "js");
    let text = std::fs::read_to_string(source).map_err(|e| PipelineError::Io {
        path: source.to_path_buf(),
        source: e,
    })?;

    let spec = TranspileSpec::new(source, &output_path)
        .with_targets(options.targets.clone())
        .with_minify(options.minify)
        .with_sourcemaps(options.sourcemap);

    let output = backend
        .transpile(&spec, &text)
        .map_err(|e| PipelineError::Compile {
            path: source.to_path_buf(),
            source: e,
        })?;

    let Some(raw_map) = output.source_map else {
        return Ok(Rendered {
            output_path,
            code: output.code,
            map_file: None,
        });
    };

    let map = sourcemap::finalize(
        &raw_map,
        &output_file_name(&output_path),
        &paths.source_name(source),
        &paths.map_root,
    )
    .map_err(|e| PipelineError::SourceMap {
        path: source.to_path_buf(),
        source: e,
    })?;
    let placement = MapPlacement {
        dist_dir: &paths.dist_dir,
        map_dir: paths.map_dir.as_deref(),
        style: CommentStyle::Js,
    };
    let attached = sourcemap::attach(&output.code, &map, &output_path, placement);

    Ok(Rendered {
        output_path,
        code: attached.code,
        map_file: attached.map_file,
    })
}

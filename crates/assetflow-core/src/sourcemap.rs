//! Source map finalization and attachment.
//!
//! Compilers hand back a raw v3 map; this module rewrites its `file`,
//! `sources` and `sourceRoot` fields for the output location, then either
//! inlines it as a data URL or places it in a `.map` file under the output
//! directory.
//!
//! Style maps are produced by lightningcss from the Sass compiler's CSS, so
//! their positions address that compiled text even though `sources` names the
//! `.scss` entry file.

use crate::paths::{relative_path, to_slash};
use base64::Engine;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Comment syntax for the `sourceMappingURL` trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// `/*# sourceMappingURL=... */`
    Css,
    /// `//# sourceMappingURL=...`
    Js,
}

impl CommentStyle {
    fn render(self, url: &str) -> String {
        match self {
            Self::Css => format!("/*# sourceMappingURL={url} */"),
            Self::Js => format!("//# sourceMappingURL={url}"),
        }
    }
}

/// Where the map for one output file ends up.
#[derive(Debug, Clone, Copy)]
pub struct MapPlacement<'a> {
    /// Output root of the category.
    pub dist_dir: &'a Path,
    /// Map directory relative to `dist_dir`; `None` inlines the map.
    pub map_dir: Option<&'a str>,
    pub style: CommentStyle,
}

/// Output code with its map attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attached {
    /// Code ending in a `sourceMappingURL` comment.
    pub code: String,
    /// External map file and its contents; `None` for inline maps.
    pub map_file: Option<(PathBuf, String)>,
}

/// Source map error.
#[derive(Debug, Error)]
pub enum SourceMapError {
    #[error("Invalid source map JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Source map is not a JSON object")]
    NotAnObject,
}

/// Rewrite a raw map for its final location.
///
/// `file` is the output file name, `source` the source path relative to the
/// category's source directory, and `source_root` the source directory
/// relative to the output directory.
pub fn finalize(
    raw: &str,
    file: &str,
    source: &str,
    source_root: &str,
) -> Result<String, SourceMapError> {
    let mut map: Value = serde_json::from_str(raw)?;
    let object = map.as_object_mut().ok_or(SourceMapError::NotAnObject)?;

    let source_count = object
        .get("sources")
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
        .max(1);

    object.insert("version".to_string(), Value::from(3));
    object.insert("file".to_string(), Value::from(file));
    object.insert(
        "sources".to_string(),
        Value::Array(vec![Value::from(source); source_count]),
    );
    object.insert("sourceRoot".to_string(), Value::from(source_root));
    object.remove("sourcesContent");

    Ok(serde_json::to_string(&map)?)
}

/// Append the map to `code` for the output at `output_path`.
#[must_use]
pub fn attach(code: &str, map: &str, output_path: &Path, placement: MapPlacement<'_>) -> Attached {
    let mut out = code.trim_end().to_string();
    out.push('\n');

    match placement.map_dir {
        None => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(map);
            let url = format!("data:application/json;charset=utf8;base64,{encoded}");
            out.push_str(&placement.style.render(&url));
            out.push('\n');
            Attached {
                code: out,
                map_file: None,
            }
        }
        Some(map_dir) => {
            let map_path = external_map_path(output_path, placement.dist_dir, map_dir);
            let output_dir = output_path.parent().unwrap_or(placement.dist_dir);
            let url = to_slash(&relative_path(output_dir, &map_path));
            out.push_str(&placement.style.render(&url));
            out.push('\n');
            Attached {
                code: out,
                map_file: Some((map_path, map.to_string())),
            }
        }
    }
}

/// `<dist>/<map_dir>/<output relative to dist>.map`
#[must_use]
pub fn external_map_path(output_path: &Path, dist_dir: &Path, map_dir: &str) -> PathBuf {
    let rel = output_path.strip_prefix(dist_dir).unwrap_or(output_path);
    let mut name = dist_dir.join(map_dir).join(rel).into_os_string();
    name.push(".map");
    PathBuf::from(name)
}

//! CSS post-processing using lightningcss.
//!
//! Runs on the Sass compiler's output:
//! - Autoprefixer (vendor prefixes for the browser targets)
//! - Rule merging
//! - Media query consolidation
//! - Charset normalization
//! - Minification
//! - Source maps
//!
//! lightningcss only ever sees the Sass compiler's output, so map positions
//! address that intermediate CSS. The map's `sources` entry is later renamed
//! to the entry stylesheet by [`crate::sourcemap::finalize`].

pub mod media;
pub mod sass;

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use thiserror::Error;

/// CSS processing options.
#[derive(Debug, Clone, Default)]
pub struct CssOptions {
    /// Print without insignificant whitespace.
    pub minify: bool,
    /// Add vendor prefixes for the browser targets.
    pub autoprefixer: bool,
    /// Merge adjacent and duplicate rules.
    pub merge_rules: bool,
    /// Fold identical `@media` blocks and sort them mobile-first.
    pub consolidate_media: bool,
    /// Emit `@charset "UTF-8";` only when the output needs it.
    pub normalize_charset: bool,
    /// Produce a source map.
    pub sourcemap: bool,
    /// Source file name (for error messages and the source map).
    pub filename: Option<String>,
    /// Browser targets for autoprefixer (defaults to reasonable coverage).
    pub targets: Option<Browsers>,
}

/// Result of CSS processing.
#[derive(Debug, Clone)]
pub struct CssResult {
    /// The transformed CSS code.
    pub code: String,
    /// Raw source map JSON, when requested.
    pub map: Option<String>,
}

/// Process CSS with lightningcss.
///
/// ```ignore
/// let options = CssOptions {
///     minify: true,
///     autoprefixer: true,
///     ..Default::default()
/// };
/// let result = process_css(".foo { user-select: none; }", &options)?;
/// ```
pub fn process_css(source: &str, options: &CssOptions) -> Result<CssResult, CssError> {
    let filename = options.filename.as_deref().unwrap_or("input.css");

    let parser_options = ParserOptions {
        filename: filename.to_string(),
        ..ParserOptions::default()
    };

    // Compressed Sass output marks non-ASCII text with a byte order mark.
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);

    let mut stylesheet = StyleSheet::parse(source, parser_options)
        .map_err(|e| CssError::Parse(format!("{filename}: {e}")))?;

    if options.consolidate_media {
        media::consolidate_media_queries(&mut stylesheet.rules);
    }

    let targets = if options.autoprefixer {
        Targets::from(options.targets.unwrap_or_else(default_browser_targets))
    } else {
        Targets::default()
    };

    // Merging and prefixing both happen in lightningcss's minify pass.
    if options.merge_rules || options.autoprefixer {
        stylesheet
            .minify(MinifyOptions {
                targets,
                ..Default::default()
            })
            .map_err(|e| CssError::Transform(format!("{filename}: {e}")))?;
    }

    let mut source_map = options.sourcemap.then(|| SourceMap::new("/"));

    let output = stylesheet
        .to_css(PrinterOptions {
            minify: options.minify,
            targets,
            source_map: source_map.as_mut(),
            ..Default::default()
        })
        .map_err(|e| CssError::Print(format!("{filename}: {e}")))?;

    let mut code = output.code;
    if options.normalize_charset {
        let normalized = normalize_charset(&code, options.minify);
        let added_lines = normalized
            .matches('\n')
            .count()
            .saturating_sub(code.matches('\n').count());
        if let Some(map) = source_map.as_mut() {
            map.offset_lines(0, i64::try_from(added_lines).unwrap_or_default())
                .map_err(|e| CssError::Print(format!("{filename}: source map: {e:?}")))?;
        }
        code = normalized;
    }

    let map = match source_map.as_mut() {
        Some(map) => Some(
            map.to_json(None)
                .map_err(|e| CssError::Print(format!("{filename}: source map: {e:?}")))?,
        ),
        None => None,
    };

    Ok(CssResult { code, map })
}

/// Keep a single leading `@charset "UTF-8";` when the stylesheet contains
/// non-ASCII text, and none otherwise.
#[must_use]
pub fn normalize_charset(css: &str, minify: bool) -> String {
    let mut body = css.to_string();
    while let Some(start) = body.find("@charset") {
        match body[start..].find(';') {
            Some(end) => body.replace_range(start..=start + end, ""),
            None => break,
        }
    }
    let body = body.trim_start_matches(|c: char| c.is_whitespace() || c == '\u{feff}');

    if body.is_ascii() {
        return body.to_string();
    }

    let separator = if minify { "" } else { "\n" };
    format!("@charset \"UTF-8\";{separator}{body}")
}

/// Default browser targets for autoprefixer.
///
/// Chrome 80+, Firefox 75+, Safari 13+, Edge 80+.
fn default_browser_targets() -> Browsers {
    Browsers {
        chrome: Some(80 << 16),
        firefox: Some(75 << 16),
        safari: Some(13 << 16),
        edge: Some(80 << 16),
        ..Default::default()
    }
}

/// CSS processing error.
#[derive(Debug, Error)]
pub enum CssError {
    #[error("CSS parse error: {0}")]
    Parse(String),
    #[error("CSS transform error: {0}")]
    Transform(String),
    #[error("CSS print error: {0}")]
    Print(String),
}

//! Asset pipelines.
//!
//! A [`Pipeline`] expands its category's glob, renders every matching file
//! (in parallel with rayon), writes the results and reports failures to a
//! [`Notifier`]. A failing file never aborts the run: the remaining files are
//! still written and the previous output of the failed file stays in place.

pub mod script;
pub mod style;

pub use script::ScriptOptions;
pub use style::StyleOptions;

use crate::compiler::{CompilerBackend, CompilerError, SwcBackend};
use crate::config::{Config, Mode};
use crate::css::{sass::SassError, CssError};
use crate::error::Error;
use crate::paths::{relative_path, to_slash, AssetPaths, CategoryPaths};
use crate::reload::ReloadHandle;
use crate::report::Notifier;
use crate::sourcemap::SourceMapError;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// The three pipeline categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    Style,
    Es6,
    TypeScript,
}

impl PipelineKind {
    pub const ALL: [PipelineKind; 3] = [Self::Style, Self::Es6, Self::TypeScript];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Style => "style",
            Self::Es6 => "es6",
            Self::TypeScript => "typescript",
        }
    }
}

impl std::fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-file pipeline failure.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    Sass {
        path: PathBuf,
        #[source]
        source: SassError,
    },

    #[error("{}: {source}", path.display())]
    Css {
        path: PathBuf,
        #[source]
        source: CssError,
    },

    #[error("{}: {source}", path.display())]
    Compile {
        path: PathBuf,
        #[source]
        source: CompilerError,
    },

    #[error("{}: {source}", path.display())]
    SourceMap {
        path: PathBuf,
        #[source]
        source: SourceMapError,
    },
}

/// One rendered output, not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub output_path: PathBuf,
    pub code: String,
    /// External sourcemap file and contents.
    pub map_file: Option<(PathBuf, String)>,
}

impl Rendered {
    fn write(&self) -> std::io::Result<()> {
        write_file(&self.output_path, &self.code)?;
        if let Some((path, map)) = &self.map_file {
            write_file(path, map)?;
        }
        Ok(())
    }
}

fn write_file(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Output files written (code files only, not maps).
    pub written: Vec<PathBuf>,
    /// Notification text of every failure.
    pub errors: Vec<String>,
}

impl PipelineReport {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone)]
enum Variant {
    Style(StyleOptions),
    Script(ScriptOptions),
}

/// A pipeline bound to one category and mode.
#[derive(Clone)]
pub struct Pipeline {
    kind: PipelineKind,
    mode: Mode,
    paths: CategoryPaths,
    /// Site root; pushed stylesheet URLs are relative to it.
    site_root: PathBuf,
    variant: Variant,
    backend: Arc<dyn CompilerBackend>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("kind", &self.kind)
            .field("mode", &self.mode)
            .field("glob", &self.paths.glob)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Pipeline {
    /// The `kind` pipeline for the config's mode.
    #[must_use]
    pub fn new(kind: PipelineKind, config: &Config, paths: &AssetPaths) -> Self {
        let mode = config.mode;
        let (category, variant) = match kind {
            PipelineKind::Style => (
                paths.style.clone(),
                Variant::Style(StyleOptions::for_mode(mode)),
            ),
            PipelineKind::Es6 => (
                paths.es6.clone(),
                Variant::Script(ScriptOptions::for_mode(mode, config.targets.clone())),
            ),
            PipelineKind::TypeScript => (
                paths.tsc.clone(),
                Variant::Script(ScriptOptions::for_mode(mode, config.targets.clone())),
            ),
        };
        Self {
            kind,
            mode,
            paths: category,
            site_root: paths.root.clone(),
            variant,
            backend: Arc::new(SwcBackend::new()),
        }
    }

    /// Replace the script compiler.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn CompilerBackend>) -> Self {
        self.backend = backend;
        self
    }

    #[must_use]
    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub fn paths(&self) -> &CategoryPaths {
        &self.paths
    }

    /// Source files matched by the glob, sorted.
    ///
    /// Sass partials and TypeScript declaration files are never compiled on
    /// their own.
    pub fn sources(&self) -> Result<Vec<PathBuf>, Error> {
        let pattern = self.paths.glob.to_string_lossy().into_owned();
        let entries = glob::glob(&pattern).map_err(|source| Error::Glob {
            pattern: pattern.clone(),
            source,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .filter(|p| self.accepts(p))
            .collect();
        files.sort();
        Ok(files)
    }

    fn accepts(&self, path: &Path) -> bool {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        match self.kind {
            PipelineKind::Style => !crate::css::sass::is_partial(path),
            PipelineKind::TypeScript => !name.ends_with(".d.ts"),
            PipelineKind::Es6 => true,
        }
    }

    /// Render one file without writing it.
    pub fn render(&self, source: &Path) -> Result<Rendered, PipelineError> {
        match &self.variant {
            Variant::Style(options) => style::render(source, &self.paths, options),
            Variant::Script(options) => {
                script::render(self.backend.as_ref(), source, &self.paths, options)
            }
        }
    }

    /// Build every source file once.
    ///
    /// Failures go to `notifier` as `Error: <message>`. The style pipeline
    /// pushes the stylesheets it wrote through `reload`.
    pub fn run(&self, notifier: &dyn Notifier, reload: &ReloadHandle) -> PipelineReport {
        let started = Instant::now();
        let mut report = PipelineReport::default();

        let sources = match self.sources() {
            Ok(sources) => sources,
            Err(e) => {
                let message = format!("Error: {e}");
                notifier.error(&message);
                report.errors.push(message);
                return report;
            }
        };

        let results: Vec<(PathBuf, Result<PathBuf, PipelineError>)> = sources
            .par_iter()
            .map(|source| {
                let result = self.render(source).and_then(|rendered| {
                    rendered.write().map_err(|e| PipelineError::Io {
                        path: rendered.output_path.clone(),
                        source: e,
                    })?;
                    Ok(rendered.output_path)
                });
                (source.clone(), result)
            })
            .collect();

        for (source, result) in results {
            match result {
                Ok(output) => {
                    tracing::debug!(
                        pipeline = %self.kind,
                        source = %source.display(),
                        output = %output.display(),
                        "Wrote"
                    );
                    report.written.push(output);
                }
                Err(e) => {
                    let message = format!("Error: {e}");
                    notifier.error(&message);
                    report.errors.push(message);
                }
            }
        }

        if self.kind == PipelineKind::Style {
            reload.inject_css(
                report
                    .written
                    .iter()
                    .map(|p| to_slash(&relative_path(&self.site_root, p)))
                    .collect(),
            );
        }

        tracing::info!(
            pipeline = %self.kind,
            mode = %self.mode,
            written = report.written.len(),
            failed = report.errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pipeline finished"
        );
        report
    }
}

/// Run every pipeline once; used by `assetflow build`.
pub fn run_all(
    config: &Config,
    paths: &AssetPaths,
    notifier: &dyn Notifier,
    reload: &ReloadHandle,
) -> Vec<(PipelineKind, PipelineReport)> {
    PipelineKind::ALL
        .iter()
        .map(|&kind| (kind, Pipeline::new(kind, config, paths).run(notifier, reload)))
        .collect()
}

//! Transpilation specification types.

use std::path::PathBuf;

/// Source language of a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptSyntax {
    /// ECMAScript (ES6+).
    Es,
    /// TypeScript; types are stripped.
    TypeScript,
}

impl ScriptSyntax {
    /// Pick the syntax from a file extension.
    #[must_use]
    pub fn from_path(path: &std::path::Path) -> Self {
        let is_ts = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext.to_lowercase().as_str(), "ts" | "mts" | "cts"));
        if is_ts {
            Self::TypeScript
        } else {
            Self::Es
        }
    }
}

/// A compiler error message, optionally located in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub file: Option<PathBuf>,
    /// Line number (1-indexed).
    pub line: Option<u32>,
    /// Column number (1-indexed).
    pub column: Option<u32>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: None,
            line: None,
            column: None,
        }
    }

    /// Set the source location.
    #[must_use]
    pub fn with_location(mut self, file: PathBuf, line: u32, column: u32) -> Self {
        self.file = Some(file);
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

/// Transpilation specification for a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranspileSpec {
    /// Source file.
    pub input_path: PathBuf,
    /// Output file; its name goes into the sourcemap's `file`.
    pub output_path: PathBuf,
    /// Source language.
    pub syntax: ScriptSyntax,
    /// Produce a sourcemap alongside the code.
    pub sourcemaps: bool,
    /// Browserslist query the output must run on. `None` lowers every
    /// syntax feature down to ES5.
    pub targets: Option<String>,
    /// Compress and mangle the output.
    pub minify: bool,
}

impl TranspileSpec {
    /// Create a spec with the syntax taken from the input extension.
    #[must_use]
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        let input_path = input_path.into();
        Self {
            syntax: ScriptSyntax::from_path(&input_path),
            input_path,
            output_path: output_path.into(),
            sourcemaps: false,
            targets: None,
            minify: false,
        }
    }

    #[must_use]
    pub fn with_sourcemaps(mut self, sourcemaps: bool) -> Self {
        self.sourcemaps = sourcemaps;
        self
    }

    #[must_use]
    pub fn with_targets(mut self, targets: Option<String>) -> Self {
        self.targets = targets;
        self
    }

    #[must_use]
    pub fn with_minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }
}

/// Output of a transpilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranspileOutput {
    /// Generated JavaScript.
    pub code: String,
    /// Raw sourcemap JSON, when requested.
    pub source_map: Option<String>,
}

impl TranspileOutput {
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            source_map: None,
        }
    }

    #[must_use]
    pub fn with_source_map(mut self, map: impl Into<String>) -> Self {
        self.source_map = Some(map.into());
        self
    }
}

//! Compiler backend abstraction for script transpilation.
//!
//! The script pipelines never call SWC directly; they go through
//! [`CompilerBackend`] with a [`TranspileSpec`] describing one file.
//!
//! ```ignore
//! use assetflow_core::compiler::{CompilerBackend, SwcBackend, TranspileSpec};
//!
//! let backend = SwcBackend::new();
//! let spec = TranspileSpec::new("src/js/app.ts", "assets/js/app.js").with_sourcemaps(true);
//! let output = backend.transpile(&spec, &source)?;
//! ```

pub mod spec;
pub mod swc;

pub use spec::{Diagnostic, ScriptSyntax, TranspileOutput, TranspileSpec};
pub use swc::SwcBackend;

use thiserror::Error;

/// Error during compilation.
#[derive(Debug, Error)]
#[error("{code}: {message}{}", render_diagnostics(.diagnostics))]
pub struct CompilerError {
    /// Error code.
    pub code: &'static str,
    /// Human-readable error message.
    pub message: String,
    /// Compiler diagnostics (if available).
    pub diagnostics: Vec<Diagnostic>,
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    let mut out = String::new();
    for diag in diagnostics {
        out.push_str(&format!("\n  - {}", diag.message));
        if let (Some(file), Some(line), Some(col)) = (&diag.file, diag.line, diag.column) {
            out.push_str(&format!(" at {}:{}:{}", file.display(), line, col));
        }
    }
    out
}

impl CompilerError {
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            diagnostics: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    #[must_use]
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new("COMPILER_PARSE_ERROR", message)
    }

    #[must_use]
    pub fn transform_error(message: impl Into<String>) -> Self {
        Self::new("COMPILER_TRANSFORM_ERROR", message)
    }
}

/// Compiler backend trait for transpilation.
///
/// `Send + Sync` so one backend can serve every pipeline worker.
pub trait CompilerBackend: Send + Sync {
    /// Backend name (e.g. "swc").
    fn name(&self) -> &'static str;

    /// Transpile `source` according to `spec`.
    fn transpile(&self, spec: &TranspileSpec, source: &str) -> Result<TranspileOutput, CompilerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_compiler_error_display() {
        let error = CompilerError::parse_error("Unexpected token");
        assert!(error.to_string().contains("COMPILER_PARSE_ERROR"));
        assert!(error.to_string().contains("Unexpected token"));
    }

    #[test]
    fn test_compiler_error_with_diagnostics() {
        let diag = Diagnostic::error("Expected '}'")
            .with_location(PathBuf::from("src/js/app.ts"), 3, 9);
        let error = CompilerError::parse_error("Parse failed").with_diagnostics(vec![diag]);

        let display = error.to_string();
        assert!(display.contains("src/js/app.ts:3:9"));
        assert!(display.contains("Expected '}'"));
    }
}

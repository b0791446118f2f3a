//! SWC compiler backend implementation.
//!
//! - ES module and script parsing
//! - TypeScript type stripping
//! - Syntax lowering for a browserslist query (ES5 when none is given)
//! - Source map generation
//! - Minification (compress + mangle, top level kept for classic scripts)

#![allow(clippy::default_trait_access)]

use super::spec::ScriptSyntax;
use super::{CompilerBackend, CompilerError, Diagnostic, TranspileOutput, TranspileSpec};
use swc_ecma_ast::{
    AssignPat, BindingIdent, KeyValuePatProp, ObjectPatProp, Pat, PropName,
};
use swc_ecma_visit::{VisitMut, VisitMutWith};

/// SWC-based compiler backend.
///
/// `SwcBackend` is `Send + Sync`; each call to `transpile` builds its own
/// source map and globals, so calls are independent.
#[derive(Debug, Clone, Default)]
pub struct SwcBackend {
    _private: (),
}

impl SwcBackend {
    /// Create a new SWC backend.
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl CompilerBackend for SwcBackend {
    fn name(&self) -> &'static str {
        "swc"
    }

    fn transpile(
        &self,
        spec: &TranspileSpec,
        source: &str,
    ) -> Result<TranspileOutput, CompilerError> {
        compile_with_swc(spec, source)
    }
}

/// Resolve the browserslist query into per-browser versions.
///
/// No query yields empty versions, which preset-env treats as "any
/// browser" and lowers everything to ES5.
fn resolve_targets(
    targets: Option<&str>,
) -> Result<swc_ecma_preset_env::Versions, CompilerError> {
    use preset_env_base::query::{targets_to_versions, Query, Targets};

    let query = targets.map(|q| Targets::Query(Query::Single(q.to_string())));
    targets_to_versions(query).map_err(|e| {
        CompilerError::transform_error(format!(
            "Invalid targets `{}`: {e}",
            targets.unwrap_or_default()
        ))
    })
}

/// Rewrite `{ x }` / `{ x = 1 }` binding properties as `{ x: x }` /
/// `{ x: x = 1 }`.
///
/// The mangler only recognizes plain identifier patterns when deciding which
/// top-level names of a classic script to keep, so shorthand bindings have to
/// be spelled out first.
struct ExpandShorthandBindings;

impl VisitMut for ExpandShorthandBindings {
    fn visit_mut_object_pat_prop(&mut self, prop: &mut ObjectPatProp) {
        prop.visit_mut_children_with(self);

        let ObjectPatProp::Assign(assign) = prop else {
            return;
        };
        let binding = BindingIdent::from(assign.key.id.clone());
        let value = match assign.value.take() {
            Some(default) => Pat::Assign(AssignPat {
                span: assign.span,
                left: Box::new(Pat::Ident(binding)),
                right: default,
            }),
            None => Pat::Ident(binding),
        };
        *prop = ObjectPatProp::KeyValue(KeyValuePatProp {
            key: PropName::Ident(assign.key.id.clone().into()),
            value: Box::new(value),
        });
    }
}

fn compile_with_swc(spec: &TranspileSpec, source: &str) -> Result<TranspileOutput, CompilerError> {
    use swc_common::{
        comments::{Comments, SingleThreadedComments},
        sync::Lrc,
        FileName, Globals, Mark, SourceMap, Spanned, GLOBALS,
    };
    use swc_ecma_ast::{EsVersion, Program};
    use swc_ecma_codegen::{text_writer::JsWriter, Emitter};
    use swc_ecma_minifier::{
        optimize,
        option::{
            terser::{TerserCompressorOptions, TerserTopLevelOptions},
            ExtraOptions, MangleOptions, MinifyOptions,
        },
    };
    use swc_ecma_parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax, TsSyntax};
    use swc_ecma_preset_env::{preset_env, Config as PresetEnvConfig, Targets};
    use swc_ecma_transforms_base::{
        assumptions::Assumptions,
        feature::FeatureFlag,
        fixer::fixer,
        helpers::{inject_helpers, Helpers, HELPERS},
        hygiene::hygiene,
        resolver,
    };
    use swc_ecma_transforms_typescript::strip;
    use swc_ecma_visit::FoldWith;

    let versions = resolve_targets(spec.targets.as_deref())?;

    let cm: Lrc<SourceMap> = Default::default();

    let filename = spec
        .input_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("input.js");
    let fm = cm.new_source_file(
        Lrc::new(FileName::Custom(filename.to_string())),
        source.to_string(),
    );

    let is_ts = spec.syntax == ScriptSyntax::TypeScript;
    let syntax = if is_ts {
        Syntax::Typescript(TsSyntax {
            decorators: true,
            ..Default::default()
        })
    } else {
        Syntax::Es(EsSyntax {
            decorators: true,
            ..Default::default()
        })
    };

    let comments = SingleThreadedComments::default();

    // Parse everything; preset-env decides what survives.
    let lexer = Lexer::new(
        syntax,
        EsVersion::EsNext,
        StringInput::from(&*fm),
        Some(&comments),
    );
    let mut parser = Parser::new_from(lexer);

    let to_diagnostic = |e: &swc_ecma_parser::error::Error| {
        let loc = cm.lookup_char_pos(e.span().lo);
        Diagnostic::error(e.kind().msg().to_string()).with_location(
            spec.input_path.clone(),
            loc.line as u32,
            loc.col_display as u32 + 1,
        )
    };

    let program = parser.parse_program().map_err(|e| {
        CompilerError::parse_error(format!("Failed to parse {}", spec.input_path.display()))
            .with_diagnostics(vec![to_diagnostic(&e)])
    })?;

    let recovered: Vec<Diagnostic> = parser.take_errors().iter().map(to_diagnostic).collect();
    if !recovered.is_empty() {
        return Err(CompilerError::parse_error(format!(
            "Failed to parse {}",
            spec.input_path.display()
        ))
        .with_diagnostics(recovered));
    }

    let is_module = matches!(program, Program::Module(_));

    let program = GLOBALS.set(&Globals::default(), || {
        HELPERS.set(&Helpers::new(false), || {
            let unresolved_mark = Mark::new();
            let top_level_mark = Mark::new();

            let mut program: Program =
                program.fold_with(&mut resolver(unresolved_mark, top_level_mark, is_ts));

            if is_ts {
                program = program.fold_with(&mut strip(unresolved_mark, top_level_mark));
            }

            let preset = PresetEnvConfig {
                targets: Some(Targets::Versions(versions)),
                ..Default::default()
            };
            program = program.fold_with(&mut preset_env(
                unresolved_mark,
                Some(comments.clone()),
                preset,
                Assumptions::default(),
                &mut FeatureFlag::default(),
            ));
            program = program.fold_with(&mut inject_helpers(unresolved_mark));

            if spec.minify {
                if !is_module {
                    program.visit_mut_with(&mut ExpandShorthandBindings);
                }
                // Classic scripts share the global scope with every other
                // script on the page, so their top-level names must survive.
                let options = MinifyOptions {
                    compress: Some(
                        TerserCompressorOptions {
                            toplevel: Some(TerserTopLevelOptions::Bool(is_module)),
                            module: is_module,
                            ..Default::default()
                        }
                        .into_config(cm.clone()),
                    ),
                    mangle: Some(MangleOptions {
                        top_level: Some(is_module),
                        ..Default::default()
                    }),
                    ..Default::default()
                };
                program = optimize(
                    program,
                    cm.clone(),
                    Some(&comments as &dyn Comments),
                    None,
                    &options,
                    &ExtraOptions {
                        unresolved_mark,
                        top_level_mark,
                        mangle_name_cache: None,
                    },
                );
            } else {
                program = program.fold_with(&mut hygiene());
            }

            program.fold_with(&mut fixer(Some(&comments as &dyn Comments)))
        })
    });

    let mut buf = Vec::new();
    let mut src_map_buf = Vec::new();

    {
        let writer = JsWriter::new(
            cm.clone(),
            "\n",
            &mut buf,
            spec.sourcemaps.then_some(&mut src_map_buf),
        );

        let mut emitter = Emitter {
            cfg: swc_ecma_codegen::Config::default()
                .with_minify(spec.minify)
                .with_target(EsVersion::Es5),
            cm: cm.clone(),
            comments: if spec.minify {
                None
            } else {
                Some(&comments as &dyn Comments)
            },
            wr: writer,
        };

        let emitted = match &program {
            Program::Module(module) => emitter.emit_module(module),
            Program::Script(script) => emitter.emit_script(script),
        };
        emitted.map_err(|e| CompilerError::transform_error(format!("Failed to emit: {e}")))?;
    }

    let code = String::from_utf8(buf)
        .map_err(|e| CompilerError::transform_error(format!("Invalid UTF-8 output: {e}")))?;

    let mut output = TranspileOutput::new(code);
    if spec.sourcemaps {
        let srcmap = cm.build_source_map(&src_map_buf);
        let mut map_buf = Vec::new();
        srcmap.to_writer(&mut map_buf).map_err(|e| {
            CompilerError::transform_error(format!("Failed to write source map: {e}"))
        })?;
        let map = String::from_utf8(map_buf)
            .map_err(|e| CompilerError::transform_error(format!("Invalid source map: {e}")))?;
        output = output.with_source_map(map);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Source using syntax from ES2015 through ES2020.
    const MODERN: &str = r"
        const double = (n) => n * 2;
        const fallback = (value) => value ?? 'none';
        let { first, ...others } = { first: 1, second: 2 };
        const greeting = `hello ${first}`;
        class Counter {
            constructor() { this.count = 0; }
            bump() { this.count += 1; return this.count; }
        }
        console.log(double(2), fallback(null), others, greeting, new Counter().bump());
    ";

    fn assert_lowered(code: &str) {
        assert!(!code.contains("=>"), "arrow survived: {code}");
        assert!(!code.contains("??"), "nullish coalescing survived: {code}");
        assert!(!code.contains("..."), "object rest survived: {code}");
        assert!(!code.contains('`'), "template literal survived: {code}");
        assert!(!code.contains("class "), "class survived: {code}");
        assert!(!code.contains("const "), "const survived: {code}");
    }

    #[test]
    fn test_swc_backend_name() {
        assert_eq!(SwcBackend::new().name(), "swc");
    }

    #[test]
    fn test_transpile_empty_source() {
        let backend = SwcBackend::new();
        let spec = TranspileSpec::new("src/js/app.ts", "assets/js/app.js");
        let output = backend.transpile(&spec, "").unwrap();
        assert_eq!(output.code.trim(), "");
        assert!(output.source_map.is_none());
    }

    #[test]
    fn test_empty_source_still_gets_a_map() {
        let backend = SwcBackend::new();
        let spec = TranspileSpec::new("src/js/app.js", "assets/js/app.js").with_sourcemaps(true);
        let output = backend.transpile(&spec, "").unwrap();
        let map = output.source_map.unwrap();
        assert!(map.contains("\"version\":3"));
    }

    #[test]
    fn test_transpile_simple_js_to_es5() {
        let backend = SwcBackend::new();
        let spec = TranspileSpec::new("src/js/app.js", "assets/js/app.js");
        let output = backend.transpile(&spec, "const x = 1;").unwrap();
        assert!(output.code.contains("var x = 1;"));
        assert!(output.source_map.is_none());
    }

    #[test]
    fn test_default_targets_lower_to_es5() {
        let backend = SwcBackend::new();
        let spec = TranspileSpec::new("src/js/app.js", "assets/js/app.js");
        let output = backend.transpile(&spec, MODERN).unwrap();
        assert_lowered(&output.code);
        assert!(output.code.contains("console.log"));
    }

    #[test]
    fn test_default_targets_lower_to_es5_when_minified() {
        let backend = SwcBackend::new();
        let spec = TranspileSpec::new("src/js/app.js", "assets/js/app.js").with_minify(true);
        let output = backend.transpile(&spec, MODERN).unwrap();
        assert_lowered(&output.code);
    }

    #[test]
    fn test_typescript_is_lowered_too() {
        let backend = SwcBackend::new();
        let spec = TranspileSpec::new("src/js/app.ts", "assets/js/app.js");
        let source = "const label = (name: string): string => `item ${name ?? 'none'}`;\nconsole.log(label('a'));\n";
        let output = backend.transpile(&spec, source).unwrap();
        assert!(!output.code.contains(": string"));
        assert!(!output.code.contains("=>"));
        assert!(!output.code.contains("??"));
        assert!(!output.code.contains('`'));
    }

    #[test]
    fn test_modern_targets_keep_supported_syntax() {
        let backend = SwcBackend::new();
        let spec = TranspileSpec::new("src/js/app.js", "assets/js/app.js")
            .with_targets(Some("chrome 100".to_string()));
        let output = backend.transpile(&spec, "const f = (a) => a ?? 1;\nf(0);\n").unwrap();
        assert!(output.code.contains("=>"));
        assert!(output.code.contains("??"));
    }

    #[test]
    fn test_invalid_targets_are_an_error() {
        let backend = SwcBackend::new();
        let spec = TranspileSpec::new("src/js/app.js", "assets/js/app.js")
            .with_targets(Some("not a browser 12".to_string()));
        let err = backend.transpile(&spec, "var a = 1;").unwrap_err();
        assert_eq!(err.code, "COMPILER_TRANSFORM_ERROR");
        assert!(err.message.contains("not a browser 12"));
    }

    #[test]
    fn test_transpile_typescript() {
        let backend = SwcBackend::new();
        let spec = TranspileSpec::new("src/js/app.ts", "assets/js/app.js");

        let source = r#"
            interface User {
                name: string;
                age: number;
            }
            const user: User = { name: "Alice", age: 30 };
            console.log(user.name);
        "#;

        let output = backend.transpile(&spec, source).unwrap();
        assert!(!output.code.contains("interface"));
        assert!(!output.code.contains(": User"));
        assert!(!output.code.contains(": string"));
        assert!(output.code.contains("var user"));
        assert!(output.code.contains("console.log"));
    }

    #[test]
    fn test_transpile_classic_script() {
        let backend = SwcBackend::new();
        let spec = TranspileSpec::new("src/js/legacy.js", "assets/js/legacy.js");
        let source = "var count = 0;\nfunction bump() { count += 1; }\n";
        let output = backend.transpile(&spec, source).unwrap();
        assert!(output.code.contains("function bump"));
    }

    #[test]
    fn test_source_map_generation() {
        let backend = SwcBackend::new();
        let spec = TranspileSpec::new("src/js/app.ts", "assets/js/app.js").with_sourcemaps(true);

        let output = backend.transpile(&spec, "const x: number = 42;").unwrap();
        let map = output.source_map.unwrap();
        assert!(map.contains("\"version\":3"));
        assert!(map.contains("\"sources\""));
        assert!(map.contains("\"mappings\""));
    }

    #[test]
    fn test_minify_shrinks_output() {
        let backend = SwcBackend::new();
        let source = r"
            function greet(personName) {
                const message = 'Hello, ' + personName;
                console.log(message);
                return message;
            }
            greet('world');
        ";

        let plain = backend
            .transpile(&TranspileSpec::new("a.js", "a.js"), source)
            .unwrap();
        let minified = backend
            .transpile(&TranspileSpec::new("a.js", "a.js").with_minify(true), source)
            .unwrap();

        assert!(minified.code.len() < plain.code.len());
        assert!(!minified.code.contains("personName"));
        assert!(minified.source_map.is_none());
    }

    const GLOBALS_SCRIPT: &str = r"
        var counter = 0;
        let { x, ...rest } = { x: 1, y: 2 };
        let { width = 10 } = {};
        let label = 'a';
        function bump(step) {
            counter += step;
            return label + x + width + rest.y;
        }
    ";

    fn assert_globals_kept(code: &str) {
        for name in ["counter", "x", "rest", "width", "label", "bump"] {
            let declared = [
                format!("var {name}="),
                format!("let {name}="),
                format!("var {name},"),
                format!(",{name}="),
                format!(",{name},"),
                format!("{{{name}:{name}"),
                format!("{name}:{name}="),
                format!("...{name}}}"),
                format!("function {name}("),
            ];
            assert!(
                declared.iter().any(|d| code.contains(d.as_str())),
                "top-level `{name}` was renamed: {code}"
            );
        }
    }

    #[test]
    fn test_minify_keeps_script_globals() {
        let backend = SwcBackend::new();
        let spec = TranspileSpec::new("src/js/legacy.js", "assets/js/legacy.js").with_minify(true);
        let output = backend.transpile(&spec, GLOBALS_SCRIPT).unwrap();
        assert_globals_kept(&output.code);
        assert!(!output.code.contains("step"));
    }

    #[test]
    fn test_minify_keeps_destructured_globals_for_modern_targets() {
        let backend = SwcBackend::new();
        let spec = TranspileSpec::new("src/js/legacy.js", "assets/js/legacy.js")
            .with_targets(Some("chrome 100".to_string()))
            .with_minify(true);
        let output = backend.transpile(&spec, GLOBALS_SCRIPT).unwrap();
        assert!(output.code.contains("..."), "rest should be kept: {}", output.code);
        assert_globals_kept(&output.code);
    }

    #[test]
    fn test_parse_error_has_location() {
        let backend = SwcBackend::new();
        let spec = TranspileSpec::new("src/js/app.ts", "assets/js/app.js");

        let err = backend.transpile(&spec, "const x = {").unwrap_err();
        assert_eq!(err.code, "COMPILER_PARSE_ERROR");
        assert_eq!(err.diagnostics.len(), 1);
        assert_eq!(err.diagnostics[0].line, Some(1));
    }
}

//! `assetflow build`: run every pipeline once.

use assetflow_core::{
    pipeline, AssetPaths, CollectingNotifier, FanoutNotifier, LoadedConfig, LogNotifier, Mode,
    ReloadHandle,
};
use miette::{miette, Result};
use serde::Serialize;

/// Build result for JSON output.
#[derive(Serialize)]
struct BuildResult {
    ok: bool,
    mode: String,
    pipelines: Vec<PipelineResult>,
}

#[derive(Serialize)]
struct PipelineResult {
    pipeline: String,
    written: Vec<String>,
    errors: Vec<String>,
}

/// Run the build command.
pub fn run(loaded: LoadedConfig, mode: Option<Mode>, json: bool) -> Result<()> {
    let config = match mode {
        Some(mode) => loaded.config.with_mode(mode),
        None => loaded.config,
    };
    let paths = AssetPaths::resolve(&config, &loaded.base_dir);

    let failures = CollectingNotifier::new();
    let notifier = FanoutNotifier::new()
        .with(LogNotifier)
        .with(failures.clone());

    let reports = pipeline::run_all(&config, &paths, &notifier, &ReloadHandle::new());

    let result = BuildResult {
        ok: failures.messages().is_empty(),
        mode: config.mode.to_string(),
        pipelines: reports
            .into_iter()
            .map(|(kind, report)| PipelineResult {
                pipeline: kind.to_string(),
                written: report
                    .written
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect(),
                errors: report.errors,
            })
            .collect(),
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        for p in &result.pipelines {
            println!(
                "  {:<10} {} written, {} failed",
                p.pipeline,
                p.written.len(),
                p.errors.len()
            );
        }
    }

    if result.ok {
        Ok(())
    } else {
        Err(miette!(
            "{} file(s) failed to build",
            failures.messages().len()
        ))
    }
}

//! Default and `development` tasks: arm the watchers, then serve.

use crate::server::{self, DevServer};
use assetflow_core::{
    AssetPaths, FanoutNotifier, LoadedConfig, LogNotifier, Orchestrator, ReloadHandle,
};
use miette::{IntoDiagnostic, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Run watch + serve until Ctrl-C.
pub fn run(loaded: LoadedConfig) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    runtime.block_on(watch_and_serve(loaded))
}

async fn watch_and_serve(loaded: LoadedConfig) -> Result<()> {
    let mut config = loaded.config;
    config.https = config.https.resolve(&loaded.base_dir);
    let paths = AssetPaths::resolve(&config, &loaded.base_dir);
    let reload = ReloadHandle::new();

    let mut notifier = FanoutNotifier::new().with(LogNotifier);
    if config.notify {
        notifier = notifier.with(reload.clone());
    }

    let orchestrator =
        Orchestrator::new(&config, &paths, reload.clone(), Arc::new(notifier)).into_diagnostic()?;
    let bindings = orchestrator.bindings().len();
    let _armed = orchestrator.arm().into_diagnostic()?;
    info!(mode = %config.mode, bindings, "Watchers armed");

    let server = DevServer::bind(&config, reload).await?;
    let url = server.url().to_string();

    eprintln!();
    eprintln!("  assetflow ({}) proxying {}", config.mode, config.proxy);
    eprintln!("  Local: {url}");
    eprintln!();
    eprintln!("  Press Ctrl+C to stop");
    eprintln!();

    if config.open {
        if let Err(e) = server::open_browser(&url) {
            warn!(error = %e, "Failed to open browser");
        }
    }

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}

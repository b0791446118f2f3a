#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

pub mod compiler;
pub mod config;
pub mod css;
pub mod error;
pub mod paths;
pub mod pipeline;
pub mod reload;
pub mod report;
pub mod sourcemap;
pub mod watch;

pub use config::{Config, LoadedConfig, Mode};
pub use error::Error;
pub use paths::AssetPaths;
pub use pipeline::{Pipeline, PipelineKind, PipelineReport};
pub use reload::{ReloadHandle, ReloadMessage};
pub use report::{CollectingNotifier, FanoutNotifier, LogNotifier, Notifier};
pub use watch::{bindings_for, ArmedWatch, Orchestrator, WatchBinding};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Watch orchestration.
//!
//! One recursive `notify` watcher covers the site root. Its callback routes
//! every relevant path to the binding(s) whose globs match it; each binding
//! has its own worker task that coalesces bursts and runs one action at a
//! time.

use crate::config::Config;
use crate::error::Error;
use crate::paths::AssetPaths;
use crate::pipeline::{Pipeline, PipelineKind};
use crate::reload::ReloadHandle;
use crate::report::Notifier;
use glob::{MatchOptions, Pattern};
use notify::{
    event::{ModifyKind, RenameMode},
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// What a binding does when one of its files changes.
#[derive(Debug, Clone)]
pub enum Action {
    /// Rebuild a whole category.
    Pipeline(Pipeline),
    /// Tell browsers to reload.
    Reload,
}

/// A set of globs bound to an action.
#[derive(Debug, Clone)]
pub struct WatchBinding {
    name: String,
    patterns: Vec<Pattern>,
    action: Action,
}

impl WatchBinding {
    /// Bind `globs` (absolute) to `action`.
    pub fn new(name: impl Into<String>, globs: &[PathBuf], action: Action) -> Result<Self, Error> {
        let patterns = globs
            .iter()
            .map(|glob| {
                let pattern = glob.to_string_lossy();
                Pattern::new(&pattern).map_err(|source| Error::Glob {
                    pattern: pattern.into_owned(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: name.into(),
            patterns,
            action,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Glob texts, for logging and tests.
    #[must_use]
    pub fn globs(&self) -> Vec<&str> {
        self.patterns.iter().map(Pattern::as_str).collect()
    }

    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches_path_with(path, MATCH_OPTIONS))
    }
}

/// Bindings for the config's mode.
///
/// The glob set is the same in every mode; only the pipeline variants differ.
pub fn bindings_for(config: &Config, paths: &AssetPaths) -> Result<Vec<WatchBinding>, Error> {
    let mut bindings = Vec::with_capacity(4);
    for (kind, category) in [
        (PipelineKind::Style, &paths.style),
        (PipelineKind::Es6, &paths.es6),
        (PipelineKind::TypeScript, &paths.tsc),
    ] {
        bindings.push(WatchBinding::new(
            kind.as_str(),
            std::slice::from_ref(&category.glob),
            Action::Pipeline(Pipeline::new(kind, config, paths)),
        )?);
    }
    bindings.push(WatchBinding::new("reload", &paths.reload, Action::Reload)?);
    Ok(bindings)
}

/// Shared by every worker.
#[derive(Clone)]
struct WorkerContext {
    delay: Duration,
    notifier: Arc<dyn Notifier>,
    reload: ReloadHandle,
}

/// Builds the bindings and arms the watcher.
pub struct Orchestrator {
    root: PathBuf,
    bindings: Vec<WatchBinding>,
    context: WorkerContext,
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        paths: &AssetPaths,
        reload: ReloadHandle,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, Error> {
        Ok(Self {
            root: paths.root.clone(),
            bindings: bindings_for(config, paths)?,
            context: WorkerContext {
                delay: Duration::from_millis(config.watch_delay_ms),
                notifier,
                reload,
            },
        })
    }

    #[must_use]
    pub fn bindings(&self) -> &[WatchBinding] {
        &self.bindings
    }

    /// Start the watcher and one worker per binding.
    ///
    /// Must be called inside a Tokio runtime. The returned guard keeps
    /// everything running; dropping it stops the watcher and lets the workers
    /// finish.
    pub fn arm(self) -> Result<ArmedWatch, Error> {
        let mut routes = Vec::with_capacity(self.bindings.len());
        let mut workers = Vec::with_capacity(self.bindings.len());

        for binding in self.bindings {
            let (tx, rx) = mpsc::unbounded_channel::<PathBuf>();
            let binding = Arc::new(binding);
            debug!(binding = binding.name(), globs = ?binding.globs(), "Arming binding");
            workers.push(spawn_worker(binding.clone(), rx, self.context.clone()));
            routes.push((binding, tx));
        }

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if !is_relevant(&event.kind) {
                        return;
                    }
                    for path in &event.paths {
                        for (binding, tx) in &routes {
                            if binding.matches(path) && tx.send(path.clone()).is_err() {
                                warn!(binding = binding.name(), "Watch worker has stopped");
                            }
                        }
                    }
                }
                Err(e) => error!(error = %e, "Watch error"),
            },
            notify::Config::default(),
        )?;
        watcher.watch(&self.root, RecursiveMode::Recursive)?;
        info!(root = %self.root.display(), "Watching");

        Ok(ArmedWatch {
            _watcher: watcher,
            workers,
        })
    }
}

/// Keeps the watcher and its workers alive.
pub struct ArmedWatch {
    _watcher: RecommendedWatcher,
    workers: Vec<JoinHandle<()>>,
}

impl ArmedWatch {
    /// Number of binding workers.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers.len()
    }
}

fn is_relevant(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(
            ModifyKind::Data(_)
            | ModifyKind::Any
            | ModifyKind::Name(RenameMode::To | RenameMode::Both | RenameMode::Any),
        ) => true,
        _ => false,
    }
}

/// One trigger at a time: wait out the delay, drain what queued up, run.
/// Events that arrive during a run queue a single follow-up run.
fn spawn_worker(
    binding: Arc<WatchBinding>,
    mut rx: mpsc::UnboundedReceiver<PathBuf>,
    context: WorkerContext,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(first) = rx.recv().await {
            tokio::time::sleep(context.delay).await;
            let mut changed = vec![first];
            while let Ok(path) = rx.try_recv() {
                changed.push(path);
            }
            changed.sort();
            changed.dedup();
            info!(
                binding = binding.name(),
                files = changed.len(),
                first = %changed[0].display(),
                "Change detected"
            );
            execute(&binding, &context).await;
        }
        debug!(binding = binding.name(), "Watch worker stopped");
    })
}

async fn execute(binding: &Arc<WatchBinding>, context: &WorkerContext) {
    match &binding.action {
        Action::Reload => context.reload.reload(),
        Action::Pipeline(_) => {
            let binding = binding.clone();
            let context = context.clone();
            let run = tokio::task::spawn_blocking(move || {
                if let Action::Pipeline(pipeline) = &binding.action {
                    pipeline.run(context.notifier.as_ref(), &context.reload);
                }
            });
            if let Err(e) = run.await {
                error!(error = %e, "Pipeline task failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use crate::reload::ReloadMessage;
    use crate::report::CollectingNotifier;
    use serial_test::serial;
    use tempfile::tempdir;

    fn paths_in(base: &Path) -> AssetPaths {
        AssetPaths::resolve(&Config::default(), base)
    }

    #[test]
    fn test_bindings_cover_every_category() {
        let base = Path::new("/site");
        let bindings = bindings_for(&Config::default(), &paths_in(base)).unwrap();
        let names: Vec<&str> = bindings.iter().map(WatchBinding::name).collect();
        assert_eq!(names, vec!["style", "es6", "typescript", "reload"]);
        assert!(matches!(bindings[3].action(), Action::Reload));
    }

    #[test]
    fn test_binding_matching() {
        let base = Path::new("/site");
        let bindings = bindings_for(&Config::default(), &paths_in(base)).unwrap();
        let route = |p: &str| -> Vec<&str> {
            bindings
                .iter()
                .filter(|b| b.matches(Path::new(p)))
                .map(WatchBinding::name)
                .collect()
        };

        assert_eq!(route("/site/src/scss/main.scss"), vec!["style"]);
        assert_eq!(route("/site/src/scss/partials/_grid.scss"), vec!["style"]);
        assert_eq!(route("/site/src/js/app.js"), vec!["es6"]);
        assert_eq!(route("/site/src/js/lib/util.ts"), vec!["typescript"]);
        assert_eq!(route("/site/index.html"), vec!["reload"]);
        assert_eq!(route("/site/templates/page.php"), vec!["reload"]);
        assert_eq!(route("/site/assets/js/app.js"), vec!["reload"]);
        assert!(route("/site/assets/css/main.css").is_empty());
        assert!(route("/site/assets/js/app.js.map").is_empty());
    }

    #[test]
    fn test_globs_are_mode_independent() {
        let base = Path::new("/site");
        let dev = bindings_for(&Config::default().with_mode(Mode::Development), &paths_in(base))
            .unwrap();
        let prod = bindings_for(&Config::default().with_mode(Mode::Production), &paths_in(base))
            .unwrap();
        for (d, p) in dev.iter().zip(prod.iter()) {
            assert_eq!(d.globs(), p.globs());
        }
    }

    #[test]
    fn test_relevant_events() {
        use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind};
        assert!(is_relevant(&EventKind::Create(CreateKind::File)));
        assert!(is_relevant(&EventKind::Modify(ModifyKind::Data(
            DataChange::Content
        ))));
        assert!(!is_relevant(&EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::Any
        ))));
        assert!(!is_relevant(&EventKind::Access(AccessKind::Any)));
    }

    #[tokio::test]
    async fn test_worker_coalesces_bursts() {
        let reload = ReloadHandle::new();
        let mut browser = reload.subscribe();
        let binding = Arc::new(
            WatchBinding::new("reload", &[PathBuf::from("/site/**/*.html")], Action::Reload)
                .unwrap(),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = spawn_worker(
            binding,
            rx,
            WorkerContext {
                delay: Duration::from_millis(50),
                notifier: Arc::new(CollectingNotifier::new()),
                reload: reload.clone(),
            },
        );

        for i in 0..5 {
            tx.send(PathBuf::from(format!("/site/page{i}.html"))).unwrap();
        }
        drop(tx);
        worker.await.unwrap();

        assert_eq!(browser.try_recv().unwrap(), ReloadMessage::Reload);
        assert!(browser.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    #[serial]
    async fn test_armed_watch_rebuilds_on_change() {
        let dir = tempdir().unwrap();
        let base = dunce::canonicalize(dir.path()).unwrap();
        let config = Config {
            watch_delay_ms: 50,
            ..Config::default().with_mode(Mode::Production)
        };
        let paths = AssetPaths::resolve(&config, &base);
        std::fs::create_dir_all(&paths.style.src_dir).unwrap();

        let notifier = CollectingNotifier::new();
        let orchestrator =
            Orchestrator::new(&config, &paths, ReloadHandle::new(), Arc::new(notifier.clone()))
                .unwrap();
        let armed = orchestrator.arm().unwrap();
        assert_eq!(armed.workers(), 4);

        std::fs::write(paths.style.src_dir.join("main.scss"), ".a { top: 0; }").unwrap();

        let output = base.join("assets/css/main.css");
        for _ in 0..100 {
            if output.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(output.exists());
        assert!(notifier.messages().is_empty());
        drop(armed);
    }
}

//! Error reporting for pipeline runs.
//!
//! A failed file never stops a pipeline; the failure is handed to a
//! [`Notifier`] and the run moves on.

use crate::reload::ReloadHandle;
use std::sync::{Arc, Mutex};

/// Receives per-file pipeline errors.
pub trait Notifier: Send + Sync {
    /// Report `message` (already formatted as `Error: <details>`).
    fn error(&self, message: &str);
}

/// Logs errors through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }
}

/// Shows errors in connected browsers.
impl Notifier for ReloadHandle {
    fn error(&self, message: &str) {
        self.notify(message);
    }
}

/// Forwards every error to each inner notifier.
#[derive(Clone, Default)]
pub struct FanoutNotifier {
    targets: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, notifier: impl Notifier + 'static) -> Self {
        self.targets.push(Arc::new(notifier));
        self
    }
}

impl Notifier for FanoutNotifier {
    fn error(&self, message: &str) {
        for target in &self.targets {
            target.error(message);
        }
    }
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn error(&self, message: &str) {
        (**self).error(message);
    }
}

/// Keeps every message; used by tests and by `assetflow build` to count failures.
#[derive(Debug, Clone, Default)]
pub struct CollectingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
}

impl CollectingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages reported so far.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl Notifier for CollectingNotifier {
    fn error(&self, message: &str) {
        if let Ok(mut guard) = self.messages.lock() {
            guard.push(message.to_string());
        }
    }
}

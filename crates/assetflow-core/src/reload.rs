//! Live-reload signalling.
//!
//! [`ReloadHandle`] is the only way pipelines and watch bindings reach
//! connected browsers. The dev server subscribes each websocket to the same
//! broadcast channel and forwards messages as JSON.

use serde::Serialize;
use tokio::sync::broadcast;

/// Channel capacity; lagging browsers skip to the newest messages.
const CHANNEL_CAPACITY: usize = 64;

/// Message pushed to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReloadMessage {
    /// Sent to a browser right after it connects.
    Connected,
    /// Full page reload.
    Reload,
    /// Swap these stylesheets without reloading the page.
    Css { files: Vec<String> },
    /// Show a notification in the page.
    Notify { message: String },
}

impl ReloadMessage {
    /// Wire form sent over the websocket.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"reload"}"#.to_string())
    }
}

/// Cloneable handle over the reload broadcast channel.
#[derive(Debug, Clone)]
pub struct ReloadHandle {
    tx: broadcast::Sender<ReloadMessage>,
}

impl ReloadHandle {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Ask every browser to reload the page.
    pub fn reload(&self) {
        self.send(ReloadMessage::Reload);
    }

    /// Push updated stylesheets. `files` are URL paths relative to the site root.
    pub fn inject_css(&self, files: Vec<String>) {
        if files.is_empty() {
            return;
        }
        self.send(ReloadMessage::Css { files });
    }

    /// Show `message` in every connected page.
    pub fn notify(&self, message: impl Into<String>) {
        self.send(ReloadMessage::Notify {
            message: message.into(),
        });
    }

    /// New receiver for one browser connection.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.tx.subscribe()
    }

    /// Number of connected browsers.
    #[must_use]
    pub fn connections(&self) -> usize {
        self.tx.receiver_count()
    }

    fn send(&self, message: ReloadMessage) {
        // No receivers just means no browser is connected yet.
        if self.tx.send(message.clone()).is_err() {
            tracing::debug!(?message, "no browsers connected, dropping signal");
        }
    }
}

impl Default for ReloadHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_json() {
        assert_eq!(ReloadMessage::Reload.to_json(), r#"{"type":"reload"}"#);
        assert_eq!(
            ReloadMessage::Css {
                files: vec!["assets/css/main.css".to_string()]
            }
            .to_json(),
            r#"{"type":"css","files":["assets/css/main.css"]}"#
        );
        assert_eq!(
            ReloadMessage::Notify {
                message: "Error: \"x\"".to_string()
            }
            .to_json(),
            r#"{"type":"notify","message":"Error: \"x\""}"#
        );
    }

    #[test]
    fn test_signals_without_browsers_are_dropped() {
        let handle = ReloadHandle::new();
        assert_eq!(handle.connections(), 0);
        handle.reload();
        handle.notify("nobody listening");

        let mut rx = handle.subscribe();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscribers_receive_signals() {
        let handle = ReloadHandle::new();
        let mut first = handle.subscribe();
        let mut second = handle.clone().subscribe();

        handle.inject_css(vec!["css/main.css".to_string()]);
        handle.reload();

        for rx in [&mut first, &mut second] {
            assert_eq!(
                rx.recv().await.unwrap(),
                ReloadMessage::Css {
                    files: vec!["css/main.css".to_string()]
                }
            );
            assert_eq!(rx.recv().await.unwrap(), ReloadMessage::Reload);
        }
    }

    #[test]
    fn test_empty_css_push_is_skipped() {
        let handle = ReloadHandle::new();
        let mut rx = handle.subscribe();
        handle.inject_css(Vec::new());
        assert!(rx.try_recv().is_err());
    }
}

// src/server/reload.rs

use serde::Serialize;
use tokio::sync::broadcast;

/// Message sent to connected browsers over the live-reload socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ReloadMessage {
    /// A compile task rewrote its outputs.
    Changed { task: String },
    /// A static asset changed; reload the page outright.
    Reload,
}

/// Fan-out hub for live-reload notifications.
///
/// Cloning shares the underlying channel: the runtime publishes, each
/// WebSocket connection subscribes. Sends are fire-and-forget; with no
/// browsers connected the message is dropped.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<ReloadMessage>,
}

impl ReloadHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    pub fn changed(&self, task: &str) {
        let _ = self.tx.send(ReloadMessage::Changed {
            task: task.to_string(),
        });
    }

    pub fn reload(&self) {
        let _ = self.tx.send(ReloadMessage::Reload);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.tx.subscribe()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

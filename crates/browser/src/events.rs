//! Window events
//!
//! Enums, not trait objects: subscribers match on what they care about.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::window::WindowId;

/// Something that happened to a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WebWindowEvent {
    Opened {
        window: WindowId,
        name: String,
    },
    /// A new page was placed in the window
    ContentChanged {
        window: WindowId,
        old_url: Option<String>,
        new_url: String,
    },
    Closed {
        window: WindowId,
    },
}

impl WebWindowEvent {
    pub fn window(&self) -> WindowId {
        match self {
            WebWindowEvent::Opened { window, .. }
            | WebWindowEvent::ContentChanged { window, .. }
            | WebWindowEvent::Closed { window } => *window,
        }
    }
}

/// Window events over a tokio broadcast channel
pub struct EventBus {
    tx: broadcast::Sender<WebWindowEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    /// Publish an event
    pub fn publish(&self, event: WebWindowEvent) {
        let _ = self.tx.send(event); // no subscribers is fine
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WebWindowEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

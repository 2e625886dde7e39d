//! Window listeners
//!
//! Listeners are registered on the client and see every window event. The
//! manager fans an event out to all of them concurrently.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::events::WebWindowEvent;

/// Reacts to windows opening, changing content and closing
#[async_trait]
pub trait WebWindowListener: Send + Sync {
    /// Human-readable name for logging
    fn name(&self) -> &str;

    /// Called for every window event
    async fn on_event(&self, event: &WebWindowEvent);
}

#[derive(Default)]
pub struct ListenerManager {
    listeners: RwLock<Vec<Arc<dyn WebWindowListener>>>,
}

impl ListenerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Arc<dyn WebWindowListener>) {
        tracing::debug!("Registered window listener: {}", listener.name());
        self.listeners.write().push(listener);
    }

    /// Remove every listener with the given name, returning how many went
    pub fn unregister(&self, name: &str) -> usize {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| l.name() != name);
        before - listeners.len()
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Dispatch an event to all listeners in parallel
    pub async fn dispatch(&self, event: Arc<WebWindowEvent>) {
        use futures_util::future::join_all;

        // snapshot, the lock must not be held across the await
        let listeners: Vec<_> = self.listeners.read().clone();
        let tasks: Vec<_> = listeners
            .iter()
            .map(|l| {
                let event = event.clone();
                async move {
                    l.on_event(&event).await;
                }
            })
            .collect();

        join_all(tasks).await;
    }
}

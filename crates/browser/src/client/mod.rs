//! Web Client - the entry point
//!
//! Owns the window registry and every pluggable part: connection, page
//! creator, script engine, refresh handler, credentials and cache.
//! `WebClient` is a cheap handle; clones share all state, so a background
//! job can hold one.
//!
//! Locks are `parking_lot` and never held across an await: anything needed
//! after a suspension point is cloned out first.

mod actions;
mod loader;

pub use loader::{guess_content_type, parse_data_url};

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::cache::Cache;
use crate::connection::{HttpWebConnection, WebConnection};
use crate::credentials::DefaultCredentialsProvider;
use crate::error::{BrowserError, Result};
use crate::events::{EventBus, WebWindowEvent};
use crate::jobs::JobManager;
use crate::listener::{ListenerManager, WebWindowListener};
use crate::options::{BrowserVersion, WebClientOptions};
use crate::page::{DefaultPageCreator, Page, PageCreator};
use crate::refresh::RefreshHandler;
use crate::response::WebResponse;
use crate::script::ScriptEngine;
use crate::window::{WebWindow, WindowId};

struct ClientInner {
    /// Identifies this client in logs
    id: Uuid,
    options: WebClientOptions,
    connection: RwLock<Arc<dyn WebConnection>>,
    page_creator: RwLock<Arc<dyn PageCreator>>,
    script_engine: RwLock<Option<Arc<dyn ScriptEngine>>>,
    refresh_handler: RwLock<RefreshHandler>,
    credentials: DefaultCredentialsProvider,
    cache: Cache,
    /// Headers added to every request
    request_headers: RwLock<Vec<(String, String)>>,

    windows: RwLock<HashMap<WindowId, WebWindow>>,
    current_window: RwLock<Option<WindowId>>,
    next_window_id: AtomicU64,

    event_bus: EventBus,
    listeners: ListenerManager,
}

#[derive(Clone)]
pub struct WebClient {
    inner: Arc<ClientInner>,
}

impl WebClient {
    /// Client talking HTTP through reqwest
    pub fn new(options: WebClientOptions) -> Result<Self> {
        options.validate()?;
        let connection = HttpWebConnection::new(&options)?;
        Self::with_connection(options, Arc::new(connection))
    }

    pub fn with_browser_version(browser_version: BrowserVersion) -> Result<Self> {
        Self::new(WebClientOptions {
            browser_version,
            ..WebClientOptions::default()
        })
    }

    /// Client over any connection, e.g. `MockWebConnection`
    pub fn with_connection(options: WebClientOptions, connection: Arc<dyn WebConnection>) -> Result<Self> {
        options.validate()?;
        let cache = Cache::with_max_size(options.cache_max_size);
        let client = Self {
            inner: Arc::new(ClientInner {
                id: Uuid::now_v7(),
                options,
                connection: RwLock::new(connection),
                page_creator: RwLock::new(Arc::new(DefaultPageCreator::new())),
                script_engine: RwLock::new(None),
                refresh_handler: RwLock::new(RefreshHandler::default()),
                credentials: DefaultCredentialsProvider::new(),
                cache,
                request_headers: RwLock::new(Vec::new()),
                windows: RwLock::new(HashMap::new()),
                current_window: RwLock::new(None),
                next_window_id: AtomicU64::new(1),
                event_bus: EventBus::new(),
                listeners: ListenerManager::new(),
            }),
        };

        let window = client.register_window(String::new(), None);
        client.place_blank_page(window)?;
        *client.inner.current_window.write() = Some(window);
        tracing::info!(
            "[WebClient] {} created as {}",
            client.inner.id,
            client.inner.options.browser_version.nickname()
        );
        Ok(client)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn options(&self) -> &WebClientOptions {
        &self.inner.options
    }

    pub fn browser_version(&self) -> BrowserVersion {
        self.inner.options.browser_version
    }

    pub fn set_web_connection(&self, connection: Arc<dyn WebConnection>) {
        *self.inner.connection.write() = connection;
    }

    pub fn web_connection(&self) -> Arc<dyn WebConnection> {
        self.inner.connection.read().clone()
    }

    pub fn set_page_creator(&self, creator: Arc<dyn PageCreator>) {
        *self.inner.page_creator.write() = creator;
    }

    pub fn page_creator(&self) -> Arc<dyn PageCreator> {
        self.inner.page_creator.read().clone()
    }

    pub fn set_script_engine(&self, engine: Arc<dyn ScriptEngine>) {
        tracing::debug!("[WebClient] Script engine set: {}", engine.name());
        *self.inner.script_engine.write() = Some(engine);
    }

    pub fn remove_script_engine(&self) -> Option<Arc<dyn ScriptEngine>> {
        self.inner.script_engine.write().take()
    }

    pub fn script_engine(&self) -> Option<Arc<dyn ScriptEngine>> {
        self.inner.script_engine.read().clone()
    }

    /// True when scripts will actually run: enabled and an engine installed
    pub fn is_javascript_enabled(&self) -> bool {
        self.inner.options.javascript_enabled && self.inner.script_engine.read().is_some()
    }

    pub fn set_refresh_handler(&self, handler: RefreshHandler) {
        *self.inner.refresh_handler.write() = handler;
    }

    pub fn refresh_handler(&self) -> RefreshHandler {
        *self.inner.refresh_handler.read()
    }

    pub fn credentials_provider(&self) -> &DefaultCredentialsProvider {
        &self.inner.credentials
    }

    pub fn cache(&self) -> &Cache {
        &self.inner.cache
    }

    /// Send `name: value` with every request
    pub fn add_request_header(&self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let mut headers = self.inner.request_headers.write();
        headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        headers.push((name, value.into()));
    }

    pub fn remove_request_header(&self, name: &str) {
        self.inner
            .request_headers
            .write()
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
    }

    pub(crate) fn request_headers(&self) -> Vec<(String, String)> {
        self.inner.request_headers.read().clone()
    }

    // ---- events ----

    pub fn subscribe(&self) -> broadcast::Receiver<WebWindowEvent> {
        self.inner.event_bus.subscribe()
    }

    pub fn add_web_window_listener(&self, listener: Arc<dyn WebWindowListener>) {
        self.inner.listeners.register(listener);
    }

    pub fn remove_web_window_listener(&self, name: &str) -> bool {
        self.inner.listeners.unregister(name) > 0
    }

    /// Publish on the bus and dispatch to listeners
    pub(crate) async fn fire(&self, event: WebWindowEvent) {
        let event = Arc::new(event);
        self.inner.event_bus.publish((*event).clone());
        self.inner.listeners.dispatch(event).await;
    }

    // ---- window registry ----

    /// Snapshot of a window
    pub fn web_window(&self, window: WindowId) -> Option<WebWindow> {
        self.inner.windows.read().get(&window).cloned()
    }

    /// Ids of all open windows and frames, oldest first
    pub fn web_windows(&self) -> Vec<WindowId> {
        let mut ids: Vec<WindowId> = self.inner.windows.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn top_level_windows(&self) -> Vec<WindowId> {
        let mut ids: Vec<WindowId> = self
            .inner
            .windows
            .read()
            .values()
            .filter(|w| w.is_top_level())
            .map(|w| w.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Oldest open window (or frame) with this name
    pub fn web_window_by_name(&self, name: &str) -> Result<WindowId> {
        self.inner
            .windows
            .read()
            .values()
            .filter(|w| !w.closed && w.name == name)
            .map(|w| w.id)
            .min()
            .ok_or_else(|| BrowserError::WebWindowNotFound(name.to_string()))
    }

    pub fn current_window(&self) -> Option<WindowId> {
        *self.inner.current_window.read()
    }

    pub fn set_current_window(&self, window: WindowId) -> Result<()> {
        self.ensure_open(window)?;
        *self.inner.current_window.write() = Some(window);
        Ok(())
    }

    pub fn enclosed_page(&self, window: WindowId) -> Option<Page> {
        self.inner
            .windows
            .read()
            .get(&window)
            .and_then(|w| w.page.clone())
    }

    /// Page of the current window
    pub fn current_page(&self) -> Option<Page> {
        self.current_window().and_then(|w| self.enclosed_page(w))
    }

    /// Outermost window containing `window`
    pub fn top_window(&self, window: WindowId) -> Result<WindowId> {
        let windows = self.inner.windows.read();
        let mut current = windows.get(&window).ok_or(BrowserError::WindowClosed(window))?;
        while let Some(parent) = current.parent() {
            match windows.get(&parent) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Ok(current.id)
    }

    /// Number of frame levels above `window`
    pub fn frame_depth(&self, window: WindowId) -> usize {
        let windows = self.inner.windows.read();
        let mut depth = 0;
        let mut next = windows.get(&window).and_then(|w| w.parent());
        while let Some(parent) = next {
            depth += 1;
            next = windows.get(&parent).and_then(|w| w.parent());
        }
        depth
    }

    /// Job manager of a window
    pub fn window_jobs(&self, window: WindowId) -> Result<Arc<JobManager>> {
        self.inner
            .windows
            .read()
            .get(&window)
            .map(|w| w.jobs.clone())
            .ok_or(BrowserError::WindowClosed(window))
    }

    pub(crate) fn ensure_open(&self, window: WindowId) -> Result<()> {
        match self.inner.windows.read().get(&window) {
            Some(w) if !w.closed => Ok(()),
            _ => Err(BrowserError::WindowClosed(window)),
        }
    }

    fn next_window_id(&self) -> WindowId {
        self.inner.next_window_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Insert a new top-level window without any page
    fn register_window(&self, name: String, opener: Option<WindowId>) -> WindowId {
        let id = self.next_window_id();
        self.inner
            .windows
            .write()
            .insert(id, WebWindow::top_level(id, name.clone(), opener));
        tracing::info!("[WebClient] Opened window {} {:?}", id, name);
        self.inner.event_bus.publish(WebWindowEvent::Opened { window: id, name });
        id
    }

    /// Insert a frame window under `parent`
    pub(crate) fn register_frame(&self, name: String, parent: WindowId, element: hbrowser_dom::NodeId) -> Result<WindowId> {
        let id = self.next_window_id();
        let mut windows = self.inner.windows.write();
        let parent_window = windows
            .get_mut(&parent)
            .ok_or(BrowserError::WindowClosed(parent))?;
        parent_window.children.push(id);
        windows.insert(id, WebWindow::frame(id, name, parent, element));
        tracing::debug!("[WebClient] Frame {} registered in window {}", id, parent);
        Ok(id)
    }

    /// Put an empty HTML page in a window, without events or history
    fn place_blank_page(&self, window: WindowId) -> Result<()> {
        let page = self.page_creator().create_page(loader::blank_response()?, window)?;
        let mut windows = self.inner.windows.write();
        let target = windows
            .get_mut(&window)
            .ok_or(BrowserError::WindowClosed(window))?;
        target.page = Some(page);
        Ok(())
    }

    /// Open a top-level window named `name` (reusing an existing one) and
    /// load `url` into it, `about:blank` when absent
    pub async fn open_window(&self, url: Option<&str>, name: &str) -> Result<WindowId> {
        self.open_window_from(url, name, None).await
    }

    /// Open a window on behalf of a script in `opener`; `None` when the
    /// popup blocker is on
    pub async fn open_popup(&self, opener: WindowId, url: Option<&str>, name: &str) -> Result<Option<WindowId>> {
        if self.inner.options.popup_blocker_enabled {
            tracing::info!("[WebClient] Popup from window {} blocked", opener);
            return Ok(None);
        }
        self.open_window_from(url, name, Some(opener)).await.map(Some)
    }

    pub(crate) async fn open_window_from(
        &self,
        url: Option<&str>,
        name: &str,
        opener: Option<WindowId>,
    ) -> Result<WindowId> {
        let existing = if name.is_empty() {
            None
        } else {
            self.web_window_by_name(name).ok()
        };

        let window = match existing {
            Some(window) => window,
            None => {
                let window = self.register_window(name.to_string(), opener);
                self.place_blank_page(window)?;
                self.inner
                    .listeners
                    .dispatch(Arc::new(WebWindowEvent::Opened {
                        window,
                        name: name.to_string(),
                    }))
                    .await;
                window
            }
        };
        self.set_current_window(window)?;

        if let Some(url) = url {
            let request = crate::request::WebRequest::parse(url)?;
            self.get_page_in_window(window, request).await?;
        }
        Ok(window)
    }

    /// Close a window and its frames
    ///
    /// Closing the current top-level window makes another top-level window
    /// current; closing the last one opens a fresh blank window.
    pub async fn close_window(&self, window: WindowId) -> Result<()> {
        self.ensure_open(window)?;
        self.close_window_tree(window).await;

        let current_gone = self
            .current_window()
            .map_or(true, |c| self.ensure_open(c).is_err());
        if current_gone {
            match self.top_level_windows().last().copied() {
                Some(next) => *self.inner.current_window.write() = Some(next),
                None => {
                    let fresh = self.register_window(String::new(), None);
                    self.place_blank_page(fresh)?;
                    *self.inner.current_window.write() = Some(fresh);
                }
            }
        }
        Ok(())
    }

    /// Remove a window and its descendants from the registry, children first
    pub(crate) fn close_window_tree(&self, window: WindowId) -> futures_util::future::BoxFuture<'_, ()> {
        Box::pin(async move {
            let children = match self.inner.windows.write().get_mut(&window) {
                Some(w) => {
                    w.closed = true;
                    std::mem::take(&mut w.children)
                }
                None => return,
            };
            for child in children {
                self.close_window_tree(child).await;
            }

            let removed = self.inner.windows.write().remove(&window);
            if let Some(removed) = removed {
                removed.jobs.shutdown();
                if let Some(parent) = removed.parent() {
                    if let Some(parent) = self.inner.windows.write().get_mut(&parent) {
                        parent.children.retain(|&c| c != window);
                    }
                }
                tracing::info!("[WebClient] Closed window {}", window);
                self.fire(WebWindowEvent::Closed { window }).await;
            }
        })
    }

    /// Wait for background jobs of all windows; returns how many remain
    pub async fn wait_for_background_javascript(&self, timeout: Duration) -> usize {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let managers: Vec<Arc<JobManager>> = self
                .inner
                .windows
                .read()
                .values()
                .map(|w| w.jobs.clone())
                .collect();
            let remaining: usize = managers.iter().map(|m| m.job_count()).sum();
            let now = tokio::time::Instant::now();
            if remaining == 0 || now >= deadline {
                return remaining;
            }
            for manager in managers {
                let now = tokio::time::Instant::now();
                if now >= deadline {
                    break;
                }
                manager.join_all(deadline - now).await;
            }
        }
    }

    /// Shut down: wait a little for background jobs, close every window and
    /// the connection
    pub async fn close_all_windows(&self) {
        let wait = Duration::from_millis(self.inner.options.background_job_wait_ms);
        let remaining = self.wait_for_background_javascript(wait).await;
        if remaining > 0 {
            tracing::warn!("[WebClient] {} background job(s) still running, interrupting", remaining);
        }

        for window in self.top_level_windows() {
            self.close_window_tree(window).await;
        }
        *self.inner.current_window.write() = None;
        self.web_connection().close().await;
        tracing::info!("[WebClient] {} closed", self.inner.id);
    }

    /// Log a response that failed, with its content when configured
    pub(crate) fn log_failing_response(&self, response: &WebResponse) {
        tracing::warn!(
            "[WebClient] {} {} for {}",
            response.status_code,
            response.status_message,
            response.url
        );
        if self.inner.options.print_content_on_failing_status_code {
            let content = hbrowser_dom::utils::cap_text_length(&response.content_as_string(), 2000);
            tracing::warn!("[WebClient] Content of failing response:\n{}", content);
        }
    }
}

impl std::fmt::Debug for WebClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebClient")
            .field("id", &self.inner.id)
            .field("browser_version", &self.inner.options.browser_version)
            .field("windows", &self.inner.windows.read().len())
            .finish()
    }
}

//! Windows and frames
//!
//! The client owns every window in a registry keyed by `WindowId`. Frames
//! are windows too; they point at their parent and the element hosting
//! them, and the parent lists them as children.

use hbrowser_dom::NodeId;
use std::sync::Arc;
use url::Url;

use crate::jobs::JobManager;
use crate::page::Page;

pub type WindowId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    TopLevel {
        /// Window whose action opened this one
        opener: Option<WindowId>,
    },
    Frame {
        parent: WindowId,
        /// `<frame>`/`<iframe>` element in the parent's page
        element: NodeId,
    },
}

/// Navigation history of one window
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<Url>,
    index: Option<usize>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a visit, dropping any forward entries
    pub fn push(&mut self, url: Url) {
        let keep = self.index.map_or(0, |i| i + 1);
        self.entries.truncate(keep);
        self.entries.push(url);
        self.index = Some(self.entries.len() - 1);
    }

    pub fn current(&self) -> Option<&Url> {
        self.index.and_then(|i| self.entries.get(i))
    }

    pub fn can_go_back(&self) -> bool {
        self.index.is_some_and(|i| i > 0)
    }

    pub fn can_go_forward(&self) -> bool {
        self.index.is_some_and(|i| i + 1 < self.entries.len())
    }

    /// Step back, returning the entry to load
    pub fn back(&mut self) -> Option<Url> {
        let i = self.index.filter(|&i| i > 0)? - 1;
        self.index = Some(i);
        self.entries.get(i).cloned()
    }

    /// Step forward, returning the entry to load
    pub fn forward(&mut self) -> Option<Url> {
        let i = self.index? + 1;
        let url = self.entries.get(i).cloned()?;
        self.index = Some(i);
        Some(url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }
}

/// A window or frame holding at most one page
#[derive(Debug, Clone)]
pub struct WebWindow {
    pub id: WindowId,
    pub name: String,
    pub kind: WindowKind,
    pub page: Option<Page>,
    pub history: History,
    pub jobs: Arc<JobManager>,
    /// Frame windows of the current page
    pub children: Vec<WindowId>,
    pub closed: bool,
}

impl WebWindow {
    pub fn top_level(id: WindowId, name: impl Into<String>, opener: Option<WindowId>) -> Self {
        Self::with_kind(id, name.into(), WindowKind::TopLevel { opener })
    }

    pub fn frame(id: WindowId, name: impl Into<String>, parent: WindowId, element: NodeId) -> Self {
        Self::with_kind(id, name.into(), WindowKind::Frame { parent, element })
    }

    fn with_kind(id: WindowId, name: String, kind: WindowKind) -> Self {
        Self {
            id,
            jobs: Arc::new(JobManager::new(format!("window-{id}"))),
            name,
            kind,
            page: None,
            history: History::new(),
            children: Vec::new(),
            closed: false,
        }
    }

    pub fn is_top_level(&self) -> bool {
        matches!(self.kind, WindowKind::TopLevel { .. })
    }

    /// Parent window of a frame
    pub fn parent(&self) -> Option<WindowId> {
        match self.kind {
            WindowKind::Frame { parent, .. } => Some(parent),
            WindowKind::TopLevel { .. } => None,
        }
    }

    pub fn opener(&self) -> Option<WindowId> {
        match self.kind {
            WindowKind::TopLevel { opener } => opener,
            WindowKind::Frame { .. } => None,
        }
    }

    pub fn enclosed_page(&self) -> Option<&Page> {
        self.page.as_ref()
    }
}

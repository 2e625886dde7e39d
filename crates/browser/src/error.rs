//! Error types for the web client
//!
//! One flat enum. Script faults keep their own type so engines can build
//! them without knowing about the rest of the client.

use thiserror::Error;

use crate::window::WindowId;

pub type Result<T> = std::result::Result<T, BrowserError>;

/// A fault raised while running script source
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} ({source_name}#{line})")]
pub struct ScriptError {
    pub message: String,
    pub source_name: String,
    pub line: u32,
    /// The source that failed, when known
    pub failing_source: Option<String>,
}

impl ScriptError {
    pub fn new(message: impl Into<String>, source_name: impl Into<String>, line: u32) -> Self {
        Self {
            message: message.into(),
            source_name: source_name.into(),
            line,
            failing_source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.failing_source = Some(source.into());
        self
    }
}

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("{status} {message} for {url}")]
    FailingHttpStatusCode {
        status: u16,
        message: String,
        url: String,
    },

    #[error("Element not found: <{tag}> with {attribute}={value:?}")]
    ElementNotFound {
        tag: String,
        attribute: String,
        value: String,
    },

    #[error("No window named {0:?}")]
    WebWindowNotFound(String),

    #[error("Window {0} is closed or unknown")]
    WindowClosed(WindowId),

    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed XML: {0}")]
    MalformedXml(String),

    #[error("DOM error: {0}")]
    Dom(#[from] hbrowser_dom::DomError),

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),

    #[error("Maximum frame depth exceeded: {current} > {max}")]
    FrameDepthExceeded { current: usize, max: usize },

    #[error("Refresh aborted, page refreshes to itself immediately: {0}")]
    RefreshLoop(String),

    #[error("No mock response configured for {0}")]
    NoMockResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BrowserError {
    /// Status code of a failing HTTP response, if this is one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            BrowserError::FailingHttpStatusCode { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn element_not_found(tag: &str, attribute: &str, value: &str) -> Self {
        BrowserError::ElementNotFound {
            tag: tag.to_string(),
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    }
}

//! Pages - typed wrappers around a response
//!
//! The page creator is a dispatcher on the content type. When the server
//! sends none, the first bytes of the body decide.

pub mod html;
pub mod other;

use url::Url;

use crate::error::Result;
use crate::response::WebResponse;
use crate::window::WindowId;

pub use html::{FormSubmission, HtmlPage};
pub use other::{JavaScriptPage, TextPage, UnexpectedPage, XmlPage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageType {
    Html,
    Xml,
    JavaScript,
    Text,
    Unknown,
}

/// Page type for a (lowercase, parameter-free) content type
pub fn determine_page_type(content_type: &str) -> PageType {
    match content_type {
        "text/html" | "application/xhtml+xml" => PageType::Html,
        "text/javascript"
        | "application/javascript"
        | "application/x-javascript"
        | "application/ecmascript"
        | "text/ecmascript" => PageType::JavaScript,
        "text/xml" | "application/xml" => PageType::Xml,
        other if other.ends_with("+xml") => PageType::Xml,
        other if other.starts_with("text/") => PageType::Text,
        _ => PageType::Unknown,
    }
}

/// Leading markup that marks a body as HTML
const HTML_SNIFF_PATTERNS: &[&str] = &[
    "<!doctype html",
    "<html",
    "<head",
    "<body",
    "<script",
    "<iframe",
    "<title",
    "<table",
    "<div",
    "<font",
    "<style",
    "<a ",
    "<br",
    "<p",
    "<h1",
    "<b>",
    "<!--",
];

/// Bytes inspected when sniffing
const SNIFF_LENGTH: usize = 512;

/// Content type to use for a body served without one
pub fn sniff_content_type(body: &[u8]) -> &'static str {
    if body.is_empty() {
        return "text/html";
    }
    if body.starts_with(b"\xEF\xBB\xBF")
        || body.starts_with(b"\xFE\xFF")
        || body.starts_with(b"\xFF\xFE")
    {
        return "text/plain";
    }

    let head = &body[..body.len().min(SNIFF_LENGTH)];
    let text = String::from_utf8_lossy(head);
    let trimmed = text.trim_start().to_ascii_lowercase();
    if HTML_SNIFF_PATTERNS.iter().any(|p| trimmed.starts_with(p)) {
        return "text/html";
    }

    let is_binary = head
        .iter()
        .any(|&b| b < 0x09 || (0x0E..0x1B).contains(&b) || (0x1C..0x20).contains(&b));
    if is_binary {
        "application/octet-stream"
    } else {
        "text/plain"
    }
}

/// A loaded page of any kind
#[derive(Debug, Clone)]
pub enum Page {
    Html(HtmlPage),
    Xml(XmlPage),
    JavaScript(JavaScriptPage),
    Text(TextPage),
    Unexpected(UnexpectedPage),
}

impl Page {
    pub fn web_response(&self) -> &WebResponse {
        match self {
            Page::Html(page) => page.web_response(),
            Page::Xml(page) => page.web_response(),
            Page::JavaScript(page) => page.web_response(),
            Page::Text(page) => page.web_response(),
            Page::Unexpected(page) => page.web_response(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.web_response().url
    }

    pub fn enclosing_window(&self) -> WindowId {
        match self {
            Page::Html(page) => page.enclosing_window(),
            Page::Xml(page) => page.enclosing_window(),
            Page::JavaScript(page) => page.enclosing_window(),
            Page::Text(page) => page.enclosing_window(),
            Page::Unexpected(page) => page.enclosing_window(),
        }
    }

    pub fn page_type(&self) -> PageType {
        match self {
            Page::Html(_) => PageType::Html,
            Page::Xml(_) => PageType::Xml,
            Page::JavaScript(_) => PageType::JavaScript,
            Page::Text(_) => PageType::Text,
            Page::Unexpected(_) => PageType::Unknown,
        }
    }

    pub fn is_html_page(&self) -> bool {
        matches!(self, Page::Html(_))
    }

    pub fn as_html(&self) -> Option<&HtmlPage> {
        match self {
            Page::Html(page) => Some(page),
            _ => None,
        }
    }

    pub fn into_html(self) -> Option<HtmlPage> {
        match self {
            Page::Html(page) => Some(page),
            _ => None,
        }
    }
}

/// Turns responses into pages
pub trait PageCreator: Send + Sync {
    fn create_page(&self, response: WebResponse, window: WindowId) -> Result<Page>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPageCreator;

impl DefaultPageCreator {
    pub fn new() -> Self {
        Self
    }

    /// Page type of a response, sniffing the body when no content type was sent
    pub fn page_type_for(response: &WebResponse) -> PageType {
        let content_type = response.content_type();
        if content_type.is_empty() {
            determine_page_type(sniff_content_type(&response.body))
        } else {
            determine_page_type(&content_type)
        }
    }
}

impl PageCreator for DefaultPageCreator {
    fn create_page(&self, response: WebResponse, window: WindowId) -> Result<Page> {
        let page_type = Self::page_type_for(&response);
        tracing::debug!(
            "[PageCreator] {} ({:?}) -> {:?}",
            response.url,
            response.content_type(),
            page_type
        );

        let page = match page_type {
            PageType::Html => Page::Html(HtmlPage::new(response, window)),
            PageType::Xml => Page::Xml(XmlPage::new(response, window)),
            PageType::JavaScript => Page::JavaScript(JavaScriptPage::new(response, window)),
            PageType::Text => Page::Text(TextPage::new(response, window)),
            PageType::Unknown => Page::Unexpected(UnexpectedPage::new(response, window)),
        };
        Ok(page)
    }
}

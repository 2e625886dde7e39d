//! Non-HTML pages: text, script, XML and anything unexpected

use quick_xml::events::Event;
use quick_xml::Reader;
use std::sync::Arc;

use crate::error::{BrowserError, Result};
use crate::response::WebResponse;
use crate::window::WindowId;

/// Plain text (and any other `text/*`) content
#[derive(Debug, Clone)]
pub struct TextPage {
    response: Arc<WebResponse>,
    window: WindowId,
}

impl TextPage {
    pub fn new(response: WebResponse, window: WindowId) -> Self {
        Self {
            response: Arc::new(response),
            window,
        }
    }

    pub fn web_response(&self) -> &WebResponse {
        &self.response
    }

    pub fn enclosing_window(&self) -> WindowId {
        self.window
    }

    pub fn content(&self) -> String {
        self.response.content_as_string()
    }
}

/// A script loaded directly into a window
#[derive(Debug, Clone)]
pub struct JavaScriptPage {
    response: Arc<WebResponse>,
    window: WindowId,
}

impl JavaScriptPage {
    pub fn new(response: WebResponse, window: WindowId) -> Self {
        Self {
            response: Arc::new(response),
            window,
        }
    }

    pub fn web_response(&self) -> &WebResponse {
        &self.response
    }

    pub fn enclosing_window(&self) -> WindowId {
        self.window
    }

    pub fn content(&self) -> String {
        self.response.content_as_string()
    }
}

/// Binary or otherwise unknown content
#[derive(Debug, Clone)]
pub struct UnexpectedPage {
    response: Arc<WebResponse>,
    window: WindowId,
}

impl UnexpectedPage {
    pub fn new(response: WebResponse, window: WindowId) -> Self {
        Self {
            response: Arc::new(response),
            window,
        }
    }

    pub fn web_response(&self) -> &WebResponse {
        &self.response
    }

    pub fn enclosing_window(&self) -> WindowId {
        self.window
    }

    pub fn input_bytes(&self) -> &[u8] {
        &self.response.body
    }
}

/// XML content; a malformed document still makes a page
#[derive(Debug, Clone)]
pub struct XmlPage {
    response: Arc<WebResponse>,
    window: WindowId,
    root_element_name: Option<String>,
    parse_error: Option<String>,
}

impl XmlPage {
    pub fn new(response: WebResponse, window: WindowId) -> Self {
        let (root_element_name, parse_error) = match scan_xml(&response.content_as_string()) {
            Ok(root) => (root, None),
            Err(e) => {
                tracing::debug!("[XmlPage] {} is not well formed: {}", response.url, e);
                (None, Some(e.to_string()))
            }
        };
        Self {
            response: Arc::new(response),
            window,
            root_element_name,
            parse_error,
        }
    }

    pub fn web_response(&self) -> &WebResponse {
        &self.response
    }

    pub fn enclosing_window(&self) -> WindowId {
        self.window
    }

    pub fn content(&self) -> String {
        self.response.content_as_string()
    }

    /// Name of the document element, `None` when empty or malformed
    pub fn root_element_name(&self) -> Option<&str> {
        self.root_element_name.as_deref()
    }

    pub fn is_well_formed(&self) -> bool {
        self.parse_error.is_none()
    }

    /// Fails with the parse error of a malformed document
    pub fn check_well_formed(&self) -> Result<()> {
        match &self.parse_error {
            Some(e) => Err(BrowserError::MalformedXml(e.clone())),
            None => Ok(()),
        }
    }
}

/// Walk the whole document, returning the root element name
fn scan_xml(source: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(source);
    let mut root = None;
    let mut depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => {
                if root.is_none() {
                    root = Some(String::from_utf8_lossy(element.name().as_ref()).into_owned());
                }
                depth += 1;
            }
            Ok(Event::Empty(element)) => {
                if root.is_none() {
                    root = Some(String::from_utf8_lossy(element.name().as_ref()).into_owned());
                }
            }
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(BrowserError::MalformedXml(format!(
                    "{} at position {}",
                    e,
                    reader.buffer_position()
                )))
            }
        }
    }

    if depth > 0 {
        return Err(BrowserError::MalformedXml(format!(
            "{depth} element(s) left unclosed"
        )));
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::WebRequest;

    fn xml_response(body: &str) -> WebResponse {
        WebResponse::from_text(
            WebRequest::parse("http://example.com/feed.xml").unwrap(),
            "application/xml",
            body,
        )
    }

    #[test]
    fn test_well_formed_xml() {
        let page = XmlPage::new(xml_response("<?xml version=\"1.0\"?><feed><e/></feed>"), 1);
        assert!(page.is_well_formed());
        assert_eq!(page.root_element_name(), Some("feed"));
        assert!(page.check_well_formed().is_ok());
    }

    #[test]
    fn test_malformed_xml_still_makes_a_page() {
        let page = XmlPage::new(xml_response("<feed><e></feed>"), 1);
        assert!(!page.is_well_formed());
        assert!(matches!(
            page.check_well_formed(),
            Err(BrowserError::MalformedXml(_))
        ));

        let unclosed = XmlPage::new(xml_response("<feed><e/>"), 1);
        assert!(!unclosed.is_well_formed());
    }

    #[test]
    fn test_text_and_unexpected_pages() {
        let text = TextPage::new(
            WebResponse::from_text(WebRequest::parse("http://e.com/").unwrap(), "text/plain", "hi"),
            3,
        );
        assert_eq!(text.content(), "hi");
        assert_eq!(text.enclosing_window(), 3);

        let binary = UnexpectedPage::new(
            WebResponse::new(WebRequest::parse("http://e.com/b").unwrap(), 200, vec![], vec![0, 1, 2]),
            3,
        );
        assert_eq!(binary.input_bytes(), &[0, 1, 2]);
    }
}

//! Canned-response connection for tests and offline use

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

use super::WebConnection;
use crate::error::{BrowserError, Result};
use crate::request::WebRequest;
use crate::response::{default_status_message, WebResponse};

#[derive(Debug, Clone)]
struct MockResponse {
    status_code: u16,
    status_message: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl MockResponse {
    fn to_web_response(&self, request: &WebRequest) -> WebResponse {
        let mut response = WebResponse::new(
            request.clone(),
            self.status_code,
            self.headers.clone(),
            self.body.clone(),
        );
        response.url = request.effective_url();
        response.status_message = self.status_message.clone();
        response
    }
}

/// Serves configured responses keyed by URL and records what was asked
#[derive(Debug, Default)]
pub struct MockWebConnection {
    responses: DashMap<String, MockResponse>,
    default_response: RwLock<Option<MockResponse>>,
    requests: RwLock<Vec<WebRequest>>,
    request_count: AtomicUsize,
}

impl MockWebConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full control over the response for one URL
    pub fn set_response_with_headers(
        &self,
        url: &str,
        body: impl Into<Vec<u8>>,
        status_code: u16,
        headers: Vec<(String, String)>,
    ) {
        self.responses.insert(
            normalize_key(url),
            MockResponse {
                status_code,
                status_message: default_status_message(status_code).to_string(),
                headers,
                body: body.into(),
            },
        );
    }

    pub fn set_response(&self, url: &str, body: impl Into<Vec<u8>>, status_code: u16, content_type: &str) {
        self.set_response_with_headers(
            url,
            body,
            status_code,
            vec![("Content-Type".to_string(), content_type.to_string())],
        );
    }

    /// 200 response with an HTML body
    pub fn set_response_as_html(&self, url: &str, html: &str) {
        self.set_response(url, html, 200, "text/html; charset=UTF-8");
    }

    /// 200 response with a plain-text body
    pub fn set_response_as_text(&self, url: &str, text: &str) {
        self.set_response(url, text, 200, "text/plain; charset=UTF-8");
    }

    /// Response for every URL without its own entry
    pub fn set_default_response(&self, body: impl Into<Vec<u8>>, status_code: u16, content_type: &str) {
        *self.default_response.write() = Some(MockResponse {
            status_code,
            status_message: default_status_message(status_code).to_string(),
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body: body.into(),
        });
    }

    pub fn last_request(&self) -> Option<WebRequest> {
        self.requests.read().last().cloned()
    }

    /// Effective URLs of all requests, oldest first
    pub fn requested_urls(&self) -> Vec<String> {
        self.requests
            .read()
            .iter()
            .map(|r| r.effective_url().to_string())
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    fn lookup(&self, url: &Url) -> Option<MockResponse> {
        let mut exact = url.clone();
        exact.set_fragment(None);
        if let Some(found) = self.responses.get(exact.as_str()) {
            return Some(found.clone());
        }

        let mut without_query = exact;
        without_query.set_query(None);
        if let Some(found) = self.responses.get(without_query.as_str()) {
            return Some(found.clone());
        }

        self.default_response.read().clone()
    }
}

#[async_trait]
impl WebConnection for MockWebConnection {
    async fn get_response(&self, request: &WebRequest) -> Result<WebResponse> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.write().push(request.clone());

        let url = request.effective_url();
        let mock = self
            .lookup(&url)
            .ok_or_else(|| BrowserError::NoMockResponse(url.to_string()))?;
        Ok(mock.to_web_response(request))
    }
}

fn normalize_key(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_configured_and_default_responses() {
        let connection = MockWebConnection::new();
        connection.set_response_as_html("http://example.com", "<p>home</p>");
        connection.set_default_response("missing", 404, "text/plain");

        let home = connection
            .get_response(&WebRequest::parse("http://example.com/#top").unwrap())
            .await
            .unwrap();
        assert_eq!(home.status_code, 200);
        assert_eq!(home.content_as_string(), "<p>home</p>");

        let other = connection
            .get_response(&WebRequest::parse("http://example.com/other").unwrap())
            .await
            .unwrap();
        assert_eq!(other.status_code, 404);
        assert_eq!(other.status_message, "Not Found");
        assert_eq!(connection.request_count(), 2);
    }

    #[tokio::test]
    async fn test_query_falls_back_to_path() {
        let connection = MockWebConnection::new();
        connection.set_response_as_text("http://example.com/search", "results");

        let request = WebRequest::parse("http://example.com/search")
            .unwrap()
            .with_parameter("q", "x");
        let response = connection.get_response(&request).await.unwrap();
        assert_eq!(response.content_as_string(), "results");
        assert_eq!(
            connection.last_request().unwrap().parameters,
            vec![("q".to_string(), "x".to_string())]
        );
        assert_eq!(connection.requested_urls(), vec!["http://example.com/search?q=x"]);
    }

    #[tokio::test]
    async fn test_unknown_url_fails() {
        let connection = MockWebConnection::new();
        let result = connection
            .get_response(&WebRequest::parse("http://nowhere.test/").unwrap())
            .await;
        assert!(matches!(result, Err(BrowserError::NoMockResponse(_))));
    }
}

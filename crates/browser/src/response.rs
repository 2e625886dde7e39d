//! Response of a single HTTP (or file/data/about) exchange

use encoding_rs::{Encoding, UTF_8};
use std::time::Duration;
use url::Url;

use crate::request::WebRequest;

#[derive(Debug, Clone)]
pub struct WebResponse {
    /// The request that produced this response
    pub request: WebRequest,
    /// Final URL, differs from the request URL after redirects
    pub url: Url,
    pub status_code: u16,
    pub status_message: String,
    /// Headers in wire order
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub load_time: Duration,
}

impl WebResponse {
    pub fn new(request: WebRequest, status_code: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        let url = request.url.clone();
        Self {
            request,
            url,
            status_code,
            status_message: default_status_message(status_code).to_string(),
            headers,
            body,
            load_time: Duration::ZERO,
        }
    }

    /// A 200 response with a text body of the given content type
    pub fn from_text(request: WebRequest, content_type: &str, content: impl Into<String>) -> Self {
        let content_type = if content_type.contains("charset") {
            content_type.to_string()
        } else {
            format!("{content_type}; charset=UTF-8")
        };
        Self::new(
            request,
            200,
            vec![("Content-Type".to_string(), content_type)],
            content.into().into_bytes(),
        )
    }

    /// First value of a header (names are case-insensitive)
    pub fn response_header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// All values of a header, in wire order
    pub fn response_header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Media type, lowercased, parameters stripped; empty when absent
    pub fn content_type(&self) -> String {
        self.response_header_value("Content-Type")
            .and_then(|value| value.split(';').next())
            .map(|value| value.trim().to_ascii_lowercase())
            .unwrap_or_default()
    }

    /// Charset parameter of the content type, if any
    pub fn content_charset(&self) -> Option<String> {
        let value = self.response_header_value("Content-Type")?;
        value.split(';').skip(1).find_map(|param| {
            let (key, value) = param.split_once('=')?;
            if key.trim().eq_ignore_ascii_case("charset") {
                Some(value.trim().trim_matches('"').to_ascii_uppercase())
            } else {
                None
            }
        })
    }

    /// Encoding named by the charset parameter, UTF-8 when absent or unknown
    pub fn content_encoding(&self) -> &'static Encoding {
        self.content_charset()
            .and_then(|charset| Encoding::for_label(charset.as_bytes()))
            .unwrap_or(UTF_8)
    }

    /// Body decoded as text; a byte order mark overrides the charset
    pub fn content_as_string(&self) -> String {
        let (text, _, _) = self.content_encoding().decode(&self.body);
        text.into_owned()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status_code, 301 | 302 | 303 | 307 | 308)
    }
}

/// Reason phrase for the common status codes
pub fn default_status_message(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(content_type: &str, body: &[u8]) -> WebResponse {
        WebResponse::new(
            WebRequest::parse("http://example.com/").unwrap(),
            200,
            vec![("content-type".to_string(), content_type.to_string())],
            body.to_vec(),
        )
    }

    #[test]
    fn test_content_type_and_charset() {
        let r = response("Text/HTML; Charset=\"utf-8\"", b"");
        assert_eq!(r.content_type(), "text/html");
        assert_eq!(r.content_charset().as_deref(), Some("UTF-8"));
        assert_eq!(r.response_header_value("Content-Type"), Some("Text/HTML; Charset=\"utf-8\""));
    }

    #[test]
    fn test_latin1_decoding() {
        let r = response("text/plain; charset=ISO-8859-1", &[0x63, 0x61, 0x66, 0xE9]);
        assert_eq!(r.content_as_string(), "café");
    }

    #[test]
    fn test_windows_1252_and_shift_jis_decoding() {
        let r = response("text/plain; charset=windows-1252", &[0x80, 0x93, 0x94]);
        assert_eq!(r.content_as_string(), "€“”");

        let r = response("text/html; charset=Shift_JIS", &[0x82, 0xA0]);
        assert_eq!(r.content_as_string(), "あ");
    }

    #[test]
    fn test_unknown_charset_falls_back_to_utf8() {
        let r = response("text/plain; charset=x-made-up", "naïve".as_bytes());
        assert_eq!(r.content_encoding(), UTF_8);
        assert_eq!(r.content_as_string(), "naïve");
    }

    #[test]
    fn test_bom_is_stripped() {
        let r = response("text/plain", b"\xEF\xBB\xBFhello");
        assert_eq!(r.content_as_string(), "hello");
    }

    #[test]
    fn test_from_text() {
        let r = WebResponse::from_text(
            WebRequest::parse("http://example.com/").unwrap(),
            "text/html",
            "<p>x</p>",
        );
        assert!(r.is_success());
        assert_eq!(r.status_message, "OK");
        assert_eq!(r.content_charset().as_deref(), Some("UTF-8"));
    }
}

//! Request settings for a single HTTP exchange

use encoding_rs::{Encoding, UTF_8};
use serde::{Deserialize, Serialize};
use url::{form_urlencoded, Url};

use crate::credentials::Credentials;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    Trace,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Trace => "TRACE",
        }
    }

    /// Parse a form `method` attribute; anything but POST means GET
    pub fn from_form_attribute(value: Option<&str>) -> Self {
        match value {
            Some(method) if method.trim().eq_ignore_ascii_case("post") => HttpMethod::Post,
            _ => HttpMethod::Get,
        }
    }

    /// Whether parameters travel in the query string
    pub fn parameters_in_query(&self) -> bool {
        matches!(
            self,
            HttpMethod::Get | HttpMethod::Head | HttpMethod::Delete | HttpMethod::Options
        )
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FormEncoding {
    #[default]
    UrlEncoded,
    Multipart,
}

impl FormEncoding {
    /// Parse a form `enctype` attribute
    pub fn from_enctype(value: Option<&str>) -> Self {
        match value {
            Some(enctype) if enctype.trim().eq_ignore_ascii_case("multipart/form-data") => {
                FormEncoding::Multipart
            }
            _ => FormEncoding::UrlEncoded,
        }
    }
}

/// Everything needed to issue one request
#[derive(Debug, Clone)]
pub struct WebRequest {
    pub url: Url,
    pub method: HttpMethod,
    pub additional_headers: Vec<(String, String)>,
    /// Form parameters; query string for GET-like methods, body otherwise
    pub parameters: Vec<(String, String)>,
    /// Raw body; wins over `parameters` for body-carrying methods
    pub body: Option<String>,
    pub encoding: FormEncoding,
    /// Charset label form parameters are encoded in
    pub charset: String,
    pub credentials: Option<Credentials>,
}

impl WebRequest {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            method: HttpMethod::Get,
            additional_headers: Vec::new(),
            parameters: Vec::new(),
            body: None,
            encoding: FormEncoding::UrlEncoded,
            charset: "UTF-8".to_string(),
            credentials: None,
        }
    }

    pub fn parse(url: &str) -> crate::Result<Self> {
        Ok(Self::new(Url::parse(url)?))
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set a header, replacing any existing value (names are case-insensitive)
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.additional_headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.additional_headers.push((name, value.into()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.additional_headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// URL actually sent on the wire, with GET parameters in the query
    pub fn effective_url(&self) -> Url {
        let mut url = self.url.clone();
        if self.method.parameters_in_query() && !self.parameters.is_empty() {
            let query = match url.query().filter(|q| !q.is_empty()) {
                Some(existing) => format!("{existing}&{}", self.encoded_parameters()),
                None => self.encoded_parameters(),
            };
            url.set_query(Some(&query));
        }
        url
    }

    /// Encoding the parameters are sent in, UTF-8 for unknown labels
    pub fn form_encoding(&self) -> &'static Encoding {
        Encoding::for_label(self.charset.as_bytes()).unwrap_or(UTF_8)
    }

    /// Parameters as `application/x-www-form-urlencoded`, each name and
    /// value encoded in [`WebRequest::charset`] before percent-escaping
    pub fn encoded_parameters(&self) -> String {
        let encoding = self.form_encoding();
        let escape = |text: &str| {
            let (bytes, _, _) = encoding.encode(text);
            form_urlencoded::byte_serialize(&bytes).collect::<String>()
        };
        self.parameters
            .iter()
            .map(|(name, value)| format!("{}={}", escape(name), escape(value)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Key used by the cache: effective URL without fragment
    pub fn cache_key(&self) -> String {
        let mut url = self.effective_url();
        url.set_fragment(None);
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_parameters_go_to_query() {
        let request = WebRequest::parse("http://example.com/search?x=1")
            .unwrap()
            .with_parameter("q", "rust lang");
        assert_eq!(
            request.effective_url().as_str(),
            "http://example.com/search?x=1&q=rust+lang"
        );
    }

    #[test]
    fn test_parameters_follow_the_request_charset() {
        let mut request = WebRequest::parse("http://example.com/search")
            .unwrap()
            .with_parameter("q", "café €");
        assert_eq!(request.encoded_parameters(), "q=caf%C3%A9+%E2%82%AC");

        request.charset = "windows-1252".to_string();
        assert_eq!(request.encoded_parameters(), "q=caf%E9+%80");
        assert_eq!(
            request.effective_url().as_str(),
            "http://example.com/search?q=caf%E9+%80"
        );

        // unmappable characters become numeric references
        request.charset = "ISO-8859-2".to_string();
        request.parameters = vec![("q".to_string(), "€".to_string())];
        assert_eq!(request.encoded_parameters(), "q=%26%238364%3B");
    }

    #[test]
    fn test_post_parameters_stay_out_of_query() {
        let request = WebRequest::parse("http://example.com/submit")
            .unwrap()
            .with_method(HttpMethod::Post)
            .with_parameter("q", "v");
        assert_eq!(request.effective_url().as_str(), "http://example.com/submit");
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let request = WebRequest::parse("http://example.com/")
            .unwrap()
            .with_header("Accept", "a")
            .with_header("accept", "b");
        assert_eq!(request.header("ACCEPT"), Some("b"));
        assert_eq!(request.additional_headers.len(), 1);
    }

    #[test]
    fn test_cache_key_drops_fragment() {
        let request = WebRequest::parse("http://example.com/a#frag").unwrap();
        assert_eq!(request.cache_key(), "http://example.com/a");
    }

    #[test]
    fn test_form_attributes() {
        assert_eq!(HttpMethod::from_form_attribute(Some(" POST ")), HttpMethod::Post);
        assert_eq!(HttpMethod::from_form_attribute(Some("dialog")), HttpMethod::Get);
        assert_eq!(
            FormEncoding::from_enctype(Some("multipart/form-data")),
            FormEncoding::Multipart
        );
    }
}

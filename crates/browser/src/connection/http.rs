//! HTTP transport over reqwest
//!
//! Marshalling only: the request settings become a reqwest request, the
//! reqwest response becomes a `WebResponse`. No retries, except one.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use url::Url;

use super::WebConnection;
use crate::error::{BrowserError, Result};
use crate::options::WebClientOptions;
use crate::request::{FormEncoding, HttpMethod, WebRequest};
use crate::response::WebResponse;

/// Redirect hops followed before giving up
const MAX_REDIRECTS: usize = 20;

pub struct HttpWebConnection {
    client: reqwest::Client,
}

impl HttpWebConnection {
    pub fn new(options: &WebClientOptions) -> Result<Self> {
        let redirect = if options.redirect_enabled {
            reqwest::redirect::Policy::limited(MAX_REDIRECTS)
        } else {
            reqwest::redirect::Policy::none()
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(options.timeout_ms))
            .redirect(redirect)
            .user_agent(options.browser_version.user_agent())
            .danger_accept_invalid_certs(options.use_insecure_ssl)
            .cookie_store(options.cookies_enabled)
            .build()?;

        Ok(Self { client })
    }

    async fn send(&self, request: &WebRequest, url: Url) -> Result<WebResponse> {
        let started = Instant::now();
        let mut builder = self.client.request(reqwest_method(request.method), url);

        for (name, value) in &request.additional_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(credentials) = &request.credentials {
            builder = builder.basic_auth(&credentials.username, Some(&credentials.password));
        }

        if !request.method.parameters_in_query() {
            if let Some(body) = &request.body {
                builder = builder.body(body.clone());
            } else if !request.parameters.is_empty() {
                builder = match request.encoding {
                    FormEncoding::UrlEncoded => builder
                        .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                        .body(request.encoded_parameters()),
                    FormEncoding::Multipart => {
                        let encoding = request.form_encoding();
                        let form = request
                            .parameters
                            .iter()
                            .fold(reqwest::multipart::Form::new(), |form, (name, value)| {
                                let (bytes, _, _) = encoding.encode(value);
                                form.part(name.clone(), reqwest::multipart::Part::bytes(bytes.into_owned()))
                            });
                        builder.multipart(form)
                    }
                };
            }
        }

        let response = builder.send().await?;
        let status = response.status();
        let final_url = response.url().clone();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        let mut web_response = WebResponse::new(request.clone(), status.as_u16(), headers, body);
        web_response.url = final_url;
        web_response.status_message = status.canonical_reason().unwrap_or("").to_string();
        web_response.load_time = started.elapsed();
        Ok(web_response)
    }
}

#[async_trait]
impl WebConnection for HttpWebConnection {
    async fn get_response(&self, request: &WebRequest) -> Result<WebResponse> {
        let url = request.effective_url();
        tracing::debug!("[HttpWebConnection] {} {}", request.method, url);

        match self.send(request, url.clone()).await {
            Err(BrowserError::Http(e)) if !e.is_timeout() => match with_trailing_slash(&url) {
                // Some servers only answer directory URLs with the slash present
                Some(retry_url) => {
                    tracing::debug!(
                        "[HttpWebConnection] {} failed ({}), retrying as {}",
                        url,
                        e,
                        retry_url
                    );
                    self.send(request, retry_url).await
                }
                None => Err(BrowserError::Http(e)),
            },
            other => other,
        }
    }
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Trace => reqwest::Method::TRACE,
    }
}

/// The URL with `/` appended when its last segment looks like a directory
fn with_trailing_slash(url: &Url) -> Option<Url> {
    if url.query().is_some() || url.path().ends_with('/') {
        return None;
    }
    let last_segment = url.path_segments()?.next_back()?;
    if last_segment.is_empty() || last_segment.contains('.') {
        return None;
    }
    let mut retry = url.clone();
    retry.set_path(&format!("{}/", url.path()));
    Some(retry)
}

//! Page loading
//!
//! Request -> response (by scheme) -> page -> window, then the HTML page
//! is initialised: scripts, frames, `onload`, refresh. Frames and refreshes
//! load into windows again, so the window-level entry point is boxed.

use base64::Engine as _;
use futures_util::future::BoxFuture;
use percent_encoding::percent_decode_str;
use serde_json::Value;
use std::path::Path;
use url::Url;

use super::WebClient;
use crate::error::{BrowserError, Result, ScriptError};
use crate::events::WebWindowEvent;
use crate::page::{HtmlPage, Page};
use crate::refresh::{parse_refresh, RefreshAction, MAX_REFRESH_CHAIN};
use crate::request::{HttpMethod, WebRequest};
use crate::response::WebResponse;
use crate::script::{cancels_default, is_javascript_type};
use crate::window::WindowId;

#[derive(Debug, Clone, Copy)]
pub(crate) struct LoadContext {
    /// Refreshes followed to get here
    pub refresh_count: usize,
    pub record_history: bool,
}

impl LoadContext {
    pub fn navigation() -> Self {
        Self {
            refresh_count: 0,
            record_history: true,
        }
    }

    pub fn history_replay() -> Self {
        Self {
            refresh_count: 0,
            record_history: false,
        }
    }
}

pub(crate) fn about_blank() -> Result<Url> {
    Ok(Url::parse("about:blank")?)
}

/// Empty HTML response for `about:` URLs
pub(crate) fn blank_response() -> Result<WebResponse> {
    Ok(blank_response_for(WebRequest::new(about_blank()?)))
}

fn blank_response_for(request: WebRequest) -> WebResponse {
    WebResponse::from_text(request, "text/html", "")
}

impl WebClient {
    /// Load `url` into the current window
    pub async fn get_page(&self, url: &str) -> Result<Page> {
        self.get_page_with_request(WebRequest::parse(url)?).await
    }

    /// Load the configured homepage into the current window
    pub async fn get_home_page(&self) -> Result<Page> {
        let homepage = self.options().homepage.clone();
        self.get_page(&homepage).await
    }

    /// Load a request into the current window, opening one if none is left
    pub async fn get_page_with_request(&self, request: WebRequest) -> Result<Page> {
        let window = match self.current_window() {
            Some(window) => window,
            None => self.open_window(None, "").await?,
        };
        self.get_page_in_window(window, request).await
    }

    pub async fn get_page_in_window(&self, window: WindowId, request: WebRequest) -> Result<Page> {
        self.load_into_window(window, request, LoadContext::navigation()).await
    }

    pub(crate) fn load_into_window(
        &self,
        window: WindowId,
        request: WebRequest,
        context: LoadContext,
    ) -> BoxFuture<'_, Result<Page>> {
        Box::pin(async move {
            self.ensure_open(window)?;

            if request.url.scheme() == "javascript" {
                return self.run_javascript_url(window, &request.url, context).await;
            }
            if let Some(page) = self.navigate_within_page(window, &request, context).await {
                return Ok(page);
            }

            tracing::debug!("[WebClient] Loading {} into window {}", request.url, window);
            let response = self.load_web_response(&request).await?;
            self.load_response_into_window(window, response, context).await
        })
    }

    /// Same document, different fragment: no reload, just a history entry
    async fn navigate_within_page(&self, window: WindowId, request: &WebRequest, context: LoadContext) -> Option<Page> {
        if request.method != HttpMethod::Get || !request.parameters.is_empty() {
            return None;
        }
        request.url.fragment()?;

        let page = self.enclosed_page(window)?;
        let mut current = page.url().clone();
        let mut target = request.url.clone();
        current.set_fragment(None);
        target.set_fragment(None);
        if current != target || current.scheme() == "about" {
            return None;
        }

        let old_url = {
            let mut windows = self.inner.windows.write();
            let w = windows.get_mut(&window)?;
            let old_url = w.history.current().map(Url::to_string);
            if context.record_history {
                w.history.push(request.url.clone());
            }
            old_url
        };
        tracing::debug!("[WebClient] Fragment navigation to {}", request.url);
        self.fire(WebWindowEvent::ContentChanged {
            window,
            old_url,
            new_url: request.url.to_string(),
        })
        .await;
        Some(page)
    }

    /// Fetch the response for a request, whatever its scheme
    pub async fn load_web_response(&self, request: &WebRequest) -> Result<WebResponse> {
        let request = self.prepare_request(request.clone());

        match request.url.scheme() {
            "http" | "https" => self.load_http_response(request).await,
            "file" => load_file_response(request).await,
            "about" => Ok(blank_response_for(request)),
            "data" => data_response(request),
            other => Err(BrowserError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Merge client-wide headers and browser defaults into a request
    fn prepare_request(&self, mut request: WebRequest) -> WebRequest {
        let browser = self.browser_version();
        for (name, value) in self.request_headers() {
            if request.header(&name).is_none() {
                request.set_header(name, value);
            }
        }
        let defaults = [
            ("User-Agent", browser.user_agent()),
            ("Accept", browser.html_accept_header()),
            ("Accept-Language", browser.accept_language()),
        ];
        for (name, value) in defaults {
            if request.header(name).is_none() {
                request.set_header(name, value);
            }
        }
        request
    }

    async fn load_http_response(&self, request: WebRequest) -> Result<WebResponse> {
        if let Some(cached) = self.cache().cached_response(&request) {
            tracing::debug!("[Cache] Hit for {}", request.url);
            return Ok(cached);
        }

        let connection = self.web_connection();
        let mut response = connection.get_response(&request).await?;

        if response.status_code == 401 && request.credentials.is_none() {
            if let Some(credentials) = self.credentials_for_challenge(&request, &response) {
                tracing::debug!("[WebClient] Retrying {} with credentials for {}", request.url, credentials.username);
                let retry = request.clone().with_credentials(credentials);
                response = connection.get_response(&retry).await?;
            }
        }

        self.cache().cache_if_possible(&request, &response);
        Ok(response)
    }

    fn credentials_for_challenge(
        &self,
        request: &WebRequest,
        response: &WebResponse,
    ) -> Option<crate::credentials::Credentials> {
        let challenge = response.response_header_value("WWW-Authenticate")?;
        let scheme = challenge.split_whitespace().next().unwrap_or_default();
        let realm = crate::credentials::parse_basic_realm(challenge);
        let scope = crate::credentials::AuthScope::new(
            request.url.host_str(),
            request.url.port_or_known_default(),
            realm.as_deref(),
        )
        .with_scheme(scheme);
        self.credentials_provider().get_credentials(&scope)
    }

    /// Turn a response into a page in `window` and initialise it
    pub(crate) async fn load_response_into_window(
        &self,
        window: WindowId,
        response: WebResponse,
        context: LoadContext,
    ) -> Result<Page> {
        let failing = response.status_code >= 400;
        if failing {
            self.log_failing_response(&response);
        }
        let failure = failing.then(|| BrowserError::FailingHttpStatusCode {
            status: response.status_code,
            message: response.status_message.clone(),
            url: response.url.to_string(),
        });

        let page = self.page_creator().create_page(response, window)?;
        self.set_enclosed_page(window, page.clone(), context.record_history).await?;
        tracing::info!("[WebClient] Window {} now shows {}", window, page.url());

        if let Page::Html(html) = &page {
            self.initialize_html_page(html, context).await?;
        }

        if let Some(failure) = failure {
            if self.options().throw_exception_on_failing_status_code {
                return Err(failure);
            }
        }
        Ok(self.enclosed_page(window).unwrap_or(page))
    }

    /// Replace the page of a window; the old page's frames and jobs go away
    async fn set_enclosed_page(&self, window: WindowId, page: Page, record_history: bool) -> Result<()> {
        let (old_url, children, jobs) = {
            let mut windows = self.inner.windows.write();
            let target = windows
                .get_mut(&window)
                .ok_or(BrowserError::WindowClosed(window))?;
            let old_url = target.page.as_ref().map(|p| p.url().to_string());
            if record_history {
                target.history.push(page.url().clone());
            }
            target.page = Some(page.clone());
            (old_url, std::mem::take(&mut target.children), target.jobs.clone())
        };

        let interrupted = jobs.interrupt_all();
        if interrupted > 0 {
            tracing::debug!("[WebClient] {} job(s) of the previous page interrupted", interrupted);
        }
        for child in children {
            self.close_window_tree(child).await;
        }

        self.fire(WebWindowEvent::ContentChanged {
            window,
            old_url,
            new_url: page.url().to_string(),
        })
        .await;
        Ok(())
    }

    async fn initialize_html_page(&self, page: &HtmlPage, context: LoadContext) -> Result<()> {
        if self.is_javascript_enabled() {
            self.run_page_scripts(page).await?;
        }
        self.load_frames(page).await?;
        if self.is_javascript_enabled() {
            if let Some(body) = page.with_document(|doc| doc.body()) {
                self.run_event_handler(page, body, "load")?;
            }
        }
        self.apply_refresh(page, context).await
    }

    /// Create and load a window for every `<frame>`/`<iframe>`
    async fn load_frames(&self, page: &HtmlPage) -> Result<()> {
        let parent = page.enclosing_window();
        let depth = self.frame_depth(parent) + 1;
        let max_depth = self.options().max_frame_depth;

        for element in page.frame_elements() {
            let name = page
                .attribute(element, "name")
                .or_else(|| page.attribute(element, "id"))
                .unwrap_or_default();
            let frame = self.register_frame(name.clone(), parent, element)?;
            self.fire(WebWindowEvent::Opened { window: frame, name }).await;

            let src = page
                .attribute(element, "src")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty() && s != "about:blank");

            let request = match src {
                _ if depth > max_depth => {
                    let error = BrowserError::FrameDepthExceeded { current: depth, max: max_depth };
                    tracing::warn!("[WebClient] Frame in {} not loaded: {}", page.url(), error);
                    WebRequest::new(about_blank()?)
                }
                Some(src) => match page.resolve_url(&src) {
                    Ok(url) => WebRequest::new(url).with_header("Referer", page.url().as_str()),
                    Err(e) => {
                        tracing::warn!("[WebClient] Bad frame src {:?}: {}", src, e);
                        WebRequest::new(about_blank()?)
                    }
                },
                None => WebRequest::new(about_blank()?),
            };

            if let Err(e) = self.load_into_window(frame, request, LoadContext::navigation()).await {
                tracing::warn!("[WebClient] Frame {} failed to load: {}", frame, e);
                if self.enclosed_page(frame).is_some() {
                    continue;
                }
                if let Err(e) = self
                    .load_into_window(frame, WebRequest::new(about_blank()?), LoadContext::navigation())
                    .await
                {
                    tracing::warn!("[WebClient] Frame {} left empty: {}", frame, e);
                }
            }
        }
        Ok(())
    }

    /// Run `<script>` elements in document order
    async fn run_page_scripts(&self, page: &HtmlPage) -> Result<()> {
        let Some(engine) = self.script_engine() else {
            return Ok(());
        };

        for script in page.script_elements() {
            let node = page.node(script)?;
            if !is_javascript_type(node.attr("type"), node.attr("language")) {
                tracing::debug!("[WebClient] Skipping script of type {:?}", node.attr("type"));
                continue;
            }

            let (source, source_name) = match node.attr("src").map(str::trim).filter(|s| !s.is_empty()) {
                Some(src) => {
                    let url = match page.resolve_url(src) {
                        Ok(url) => url,
                        Err(e) => {
                            tracing::warn!("[WebClient] Bad script src {:?}: {}", src, e);
                            continue;
                        }
                    };
                    match self.load_script_source(page, &url).await? {
                        Some(source) => (source, url.to_string()),
                        None => continue,
                    }
                }
                None => (
                    page.with_document(|doc| doc.raw_text_content(script)),
                    page.url().to_string(),
                ),
            };

            let result = engine.execute(page, &source, &source_name, 1);
            self.handle_script_result(result)?;
        }
        Ok(())
    }

    /// Fetch an external script; `None` when it failed and that is tolerated
    async fn load_script_source(&self, page: &HtmlPage, url: &Url) -> Result<Option<String>> {
        let request = WebRequest::new(url.clone())
            .with_header("Accept", self.browser_version().script_accept_header())
            .with_header("Referer", page.url().as_str());
        let response = match self.load_web_response(&request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("[WebClient] Script {} not loaded: {}", url, e);
                return Ok(None);
            }
        };

        if response.status_code >= 400 {
            self.log_failing_response(&response);
            if self.options().throw_exception_on_failing_status_code {
                return Err(BrowserError::FailingHttpStatusCode {
                    status: response.status_code,
                    message: response.status_message.clone(),
                    url: response.url.to_string(),
                });
            }
            return Ok(None);
        }
        Ok(Some(response.content_as_string()))
    }

    /// Raise or log a script fault, depending on the options
    pub(crate) fn handle_script_result(
        &self,
        result: std::result::Result<Value, ScriptError>,
    ) -> Result<Option<Value>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if self.options().throw_exception_on_script_error => Err(e.into()),
            Err(e) => {
                tracing::warn!("[WebClient] Script error ignored: {}", e);
                Ok(None)
            }
        }
    }

    /// Run the `on<event>` attribute of a node; false when the handler
    /// cancelled the default action
    pub(crate) fn run_event_handler(&self, page: &HtmlPage, node: hbrowser_dom::NodeId, event: &str) -> Result<bool> {
        if !self.options().javascript_enabled {
            return Ok(true);
        }
        let (Some(engine), Some(source)) = (self.script_engine(), page.event_handler(node, event)) else {
            return Ok(true);
        };

        let source_name = match page.xpath(node) {
            Ok(path) => format!("on{event} handler of {path} in {}", page.url()),
            Err(_) => format!("on{event} handler in {}", page.url()),
        };
        let result = self.handle_script_result(engine.execute(page, &source, &source_name, 1))?;
        Ok(!result.as_ref().is_some_and(cancels_default))
    }

    /// Follow a `Refresh` header or meta refresh, as the handler decides
    async fn apply_refresh(&self, page: &HtmlPage, context: LoadContext) -> Result<()> {
        let content = page
            .web_response()
            .response_header_value("Refresh")
            .map(String::from)
            .or_else(|| page.meta_refresh());
        let Some(directive) = content.as_deref().and_then(parse_refresh) else {
            return Ok(());
        };

        let target = match &directive.url {
            Some(url) => page.resolve_url(url)?,
            None => page.url().clone(),
        };
        let same_url = target == *page.url();

        match self.refresh_handler().decide(directive.delay, same_url) {
            RefreshAction::Ignore => {
                tracing::debug!("[WebClient] Ignoring refresh of {} to {}", page.url(), target);
                Ok(())
            }
            RefreshAction::Loop => {
                tracing::warn!("[WebClient] Refresh of {} to itself aborted", target);
                Err(BrowserError::RefreshLoop(target.to_string()))
            }
            RefreshAction::Refresh(wait) => {
                if context.refresh_count >= MAX_REFRESH_CHAIN {
                    tracing::warn!("[WebClient] Giving up after {} refreshes", context.refresh_count);
                    return Err(BrowserError::RefreshLoop(target.to_string()));
                }
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }

                let window = page.enclosing_window();
                let still_shown = matches!(
                    self.enclosed_page(window),
                    Some(Page::Html(current)) if current.same_page(page)
                );
                if !still_shown {
                    return Ok(());
                }

                tracing::debug!("[WebClient] Refreshing window {} to {}", window, target);
                let request = WebRequest::new(target).with_header("Referer", page.url().as_str());
                let next = LoadContext {
                    refresh_count: context.refresh_count + 1,
                    record_history: !same_url,
                };
                self.load_into_window(window, request, next).await.map(|_| ())
            }
        }
    }

    /// `javascript:` navigation: run the code in the window's page; a string
    /// result becomes the new page content
    async fn run_javascript_url(&self, window: WindowId, url: &Url, context: LoadContext) -> Result<Page> {
        let current = self
            .enclosed_page(window)
            .ok_or(BrowserError::WindowClosed(window))?;
        let Page::Html(page) = &current else {
            return Ok(current);
        };

        let code = url.as_str().get("javascript:".len()..).unwrap_or_default();
        let source = percent_decode_str(code).decode_utf8_lossy().into_owned();

        match self.execute_javascript(page, &source)? {
            Some(Value::String(content)) => {
                let request = WebRequest::new(page.url().clone());
                let response = WebResponse::from_text(request, "text/html", content);
                self.load_response_into_window(window, response, context).await
            }
            _ => Ok(self.enclosed_page(window).unwrap_or(current)),
        }
    }
}

async fn load_file_response(request: WebRequest) -> Result<WebResponse> {
    let path = request.url.to_file_path().map_err(|_| {
        BrowserError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("not a local file: {}", request.url),
        ))
    })?;

    match tokio::fs::read(&path).await {
        Ok(body) => {
            let headers = guess_content_type(&path)
                .map(|ct| vec![("Content-Type".to_string(), ct.to_string())])
                .unwrap_or_default();
            Ok(WebResponse::new(request, 200, headers, body))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("[WebClient] File not found: {}", path.display());
            let content = format!("File: {}", path.display());
            let mut response = WebResponse::from_text(request, "text/html", content);
            response.status_code = 404;
            response.status_message = "Not Found".to_string();
            Ok(response)
        }
        Err(e) => Err(e.into()),
    }
}

/// Content type for a local file, from its extension
pub fn guess_content_type(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let content_type = match extension.as_str() {
        "html" | "htm" => "text/html",
        "xhtml" => "application/xhtml+xml",
        "xml" => "text/xml",
        "js" | "mjs" => "text/javascript",
        "css" => "text/css",
        "txt" | "text" => "text/plain",
        "json" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "gif" => "image/gif",
        "jpg" | "jpeg" => "image/jpeg",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        _ => return None,
    };
    Some(content_type)
}

fn data_response(request: WebRequest) -> Result<WebResponse> {
    let (media_type, body) = parse_data_url(request.url.as_str())?;
    Ok(WebResponse::new(
        request,
        200,
        vec![("Content-Type".to_string(), media_type)],
        body,
    ))
}

/// Split a `data:` URL into media type and payload
pub fn parse_data_url(url: &str) -> Result<(String, Vec<u8>)> {
    let invalid = || BrowserError::InvalidDataUrl(hbrowser_dom::utils::cap_text_length(url, 80));

    let rest = match url.get(..5) {
        Some(scheme) if scheme.eq_ignore_ascii_case("data:") => &url[5..],
        _ => return Err(invalid()),
    };
    let (meta, payload) = rest.split_once(',').ok_or_else(invalid)?;

    let mut params: Vec<&str> = meta.split(';').map(str::trim).collect();
    let base64 = params.last().is_some_and(|p| p.eq_ignore_ascii_case("base64"));
    if base64 {
        params.pop();
    }
    let media_type = match params.split_first() {
        Some((first, _)) if !first.is_empty() => params.join(";"),
        Some((_, others)) if !others.is_empty() => format!("text/plain;{}", others.join(";")),
        _ => "text/plain;charset=US-ASCII".to_string(),
    };

    let decoded: Vec<u8> = percent_decode_str(payload).collect();
    let body = if base64 {
        let compact: Vec<u8> = decoded.into_iter().filter(|b| !b.is_ascii_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(&compact)
            .map_err(|_| invalid())?
    } else {
        decoded
    };
    Ok((media_type, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_url() {
        let (media_type, body) = parse_data_url("data:text/html,%3Cp%3Ehi%3C/p%3E").unwrap();
        assert_eq!(media_type, "text/html");
        assert_eq!(body, b"<p>hi</p>");

        let (media_type, body) = parse_data_url("data:text/plain;base64,aGVs bG8=").unwrap();
        assert_eq!(media_type, "text/plain");
        assert_eq!(body, b"hello");

        let (media_type, body) = parse_data_url("data:,plain").unwrap();
        assert_eq!(media_type, "text/plain;charset=US-ASCII");
        assert_eq!(body, b"plain");

        let (media_type, _) = parse_data_url("data:;charset=utf-8,x").unwrap();
        assert_eq!(media_type, "text/plain;charset=utf-8");
    }

    #[test]
    fn test_invalid_data_urls() {
        assert!(matches!(parse_data_url("data:text/plain"), Err(BrowserError::InvalidDataUrl(_))));
        assert!(matches!(
            parse_data_url("data:;base64,@@@"),
            Err(BrowserError::InvalidDataUrl(_))
        ));
        assert!(parse_data_url("http://x/").is_err());
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(Path::new("/tmp/a.HTML")), Some("text/html"));
        assert_eq!(guess_content_type(Path::new("feed.xml")), Some("text/xml"));
        assert_eq!(guess_content_type(Path::new("noext")), None);
        assert_eq!(guess_content_type(Path::new("x.unknown")), None);
    }
}

//! User actions: clicking, typing, submitting, scripting, history

use hbrowser_dom::NodeId;
use serde_json::Value;
use std::time::Duration;

use super::loader::LoadContext;
use super::WebClient;
use crate::error::{BrowserError, Result};
use crate::jobs::JobId;
use crate::page::{HtmlPage, Page};
use crate::request::WebRequest;
use crate::window::WindowId;

/// How a click on an element is handled after its `onclick`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClickDefault {
    FollowLink,
    Submit,
    Toggle { radio: bool },
    Nothing,
}

fn click_default(page: &HtmlPage, node: NodeId) -> Result<ClickDefault> {
    let element = page.node(node)?;
    let kind = element.attr("type").map(str::to_ascii_lowercase);
    let default = match (element.node_name.as_str(), kind.as_deref()) {
        ("a" | "area", _) if element.has_attr("href") => ClickDefault::FollowLink,
        ("input", Some("submit" | "image")) => ClickDefault::Submit,
        ("input", Some("checkbox")) => ClickDefault::Toggle { radio: false },
        ("input", Some("radio")) => ClickDefault::Toggle { radio: true },
        ("button", None | Some("submit")) => ClickDefault::Submit,
        _ => ClickDefault::Nothing,
    };
    Ok(default)
}

impl WebClient {
    /// Click an element and return the page that results
    ///
    /// Links are followed (honouring their target), submit buttons submit
    /// their form, checkboxes and radios toggle. A handler returning `false`
    /// cancels all of that.
    pub async fn click(&self, page: &HtmlPage, node: NodeId) -> Result<Page> {
        let element = page.node(node)?;
        let window = page.enclosing_window();
        if element.has_attr("disabled") {
            tracing::debug!("[WebClient] Click on disabled <{}> ignored", element.node_name);
            return self.page_after_action(window, page);
        }

        let default = click_default(page, node)?;
        let was_checked = page.is_checked(node);
        let mut before_toggle = Vec::new();
        if let ClickDefault::Toggle { radio } = default {
            before_toggle = page.checked_states(node)?;
            page.set_checked(node, radio || !was_checked)?;
        }

        if !self.run_event_handler(page, node, "click")? {
            page.restore_checked(&before_toggle)?;
            return self.page_after_action(window, page);
        }

        match default {
            ClickDefault::FollowLink => self.follow_link(page, node).await,
            ClickDefault::Submit => match page.with_document(|doc| doc.closest(node, "form")) {
                Some(form) => self.submit_form(page, form, Some(node)).await,
                None => self.page_after_action(window, page),
            },
            ClickDefault::Toggle { .. } => {
                if page.is_checked(node) != was_checked {
                    self.run_event_handler(page, node, "change")?;
                }
                self.page_after_action(window, page)
            }
            ClickDefault::Nothing => self.page_after_action(window, page),
        }
    }

    /// Append `text` to the value of an input or textarea, then fire `onchange`
    pub async fn type_into(&self, page: &HtmlPage, node: NodeId, text: &str) -> Result<()> {
        let element = page.node(node)?;
        if !(element.is_tag("input") || element.is_tag("textarea")) {
            return Err(BrowserError::element_not_found("input", "node", &node.to_string()));
        }
        if element.has_attr("disabled") || element.has_attr("readonly") {
            tracing::debug!("[WebClient] Typing into read-only <{}> ignored", element.node_name);
            return Ok(());
        }

        let mut value = page.control_value(node)?;
        value.push_str(text);
        if let Some(max) = element.attr("maxlength").and_then(|m| m.trim().parse::<usize>().ok()) {
            value = value.chars().take(max).collect();
        }
        page.set_input_value(node, &value)?;
        self.run_event_handler(page, node, "change")?;
        Ok(())
    }

    /// Submit `form`, optionally on behalf of a submit button
    pub async fn submit_form(&self, page: &HtmlPage, form: NodeId, submitter: Option<NodeId>) -> Result<Page> {
        let window = page.enclosing_window();
        if !self.run_event_handler(page, form, "submit")? {
            tracing::debug!("[WebClient] Submission cancelled by onsubmit");
            return self.page_after_action(window, page);
        }

        let submission = page.form_submission(form, submitter)?;
        tracing::debug!(
            "[WebClient] Submitting {} {} to {:?}",
            submission.request.method,
            submission.request.url,
            submission.target
        );
        let target = self.resolve_target_window(window, &submission.target).await?;
        self.get_page_in_window(target, submission.request).await
    }

    async fn follow_link(&self, page: &HtmlPage, anchor: NodeId) -> Result<Page> {
        let href = page.attribute(anchor, "href").unwrap_or_default();
        let url = page.resolve_url(&href)?;
        let target = page
            .attribute(anchor, "target")
            .or_else(|| page.base_target())
            .unwrap_or_default();

        let window = self.resolve_target_window(page.enclosing_window(), &target).await?;
        let request = WebRequest::new(url).with_header("Referer", page.url().as_str());
        self.get_page_in_window(window, request).await
    }

    /// Window a link or form with `target` loads into
    pub async fn resolve_target_window(&self, from: WindowId, target: &str) -> Result<WindowId> {
        let target = target.trim();
        let keyword = target.to_ascii_lowercase();
        match keyword.as_str() {
            "" | "_self" => Ok(from),
            "_parent" => Ok(self
                .web_window(from)
                .and_then(|w| w.parent())
                .unwrap_or(from)),
            "_top" => self.top_window(from),
            "_blank" => {
                let opener = self.top_window(from).ok();
                self.open_window_from(None, "", opener).await
            }
            _ => match self.web_window_by_name(target) {
                Ok(window) => Ok(window),
                Err(_) => {
                    let opener = self.top_window(from).ok();
                    self.open_window_from(None, target, opener).await
                }
            },
        }
    }

    /// Page shown in `window` now, falling back to the page acted on
    fn page_after_action(&self, window: WindowId, page: &HtmlPage) -> Result<Page> {
        Ok(self
            .enclosed_page(window)
            .unwrap_or_else(|| Page::Html(page.clone())))
    }

    /// Run source in a page; `None` when scripting is off or the fault was
    /// only logged
    pub fn execute_javascript(&self, page: &HtmlPage, source: &str) -> Result<Option<Value>> {
        if !self.options().javascript_enabled {
            return Ok(None);
        }
        let Some(engine) = self.script_engine() else {
            tracing::debug!("[WebClient] No script engine, not running script in {}", page.url());
            return Ok(None);
        };
        let source_name = format!("injected script in {}", page.url());
        self.handle_script_result(engine.execute(page, source, &source_name, 1))
    }

    /// Run `source` in the window's page after `delay`, as a background job
    /// of that window
    pub fn set_timeout(&self, window: WindowId, delay: Duration, source: impl Into<String>) -> Result<Option<JobId>> {
        let jobs = self.window_jobs(window)?;
        let client = self.clone();
        let source = source.into();

        Ok(jobs.start_job("setTimeout", async move {
            tokio::time::sleep(delay).await;
            let Some(Page::Html(page)) = client.enclosed_page(window) else {
                return;
            };
            if let Err(e) = client.execute_javascript(&page, &source) {
                tracing::error!("[JobManager] Timer in window {} failed: {}", window, e);
            }
        }))
    }

    /// Load the previous history entry; `None` at the start of history
    pub async fn go_back(&self, window: WindowId) -> Result<Option<Page>> {
        let url = self.step_history(window, |history| history.back())?;
        self.load_history_entry(window, url).await
    }

    /// Load the next history entry; `None` at the end of history
    pub async fn go_forward(&self, window: WindowId) -> Result<Option<Page>> {
        let url = self.step_history(window, |history| history.forward())?;
        self.load_history_entry(window, url).await
    }

    fn step_history(
        &self,
        window: WindowId,
        step: impl FnOnce(&mut crate::window::History) -> Option<url::Url>,
    ) -> Result<Option<url::Url>> {
        let mut windows = self.inner.windows.write();
        let target = windows
            .get_mut(&window)
            .ok_or(BrowserError::WindowClosed(window))?;
        Ok(step(&mut target.history))
    }

    async fn load_history_entry(&self, window: WindowId, url: Option<url::Url>) -> Result<Option<Page>> {
        let Some(url) = url else {
            return Ok(None);
        };
        tracing::debug!("[WebClient] History navigation in window {} to {}", window, url);
        self.load_into_window(window, WebRequest::new(url), LoadContext::history_replay())
            .await
            .map(Some)
    }
}

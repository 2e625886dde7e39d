//! HTML pages
//!
//! An `HtmlPage` is a cheap handle: clones share the same parsed document,
//! so changes made through one handle (typing, checking boxes, scripts) are
//! visible through every other.

use encoding_rs::Encoding;
use hbrowser_dom::{Document, DomNode, DomSerializer, NodeId};
use parking_lot::RwLock;
use std::sync::Arc;
use url::Url;

use crate::error::{BrowserError, Result};
use crate::request::{FormEncoding, HttpMethod, WebRequest};
use crate::response::WebResponse;
use crate::window::WindowId;

/// A request produced by submitting a form, plus where to show the result
#[derive(Debug, Clone)]
pub struct FormSubmission {
    pub request: WebRequest,
    /// Target window name (`_self`, `_blank`, a frame name...), empty for self
    pub target: String,
}

#[derive(Debug)]
struct HtmlPageInner {
    response: WebResponse,
    window: WindowId,
    document: RwLock<Document>,
}

#[derive(Debug, Clone)]
pub struct HtmlPage {
    inner: Arc<HtmlPageInner>,
}

impl HtmlPage {
    pub fn new(response: WebResponse, window: WindowId) -> Self {
        let document = Document::parse_html(&response.content_as_string());
        Self {
            inner: Arc::new(HtmlPageInner {
                response,
                window,
                document: RwLock::new(document),
            }),
        }
    }

    pub fn web_response(&self) -> &WebResponse {
        &self.inner.response
    }

    pub fn url(&self) -> &Url {
        &self.inner.response.url
    }

    pub fn enclosing_window(&self) -> WindowId {
        self.inner.window
    }

    /// Whether two handles refer to the same loaded page
    pub fn same_page(&self, other: &HtmlPage) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Read access to the document; don't call back into the page inside `f`
    pub fn with_document<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(&self.inner.document.read())
    }

    /// Write access to the document; don't call back into the page inside `f`
    pub fn with_document_mut<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        f(&mut self.inner.document.write())
    }

    /// Copy of a node
    pub fn node(&self, node_id: NodeId) -> Result<DomNode> {
        self.with_document(|doc| doc.node(node_id).cloned())
            .map_err(BrowserError::from)
    }

    /// Positional path of a node, e.g. `/html[1]/body[1]/a[2]`
    pub fn xpath(&self, node_id: NodeId) -> Result<String> {
        self.with_document(|doc| DomSerializer::new().generate_xpath(doc.arena(), node_id))
            .map_err(BrowserError::from)
    }

    pub fn title_text(&self) -> String {
        self.with_document(|doc| doc.title_text())
    }

    pub fn attribute(&self, node_id: NodeId, name: &str) -> Option<String> {
        self.with_document(|doc| {
            doc.node(node_id)
                .ok()
                .and_then(|n| n.attr(name).map(String::from))
        })
    }

    pub fn text_content(&self, node_id: NodeId) -> String {
        self.with_document(|doc| doc.text_content(node_id))
    }

    pub fn element_by_id(&self, id: &str) -> Result<NodeId> {
        self.with_document(|doc| doc.element_by_id(id))
            .ok_or_else(|| BrowserError::element_not_found("*", "id", id))
    }

    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.with_document(|doc| doc.elements_by_tag(tag))
    }

    /// All `<a>` elements with an `href`
    pub fn anchors(&self) -> Vec<NodeId> {
        self.with_document(|doc| {
            doc.arena()
                .find(|n| n.is_tag("a") && n.has_attr("href"))
        })
    }

    pub fn anchor_by_href(&self, href: &str) -> Result<NodeId> {
        self.with_document(|doc| doc.elements_by_attribute("a", "href", href).first().copied())
            .ok_or_else(|| BrowserError::element_not_found("a", "href", href))
    }

    pub fn anchor_by_name(&self, name: &str) -> Result<NodeId> {
        self.with_document(|doc| doc.elements_by_attribute("a", "name", name).first().copied())
            .ok_or_else(|| BrowserError::element_not_found("a", "name", name))
    }

    /// First anchor whose collapsed text equals `text`
    pub fn anchor_by_text(&self, text: &str) -> Result<NodeId> {
        self.with_document(|doc| {
            doc.elements_by_tag("a")
                .into_iter()
                .find(|&id| doc.text_content(id) == text)
        })
        .ok_or_else(|| BrowserError::element_not_found("a", "<text>", text))
    }

    pub fn forms(&self) -> Vec<NodeId> {
        self.elements_by_tag("form")
    }

    pub fn form_by_name(&self, name: &str) -> Result<NodeId> {
        self.with_document(|doc| doc.elements_by_attribute("form", "name", name).first().copied())
            .ok_or_else(|| BrowserError::element_not_found("form", "name", name))
    }

    /// First form control named `name` inside `form`
    pub fn input_by_name(&self, form: NodeId, name: &str) -> Result<NodeId> {
        self.with_document(|doc| {
            doc.descendant_elements(form).into_iter().find(|&id| {
                doc.node(id).is_ok_and(|n| {
                    is_form_control(n) && n.attr("name") == Some(name)
                })
            })
        })
        .ok_or_else(|| BrowserError::element_not_found("input", "name", name))
    }

    /// All form controls inside `form`, in document order
    pub fn form_controls(&self, form: NodeId) -> Vec<NodeId> {
        self.with_document(|doc| {
            doc.descendant_elements(form)
                .into_iter()
                .filter(|&id| doc.node(id).is_ok_and(is_form_control))
                .collect()
        })
    }

    /// Current value of a control: `value` attribute, textarea text or the
    /// selected option of a select
    pub fn control_value(&self, node_id: NodeId) -> Result<String> {
        self.with_document(|doc| {
            let node = doc.node(node_id)?;
            Ok(match node.node_name.as_str() {
                "textarea" => doc.raw_text_content(node_id),
                "select" => selected_options(doc, node_id)
                    .first()
                    .map(|&option| option_value(doc, option))
                    .unwrap_or_default(),
                _ => node.attr("value").unwrap_or_default().to_string(),
            })
        })
    }

    /// Set the value of an input, textarea or select
    pub fn set_input_value(&self, node_id: NodeId, value: &str) -> Result<()> {
        let tag = self.node(node_id)?.node_name;
        match tag.as_str() {
            "textarea" => self.with_document_mut(|doc| {
                doc.arena_mut().set_text_content(node_id, value)
            })?,
            "select" => self.select_option(node_id, value)?,
            _ => self.with_document_mut(|doc| {
                doc.arena_mut().set_attribute(node_id, "value", value)
            })?,
        }
        Ok(())
    }

    /// Check or uncheck a checkbox/radio; checking a radio unchecks the
    /// other radios of the same name in the same form
    pub fn set_checked(&self, node_id: NodeId, checked: bool) -> Result<()> {
        self.with_document_mut(|doc| {
            if checked {
                for sibling in radio_group(doc, node_id)? {
                    if sibling != node_id {
                        doc.arena_mut().remove_attribute(sibling, "checked")?;
                    }
                }
                doc.arena_mut().set_attribute(node_id, "checked", "checked")?;
            } else {
                doc.arena_mut().remove_attribute(node_id, "checked")?;
            }
            Ok(())
        })
    }

    /// Checked state of a control and, for a radio, of every radio in its group
    pub fn checked_states(&self, node_id: NodeId) -> Result<Vec<(NodeId, bool)>> {
        self.with_document(|doc| {
            let mut group = radio_group(doc, node_id)?;
            if group.is_empty() {
                group.push(node_id);
            }
            Ok(group
                .into_iter()
                .map(|id| (id, doc.node(id).is_ok_and(|n| n.has_attr("checked"))))
                .collect())
        })
    }

    /// Put back states taken with [`HtmlPage::checked_states`]
    pub fn restore_checked(&self, states: &[(NodeId, bool)]) -> Result<()> {
        self.with_document_mut(|doc| {
            for &(id, checked) in states {
                if checked {
                    doc.arena_mut().set_attribute(id, "checked", "checked")?;
                } else {
                    doc.arena_mut().remove_attribute(id, "checked")?;
                }
            }
            Ok(())
        })
    }

    pub fn is_checked(&self, node_id: NodeId) -> bool {
        self.attribute(node_id, "checked").is_some()
    }

    /// Select the option whose value (or text) is `value`; single selects
    /// drop their previous selection
    pub fn select_option(&self, select: NodeId, value: &str) -> Result<()> {
        self.with_document_mut(|doc| {
            let multiple = doc.node(select)?.has_attr("multiple");
            let options: Vec<NodeId> = doc
                .descendant_elements(select)
                .into_iter()
                .filter(|&id| doc.node(id).is_ok_and(|n| n.is_tag("option")))
                .collect();
            let chosen = options
                .iter()
                .copied()
                .find(|&id| option_value(doc, id) == value)
                .ok_or_else(|| BrowserError::element_not_found("option", "value", value))?;

            for option in options {
                if option == chosen {
                    doc.arena_mut().set_attribute(option, "selected", "selected")?;
                } else if !multiple {
                    doc.arena_mut().remove_attribute(option, "selected")?;
                }
            }
            Ok(())
        })
    }

    /// `<frame>` and `<iframe>` elements in document order
    pub fn frame_elements(&self) -> Vec<NodeId> {
        self.with_document(|doc| doc.arena().find(|n| n.is_tag("frame") || n.is_tag("iframe")))
    }

    /// `<script>` elements in document order
    pub fn script_elements(&self) -> Vec<NodeId> {
        self.elements_by_tag("script")
    }

    /// Inline event handler source, e.g. `onclick`
    pub fn event_handler(&self, node_id: NodeId, event_type: &str) -> Option<String> {
        self.attribute(node_id, &format!("on{event_type}"))
            .filter(|source| !source.trim().is_empty())
    }

    /// Base for relative URLs: the first `<base href>`, else the page URL
    pub fn base_url(&self) -> Url {
        let href = self.with_document(|doc| {
            doc.arena()
                .find_one(|n| n.is_tag("base") && n.has_attr("href"))
                .and_then(|id| doc.node(id).ok()?.attr("href").map(String::from))
        });
        href.and_then(|href| self.url().join(href.trim()).ok())
            .unwrap_or_else(|| self.url().clone())
    }

    /// Default target of the page, from `<base target>`
    pub fn base_target(&self) -> Option<String> {
        self.with_document(|doc| {
            doc.arena()
                .find_one(|n| n.is_tag("base") && n.has_attr("target"))
                .and_then(|id| doc.node(id).ok()?.attr("target").map(String::from))
        })
    }

    pub fn resolve_url(&self, relative: &str) -> Result<Url> {
        Ok(self.base_url().join(relative.trim())?)
    }

    /// Content of `<meta http-equiv="refresh">`
    pub fn meta_refresh(&self) -> Option<String> {
        self.with_document(|doc| {
            doc.arena()
                .find_one(|n| {
                    n.is_tag("meta")
                        && n.attr("http-equiv").is_some_and(|v| v.eq_ignore_ascii_case("refresh"))
                })
                .and_then(|id| doc.node(id).ok()?.attr("content").map(String::from))
        })
    }

    pub fn as_xml(&self) -> String {
        self.with_document(|doc| doc.as_xml())
    }

    pub fn as_text(&self) -> String {
        self.with_document(|doc| doc.as_text())
    }

    /// Build the request a submission of `form` would send
    ///
    /// `submitter` is the button that triggered the submission, if any; it
    /// is the only button whose name/value is sent and its `form*`
    /// attributes override the form's.
    pub fn form_submission(&self, form: NodeId, submitter: Option<NodeId>) -> Result<FormSubmission> {
        let form_node = self.node(form)?;
        if !form_node.is_tag("form") {
            return Err(BrowserError::element_not_found("form", "node", &form.to_string()));
        }
        let submitter_node = submitter.map(|id| self.node(id)).transpose()?;
        let override_attr = |name: &str| -> Option<String> {
            submitter_node
                .as_ref()
                .and_then(|n| n.attr(&format!("form{name}")).map(String::from))
                .or_else(|| form_node.attr(name).map(String::from))
        };

        let method = HttpMethod::from_form_attribute(override_attr("method").as_deref());
        let encoding = FormEncoding::from_enctype(override_attr("enctype").as_deref());
        let action = override_attr("action").unwrap_or_default();
        let mut url = if action.trim().is_empty() {
            self.url().clone()
        } else {
            self.resolve_url(&action)?
        };
        if method == HttpMethod::Get {
            // GET submissions replace the action's query
            url.set_query(None);
        }
        url.set_fragment(None);

        let parameters = self.with_document(|doc| successful_controls(doc, form, submitter));
        let target = override_attr("target")
            .or_else(|| self.base_target())
            .unwrap_or_default();

        let mut request = WebRequest::new(url).with_method(method);
        request.parameters = parameters;
        request.encoding = encoding;
        // first supported accept-charset label, else the page's own encoding
        let charset = form_node
            .attr("accept-charset")
            .and_then(|labels| {
                labels
                    .split([' ', ','])
                    .find_map(|label| Encoding::for_label(label.as_bytes()))
            })
            .unwrap_or_else(|| self.web_response().content_encoding());
        request.charset = charset.name().to_string();
        request.set_header("Referer", self.url().as_str());

        Ok(FormSubmission { request, target })
    }
}

fn is_form_control(node: &DomNode) -> bool {
    matches!(
        node.node_name.as_str(),
        "input" | "select" | "textarea" | "button"
    )
}

fn option_value(doc: &Document, option: NodeId) -> String {
    match doc.node(option).ok().and_then(|n| n.attr("value").map(String::from)) {
        Some(value) => value,
        None => doc.text_content(option),
    }
}

fn selected_options(doc: &Document, select: NodeId) -> Vec<NodeId> {
    let options: Vec<NodeId> = doc
        .descendant_elements(select)
        .into_iter()
        .filter(|&id| doc.node(id).is_ok_and(|n| n.is_tag("option")))
        .collect();
    let selected: Vec<NodeId> = options
        .iter()
        .copied()
        .filter(|&id| doc.node(id).is_ok_and(|n| n.has_attr("selected")))
        .collect();
    let multiple = doc.node(select).is_ok_and(|n| n.has_attr("multiple"));

    match (selected.is_empty(), multiple) {
        // a single select always has something selected
        (true, false) => options.into_iter().take(1).collect(),
        _ => selected,
    }
}

fn is_disabled(doc: &Document, node_id: NodeId) -> bool {
    if doc.node(node_id).is_ok_and(|n| n.has_attr("disabled")) {
        return true;
    }
    doc.arena()
        .ancestors(node_id)
        .unwrap_or_default()
        .into_iter()
        .any(|id| doc.node(id).is_ok_and(|n| n.is_tag("fieldset") && n.has_attr("disabled")))
}

/// Name/value pairs of the controls that take part in a submission
fn successful_controls(doc: &Document, form: NodeId, submitter: Option<NodeId>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    for id in doc.descendant_elements(form) {
        let Ok(node) = doc.node(id) else { continue };
        if !is_form_control(node) || is_disabled(doc, id) {
            continue;
        }
        let Some(name) = node.attr("name").filter(|n| !n.is_empty()) else {
            continue;
        };
        let value = node.attr("value").unwrap_or_default();

        match node.node_name.as_str() {
            "input" => {
                let input_type = node.attr("type").unwrap_or("text").to_ascii_lowercase();
                match input_type.as_str() {
                    "submit" | "button" | "reset" => {
                        if submitter == Some(id) && input_type == "submit" {
                            pairs.push((name.to_string(), value.to_string()));
                        }
                    }
                    "image" => {
                        if submitter == Some(id) {
                            pairs.push((format!("{name}.x"), "0".to_string()));
                            pairs.push((format!("{name}.y"), "0".to_string()));
                        }
                    }
                    "checkbox" | "radio" => {
                        if node.has_attr("checked") {
                            let value = node.attr("value").unwrap_or("on");
                            pairs.push((name.to_string(), value.to_string()));
                        }
                    }
                    "file" => pairs.push((name.to_string(), String::new())),
                    _ => pairs.push((name.to_string(), value.to_string())),
                }
            }
            "button" => {
                let button_type = node.attr("type").unwrap_or("submit");
                if submitter == Some(id) && button_type.eq_ignore_ascii_case("submit") {
                    pairs.push((name.to_string(), value.to_string()));
                }
            }
            "select" => {
                for option in selected_options(doc, id) {
                    pairs.push((name.to_string(), option_value(doc, option)));
                }
            }
            "textarea" => pairs.push((name.to_string(), doc.raw_text_content(id))),
            _ => {}
        }
    }

    pairs
}

/// Named radios sharing `node_id`'s name in its form (or the body), itself
/// included; empty for anything that is not a named radio
fn radio_group(doc: &Document, node_id: NodeId) -> Result<Vec<NodeId>> {
    let node = doc.node(node_id)?;
    let is_radio = |n: &DomNode| n.is_tag("input") && n.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("radio"));
    let (true, Some(name)) = (is_radio(node), node.attr("name")) else {
        return Ok(Vec::new());
    };
    let scope = doc.closest(node_id, "form").or_else(|| doc.body());
    Ok(scope
        .map(|scope| doc.descendant_elements(scope))
        .unwrap_or_default()
        .into_iter()
        .filter(|&id| id == node_id || doc.node(id).is_ok_and(|n| is_radio(n) && n.attr("name") == Some(name)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(html: &str) -> HtmlPage {
        HtmlPage::new(
            WebResponse::from_text(
                WebRequest::parse("http://example.com/dir/page.html").unwrap(),
                "text/html",
                html,
            ),
            1,
        )
    }

    const FORM: &str = r#"<html><body>
        <form name="login" action="/login?stale=1" method="get">
          <input name="user" value="bob">
          <input type="password" name="pass">
          <input type="hidden" name="token" value="t1">
          <input type="checkbox" name="remember" checked>
          <input type="checkbox" name="spam" value="yes">
          <input type="radio" name="lang" value="en" checked>
          <input type="radio" name="lang" value="fr">
          <input name="off" value="x" disabled>
          <select name="color"><option>red</option><option value="b">blue</option></select>
          <textarea name="note">hi there</textarea>
          <input type="submit" name="go" value="Go" id="go">
          <button name="other" value="o" id="other">Other</button>
        </form></body></html>"#;

    #[test]
    fn test_title_and_lookup() {
        let page = page("<title>T</title><a href='/x' id='a'>Link  text</a>");
        assert_eq!(page.title_text(), "T");
        let anchor = page.element_by_id("a").unwrap();
        assert_eq!(page.anchor_by_text("Link text").unwrap(), anchor);
        assert_eq!(page.anchor_by_href("/x").unwrap(), anchor);
        assert!(matches!(
            page.element_by_id("missing"),
            Err(BrowserError::ElementNotFound { .. })
        ));
    }

    #[test]
    fn test_base_url() {
        let plain = page("<a href='x'>x</a>");
        assert_eq!(
            plain.resolve_url("other.html").unwrap().as_str(),
            "http://example.com/dir/other.html"
        );

        let based = page("<head><base href='http://cdn.example.org/root/' target='main'></head>");
        assert_eq!(
            based.resolve_url("a.js").unwrap().as_str(),
            "http://cdn.example.org/root/a.js"
        );
        assert_eq!(based.base_target().as_deref(), Some("main"));
    }

    #[test]
    fn test_form_submission_collects_successful_controls() {
        let page = page(FORM);
        let form = page.form_by_name("login").unwrap();
        let go = page.element_by_id("go").unwrap();

        let submission = page.form_submission(form, Some(go)).unwrap();
        let request = submission.request;
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.url.as_str(), "http://example.com/login");
        assert_eq!(
            request.parameters,
            vec![
                ("user".to_string(), "bob".to_string()),
                ("pass".to_string(), String::new()),
                ("token".to_string(), "t1".to_string()),
                ("remember".to_string(), "on".to_string()),
                ("lang".to_string(), "en".to_string()),
                ("color".to_string(), "red".to_string()),
                ("note".to_string(), "hi there".to_string()),
                ("go".to_string(), "Go".to_string()),
            ]
        );
        assert_eq!(request.header("Referer"), Some("http://example.com/dir/page.html"));
        assert_eq!(submission.target, "");
    }

    #[test]
    fn test_control_changes_show_up_in_submission() {
        let page = page(FORM);
        let form = page.form_by_name("login").unwrap();

        let user = page.input_by_name(form, "user").unwrap();
        page.set_input_value(user, "alice").unwrap();
        let fr = page.with_document(|doc| doc.elements_by_attribute("input", "value", "fr")[0]);
        page.set_checked(fr, true).unwrap();
        let color = page.input_by_name(form, "color").unwrap();
        page.set_input_value(color, "b").unwrap();
        let note = page.input_by_name(form, "note").unwrap();
        page.set_input_value(note, "bye").unwrap();

        assert_eq!(page.control_value(color).unwrap(), "b");
        let params = page.form_submission(form, None).unwrap().request.parameters;
        assert!(params.contains(&("user".to_string(), "alice".to_string())));
        assert!(params.contains(&("lang".to_string(), "fr".to_string())));
        assert!(!params.contains(&("lang".to_string(), "en".to_string())));
        assert!(params.contains(&("color".to_string(), "b".to_string())));
        assert!(params.contains(&("note".to_string(), "bye".to_string())));
        assert!(!params.iter().any(|(name, _)| name == "go" || name == "other"));
    }

    #[test]
    fn test_submitter_overrides() {
        let page = page(
            r#"<form id="f" action="/a" method="get">
               <button id="b" name="b" value="1" formaction="/b" formmethod="post"
                       formtarget="_blank">B</button></form>"#,
        );
        let form = page.element_by_id("f").unwrap();
        let button = page.element_by_id("b").unwrap();

        let submission = page.form_submission(form, Some(button)).unwrap();
        assert_eq!(submission.request.method, HttpMethod::Post);
        assert_eq!(submission.request.url.as_str(), "http://example.com/b");
        assert_eq!(submission.target, "_blank");
        assert_eq!(
            submission.request.parameters,
            vec![("b".to_string(), "1".to_string())]
        );
    }

    #[test]
    fn test_accept_charset_picks_first_known_label() {
        let page = page(
            r#"<form id="a" accept-charset="x-unknown ISO-8859-1"><input name="q"></form>
               <form id="b"><input name="q"></form>"#,
        );
        let first = page.element_by_id("a").unwrap();
        let second = page.element_by_id("b").unwrap();

        let request = page.form_submission(first, None).unwrap().request;
        assert_eq!(request.charset, "windows-1252");
        assert_eq!(page.form_submission(second, None).unwrap().request.charset, "UTF-8");
    }

    #[test]
    fn test_meta_refresh_and_frames() {
        let page = page(
            r#"<head><meta http-equiv="Refresh" content="0; url=/next"></head>
               <body><iframe src="/f1"></iframe><iframe src="/f2"></iframe></body>"#,
        );
        assert_eq!(page.meta_refresh().as_deref(), Some("0; url=/next"));
        assert_eq!(page.frame_elements().len(), 2);
    }

    #[test]
    fn test_clones_share_the_document() {
        let first = page("<input id='i' value='a'>");
        let second = first.clone();
        let input = first.element_by_id("i").unwrap();
        first.set_input_value(input, "b").unwrap();

        assert!(first.same_page(&second));
        assert_eq!(second.attribute(input, "value").as_deref(), Some("b"));
    }

    #[test]
    fn test_xpath_of_node() {
        let page = page("<p>a</p><p><a href='/x' id='a'>x</a></p>");
        let anchor = page.element_by_id("a").unwrap();
        assert_eq!(page.xpath(anchor).unwrap(), "/html[1]/body[1]/p[2]/a[1]");
    }
}

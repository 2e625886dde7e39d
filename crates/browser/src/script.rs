//! Script engine seam
//!
//! No engine is bundled. Whatever implements `ScriptEngine` gets the page it
//! runs in and may read or change that page's document through
//! `HtmlPage::with_document_mut`.

use serde_json::Value;

use crate::error::ScriptError;
use crate::page::HtmlPage;

pub trait ScriptEngine: Send + Sync {
    /// Run `source` in the context of `page`
    ///
    /// `source_name` is the script URL (or the page URL for inline code) and
    /// `start_line` the line of the page the source starts on.
    fn execute(
        &self,
        page: &HtmlPage,
        source: &str,
        source_name: &str,
        start_line: u32,
    ) -> std::result::Result<Value, ScriptError>;

    fn name(&self) -> &str {
        "script-engine"
    }
}

/// Whether a `<script>` with these `type`/`language` attributes is JavaScript
pub fn is_javascript_type(type_attr: Option<&str>, language: Option<&str>) -> bool {
    if let Some(script_type) = type_attr.map(str::trim) {
        if !script_type.is_empty() {
            let essence = script_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            return matches!(
                essence.as_str(),
                "text/javascript"
                    | "application/javascript"
                    | "application/x-javascript"
                    | "text/ecmascript"
                    | "application/ecmascript"
                    | "text/jscript"
                    | "module"
            );
        }
    }

    match language.map(|l| l.trim().to_ascii_lowercase()) {
        None => true,
        Some(language) if language.is_empty() => true,
        Some(language) => {
            language.starts_with("javascript") || language == "jscript" || language == "ecmascript"
        }
    }
}

/// Whether a handler result asks to cancel the default action
pub fn cancels_default(result: &Value) -> bool {
    matches!(result, Value::Bool(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_types() {
        assert!(is_javascript_type(None, None));
        assert!(is_javascript_type(Some(""), None));
        assert!(is_javascript_type(Some("text/javascript"), None));
        assert!(is_javascript_type(Some("Application/JavaScript; charset=utf-8"), None));
        assert!(is_javascript_type(Some("module"), None));
        assert!(!is_javascript_type(Some("text/template"), None));
        assert!(!is_javascript_type(Some("application/ld+json"), None));

        assert!(is_javascript_type(None, Some("JavaScript1.2")));
        assert!(!is_javascript_type(None, Some("vbscript")));
    }

    #[test]
    fn test_cancels_default() {
        assert!(cancels_default(&Value::Bool(false)));
        assert!(!cancels_default(&Value::Bool(true)));
        assert!(!cancels_default(&Value::Null));
        assert!(!cancels_default(&Value::String("false".into())));
    }
}

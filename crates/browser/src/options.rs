//! Client configuration
//!
//! Plain serde structs with defaults, so options can come from code or from a
//! JSON file with only the fields that differ.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{BrowserError, Result};

/// The browser the client pretends to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BrowserVersion {
    #[default]
    Chrome,
    Firefox,
    FirefoxEsr,
    Edge,
}

impl BrowserVersion {
    pub fn nickname(&self) -> &'static str {
        match self {
            BrowserVersion::Chrome => "Chrome",
            BrowserVersion::Firefox => "FF",
            BrowserVersion::FirefoxEsr => "FF-ESR",
            BrowserVersion::Edge => "Edge",
        }
    }

    pub fn user_agent(&self) -> &'static str {
        match self {
            BrowserVersion::Chrome => {
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36"
            }
            BrowserVersion::Firefox => {
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0"
            }
            BrowserVersion::FirefoxEsr => {
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:128.0) Gecko/20100101 Firefox/128.0"
            }
            BrowserVersion::Edge => {
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0"
            }
        }
    }

    /// Accept header sent for page loads
    pub fn html_accept_header(&self) -> &'static str {
        match self {
            BrowserVersion::Firefox | BrowserVersion::FirefoxEsr => {
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
            }
            BrowserVersion::Chrome | BrowserVersion::Edge => {
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,\
                 image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7"
            }
        }
    }

    /// Accept header sent when fetching external scripts
    pub fn script_accept_header(&self) -> &'static str {
        "*/*"
    }

    pub fn accept_language(&self) -> &'static str {
        match self {
            BrowserVersion::Firefox | BrowserVersion::FirefoxEsr => "en-US,en;q=0.5",
            BrowserVersion::Chrome | BrowserVersion::Edge => "en-US,en;q=0.9",
        }
    }
}

impl std::str::FromStr for BrowserVersion {
    type Err = BrowserError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "chrome" => Ok(BrowserVersion::Chrome),
            "firefox" | "ff" => Ok(BrowserVersion::Firefox),
            "firefox-esr" | "ff-esr" => Ok(BrowserVersion::FirefoxEsr),
            "edge" => Ok(BrowserVersion::Edge),
            other => Err(BrowserError::Config(format!("unknown browser version {other:?}"))),
        }
    }
}

/// Web client options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebClientOptions {
    pub browser_version: BrowserVersion,
    pub javascript_enabled: bool,
    pub redirect_enabled: bool,
    pub throw_exception_on_failing_status_code: bool,
    pub throw_exception_on_script_error: bool,
    pub print_content_on_failing_status_code: bool,
    /// Connection and read timeout for HTTP requests
    pub timeout_ms: u64,
    pub use_insecure_ssl: bool,
    pub cookies_enabled: bool,
    /// Refuse windows opened by script code through `open_popup`
    pub popup_blocker_enabled: bool,
    pub max_frame_depth: usize,
    pub cache_max_size: usize,
    pub homepage: String,
    /// How long `close_all_windows` waits for background jobs
    pub background_job_wait_ms: u64,
}

impl Default for WebClientOptions {
    fn default() -> Self {
        Self {
            browser_version: BrowserVersion::default(),
            javascript_enabled: true,
            redirect_enabled: true,
            throw_exception_on_failing_status_code: true,
            throw_exception_on_script_error: true,
            print_content_on_failing_status_code: true,
            timeout_ms: 90_000,
            use_insecure_ssl: false,
            cookies_enabled: true,
            popup_blocker_enabled: false,
            max_frame_depth: 10,
            cache_max_size: 20,
            homepage: "about:blank".to_string(),
            background_job_wait_ms: 1_000,
        }
    }
}

impl WebClientOptions {
    /// Load options from a JSON file; missing fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let options: Self = serde_json::from_str(&raw)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(BrowserError::Config("timeout_ms must be positive".into()));
        }
        if self.cache_max_size == 0 {
            return Err(BrowserError::Config("cache_max_size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let options = WebClientOptions::default();
        assert!(options.javascript_enabled);
        assert!(options.throw_exception_on_failing_status_code);
        assert_eq!(options.cache_max_size, 20);
        assert_eq!(options.homepage, "about:blank");
    }

    #[test]
    fn test_partial_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"javascript_enabled": false, "browser_version": "firefox-esr"}}"#
        )
        .unwrap();

        let options = WebClientOptions::from_json_file(file.path()).unwrap();
        assert!(!options.javascript_enabled);
        assert_eq!(options.browser_version, BrowserVersion::FirefoxEsr);
        assert_eq!(options.timeout_ms, 90_000);
    }

    #[test]
    fn test_invalid_options_rejected() {
        let options = WebClientOptions {
            cache_max_size: 0,
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(BrowserError::Config(_))));
    }

    #[test]
    fn test_browser_version_from_str() {
        assert_eq!("FF".parse::<BrowserVersion>().unwrap(), BrowserVersion::Firefox);
        assert!("netscape".parse::<BrowserVersion>().is_err());
        assert!(BrowserVersion::Edge.user_agent().contains("Edg/"));
    }
}

//! Page refresh handling (`Refresh` header and `<meta http-equiv="refresh">`)

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest chain of refreshes followed before giving up
pub const MAX_REFRESH_CHAIN: usize = 20;

/// What to do when a page asks to be refreshed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshHandler {
    /// Refresh right away whatever the delay; refreshing a page to itself
    /// is an error
    Immediate,
    /// Sleep for the requested delay, capped at `max_wait` when set
    Waiting { max_wait: Option<Duration> },
    /// Refresh right away when the delay is at most `max_delay`, ignore the
    /// refresh otherwise
    Nice { max_delay: Duration },
}

impl Default for RefreshHandler {
    fn default() -> Self {
        RefreshHandler::Nice {
            max_delay: Duration::from_secs(2),
        }
    }
}

/// Decision for one refresh request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RefreshAction {
    Ignore,
    /// Load the target after sleeping this long
    Refresh(Duration),
    /// Refreshing to the same URL without delay would never end
    Loop,
}

impl RefreshHandler {
    pub fn decide(&self, delay: Duration, same_url: bool) -> RefreshAction {
        match *self {
            RefreshHandler::Immediate => {
                if same_url {
                    RefreshAction::Loop
                } else {
                    RefreshAction::Refresh(Duration::ZERO)
                }
            }
            RefreshHandler::Waiting { max_wait } => {
                let wait = max_wait.map_or(delay, |max| delay.min(max));
                RefreshAction::Refresh(wait)
            }
            RefreshHandler::Nice { max_delay } => {
                if delay > max_delay || same_url {
                    RefreshAction::Ignore
                } else {
                    RefreshAction::Refresh(Duration::ZERO)
                }
            }
        }
    }
}

/// A parsed refresh instruction
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshDirective {
    pub delay: Duration,
    /// Target, relative to the page; `None` refreshes the page itself
    pub url: Option<String>,
}

/// Parse `5`, `0; url=/next`, `3;URL='x.html'` or `1, /next`
pub fn parse_refresh(content: &str) -> Option<RefreshDirective> {
    let content = content.trim();
    let (delay_part, rest) = match content.find([';', ',']) {
        Some(i) => (&content[..i], Some(&content[i + 1..])),
        None => (content, None),
    };

    let seconds: f64 = delay_part.trim().parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }

    let url = rest.and_then(|rest| {
        let rest = rest.trim();
        let target = match rest.get(..3) {
            Some(prefix) if prefix.eq_ignore_ascii_case("url") => {
                let after = rest[3..].trim_start();
                after.strip_prefix('=').map(str::trim_start).unwrap_or(rest)
            }
            _ => rest,
        };
        let target = target
            .trim_matches(|c| c == '\'' || c == '"')
            .trim();
        (!target.is_empty()).then(|| target.to_string())
    });

    Some(RefreshDirective {
        // delays beyond what a Duration holds mean "never" for every handler
        delay: Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX),
        url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_refresh() {
        assert_eq!(
            parse_refresh("5"),
            Some(RefreshDirective {
                delay: Duration::from_secs(5),
                url: None
            })
        );
        assert_eq!(
            parse_refresh("0; url=/next").unwrap().url.as_deref(),
            Some("/next")
        );
        assert_eq!(
            parse_refresh(" 3;URL = 'page.html' ").unwrap().url.as_deref(),
            Some("page.html")
        );
        assert_eq!(parse_refresh("1, /other").unwrap().url.as_deref(), Some("/other"));
        assert_eq!(parse_refresh("soon"), None);
        assert_eq!(parse_refresh("-1"), None);
    }

    #[test]
    fn test_parse_refresh_saturates_huge_delays() {
        assert_eq!(parse_refresh("1e30; url=/next").unwrap().delay, Duration::MAX);
        assert_eq!(parse_refresh("99999999999999999999").unwrap().delay, Duration::MAX);
        assert_eq!(
            RefreshHandler::default().decide(Duration::MAX, false),
            RefreshAction::Ignore
        );
    }

    #[test]
    fn test_handler_decisions() {
        let immediate = RefreshHandler::Immediate;
        assert_eq!(immediate.decide(Duration::from_secs(10), false), RefreshAction::Refresh(Duration::ZERO));
        assert_eq!(immediate.decide(Duration::ZERO, true), RefreshAction::Loop);

        let nice = RefreshHandler::default();
        assert_eq!(nice.decide(Duration::from_secs(1), false), RefreshAction::Refresh(Duration::ZERO));
        assert_eq!(nice.decide(Duration::from_secs(5), false), RefreshAction::Ignore);
        assert_eq!(nice.decide(Duration::ZERO, true), RefreshAction::Ignore);

        let waiting = RefreshHandler::Waiting {
            max_wait: Some(Duration::from_millis(100)),
        };
        assert_eq!(
            waiting.decide(Duration::from_secs(3), true),
            RefreshAction::Refresh(Duration::from_millis(100))
        );
    }
}

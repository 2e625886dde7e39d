//! Response cache
//!
//! Write-through: every response the client loads is offered to the cache,
//! which keeps it only when the content looks static. Bounded size, the
//! least recently accessed entry is evicted first.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::request::{HttpMethod, WebRequest};
use crate::response::WebResponse;

/// Content is static when it expires or was modified this far from now
const FRESHNESS_DELAY_MINUTES: i64 = 10;

pub const DEFAULT_MAX_SIZE: usize = 20;

#[derive(Debug, Clone)]
struct CacheEntry {
    response: WebResponse,
    /// Logical access clock, bigger is more recent
    last_access: u64,
}

/// Bounded cache of GET responses keyed by URL
#[derive(Debug)]
pub struct Cache {
    entries: DashMap<String, CacheEntry>,
    max_size: AtomicUsize,
    clock: AtomicU64,
}

impl Cache {
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_SIZE)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_size: AtomicUsize::new(max_size.max(1)),
            clock: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Store the response if it is cacheable; returns whether it was stored
    pub fn cache_if_possible(&self, request: &WebRequest, response: &WebResponse) -> bool {
        if !is_cacheable(request, response, Utc::now()) {
            return false;
        }

        let key = request.cache_key();
        let entry = CacheEntry {
            response: response.clone(),
            last_access: self.tick(),
        };
        self.entries.insert(key.clone(), entry);
        tracing::debug!("[Cache] Stored {}", key);
        self.shrink();
        true
    }

    /// Cached response for a GET request, refreshing its access time
    pub fn cached_response(&self, request: &WebRequest) -> Option<WebResponse> {
        if request.method != HttpMethod::Get {
            return None;
        }
        let stamp = self.tick();
        let mut entry = self.entries.get_mut(&request.cache_key())?;
        entry.last_access = stamp;
        Some(entry.response.clone())
    }

    pub fn max_size(&self) -> usize {
        self.max_size.load(Ordering::SeqCst)
    }

    /// Change the bound; surplus entries are evicted right away
    pub fn set_max_size(&self, max_size: usize) {
        self.max_size.store(max_size.max(1), Ordering::SeqCst);
        self.shrink();
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Evict least recently accessed entries until within bounds
    fn shrink(&self) {
        let max_size = self.max_size();
        while self.entries.len() > max_size {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().last_access)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    tracing::debug!("[Cache] Evicting {}", key);
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a response may be reused for later identical requests
pub fn is_cacheable(request: &WebRequest, response: &WebResponse, now: DateTime<Utc>) -> bool {
    request.method == HttpMethod::Get
        && response.status_code == 200
        && !has_no_store(response)
        && !is_dynamic_content(response, now)
}

fn has_no_store(response: &WebResponse) -> bool {
    response
        .response_header_values("Cache-Control")
        .flat_map(|value| value.split(','))
        .any(|directive| directive.trim().eq_ignore_ascii_case("no-store"))
}

/// Content is static when it expires well in the future, or, without an
/// expiry, when it was last modified well in the past.
fn is_dynamic_content(response: &WebResponse, now: DateTime<Utc>) -> bool {
    let delay = ChronoDuration::minutes(FRESHNESS_DELAY_MINUTES);
    let expires = parse_date_header(response, "Expires");
    let last_modified = parse_date_header(response, "Last-Modified");

    let static_content = match (expires, last_modified) {
        (Some(expires), _) => expires - now > delay,
        (None, Some(last_modified)) => now - last_modified > delay,
        (None, None) => false,
    };
    !static_content
}

fn parse_date_header(response: &WebResponse, name: &str) -> Option<DateTime<Utc>> {
    let value = response.response_header_value(name)?;
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

//! Credentials lookup for HTTP authentication
//!
//! A small map from scopes to credentials. Lookup is a linear scan that keeps
//! the best-scoring scope, which is plenty for the handful of entries a test
//! run registers.

use base64::Engine;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Value for an `Authorization: Basic ...` header
    pub fn basic_authorization(&self) -> String {
        let token = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.username, self.password));
        format!("Basic {token}")
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Where credentials apply; `None` matches anything
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthScope {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub realm: Option<String>,
    pub scheme: Option<String>,
}

impl AuthScope {
    /// Matches every request
    pub fn any() -> Self {
        Self::default()
    }

    pub fn new(host: Option<&str>, port: Option<u16>, realm: Option<&str>) -> Self {
        Self {
            host: host.map(|h| h.to_ascii_lowercase()),
            port,
            realm: realm.map(String::from),
            scheme: None,
        }
    }

    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = Some(scheme.to_ascii_lowercase());
        self
    }

    /// How well `self` (a registered scope) matches `other` (a concrete
    /// challenge). `None` means some specified component disagrees.
    pub fn match_score(&self, other: &AuthScope) -> Option<u8> {
        fn component<T: PartialEq>(mine: &Option<T>, theirs: &Option<T>, weight: u8) -> Option<u8> {
            match (mine, theirs) {
                (Some(a), Some(b)) if a == b => Some(weight),
                (Some(_), Some(_)) => None,
                _ => Some(0),
            }
        }

        let host = match (&self.host, &other.host) {
            (Some(a), Some(b)) if a.eq_ignore_ascii_case(b) => 8,
            (Some(_), Some(_)) => return None,
            _ => 0,
        };
        let scheme = match (&self.scheme, &other.scheme) {
            (Some(a), Some(b)) if a.eq_ignore_ascii_case(b) => 1,
            (Some(_), Some(_)) => return None,
            _ => 0,
        };
        Some(
            host + component(&self.port, &other.port, 4)?
                + component(&self.realm, &other.realm, 2)?
                + scheme,
        )
    }
}

/// Default credentials store
#[derive(Debug, Default)]
pub struct DefaultCredentialsProvider {
    entries: RwLock<Vec<(AuthScope, Credentials)>>,
}

impl DefaultCredentialsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register credentials, replacing those of an identical scope
    pub fn add_credentials(&self, scope: AuthScope, credentials: Credentials) {
        let mut entries = self.entries.write();
        entries.retain(|(existing, _)| existing != &scope);
        tracing::debug!("[Credentials] Added credentials for {:?}", scope);
        entries.push((scope, credentials));
    }

    pub fn remove_credentials(&self, scope: &AuthScope) -> Option<Credentials> {
        let mut entries = self.entries.write();
        let pos = entries.iter().position(|(existing, _)| existing == scope)?;
        Some(entries.remove(pos).1)
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Best credentials for a challenge scope
    pub fn get_credentials(&self, challenge: &AuthScope) -> Option<Credentials> {
        let entries = self.entries.read();
        let mut best: Option<(u8, &Credentials)> = None;
        for (scope, credentials) in entries.iter() {
            if let Some(score) = scope.match_score(challenge) {
                if best.map_or(true, |(best_score, _)| score > best_score) {
                    best = Some((score, credentials));
                }
            }
        }
        best.map(|(_, credentials)| credentials.clone())
    }
}

/// Realm of a `WWW-Authenticate: Basic realm="..."` challenge
pub fn parse_basic_realm(header: &str) -> Option<String> {
    let (scheme, params) = header.trim().split_once(' ').unwrap_or((header.trim(), ""));
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    auth_params(params)
        .into_iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("realm"))
        .map(|(_, value)| value)
}

/// `key=value` pairs of a challenge; quoted values may hold commas and
/// backslash escapes
fn auth_params(params: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut chars = params.chars().peekable();
    loop {
        while chars.next_if(|c| *c == ',' || c.is_whitespace()).is_some() {}
        let key: String = chars.by_ref().take_while(|c| *c != '=').collect();
        let key = key.trim();
        if key.is_empty() {
            break;
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            while let Some(c) = chars.next() {
                match c {
                    '"' => break,
                    '\\' => value.extend(chars.next()),
                    _ => value.push(c),
                }
            }
            while chars.next_if(|c| *c != ',').is_some() {}
        } else {
            while let Some(c) = chars.next_if(|c| *c != ',') {
                value.push(c);
            }
            value = value.trim().to_string();
        }
        pairs.push((key.to_string(), value));
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge(host: &str, port: u16, realm: &str) -> AuthScope {
        AuthScope::new(Some(host), Some(port), Some(realm)).with_scheme("basic")
    }

    #[test]
    fn test_any_scope_matches() {
        let provider = DefaultCredentialsProvider::new();
        provider.add_credentials(AuthScope::any(), Credentials::new("u", "p"));

        let found = provider.get_credentials(&challenge("example.com", 80, "r")).unwrap();
        assert_eq!(found.username, "u");
    }

    #[test]
    fn test_most_specific_scope_wins() {
        let provider = DefaultCredentialsProvider::new();
        provider.add_credentials(AuthScope::any(), Credentials::new("any", "p"));
        provider.add_credentials(
            AuthScope::new(Some("example.com"), None, None),
            Credentials::new("host", "p"),
        );
        provider.add_credentials(
            AuthScope::new(Some("example.com"), Some(80), Some("admin")),
            Credentials::new("exact", "p"),
        );

        let exact = provider.get_credentials(&challenge("EXAMPLE.com", 80, "admin")).unwrap();
        assert_eq!(exact.username, "exact");

        let host = provider.get_credentials(&challenge("example.com", 80, "other")).unwrap();
        assert_eq!(host.username, "host");

        let any = provider.get_credentials(&challenge("other.org", 443, "x")).unwrap();
        assert_eq!(any.username, "any");
    }

    #[test]
    fn test_mismatch_disqualifies() {
        let provider = DefaultCredentialsProvider::new();
        provider.add_credentials(
            AuthScope::new(Some("example.com"), Some(8080), None),
            Credentials::new("u", "p"),
        );
        assert!(provider.get_credentials(&challenge("example.com", 80, "r")).is_none());
    }

    #[test]
    fn test_add_replaces_and_remove() {
        let provider = DefaultCredentialsProvider::new();
        let scope = AuthScope::new(Some("h"), None, None);
        provider.add_credentials(scope.clone(), Credentials::new("a", "1"));
        provider.add_credentials(scope.clone(), Credentials::new("b", "2"));
        assert_eq!(provider.len(), 1);

        assert_eq!(provider.remove_credentials(&scope).unwrap().username, "b");
        assert!(provider.is_empty());
    }

    #[test]
    fn test_basic_authorization() {
        let credentials = Credentials::new("Aladdin", "open sesame");
        assert_eq!(
            credentials.basic_authorization(),
            "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="
        );
        assert!(!format!("{credentials:?}").contains("sesame"));
    }

    #[test]
    fn test_parse_basic_realm() {
        assert_eq!(
            parse_basic_realm(r#"Basic realm="Secure Area", charset="UTF-8""#).as_deref(),
            Some("Secure Area")
        );
        assert_eq!(parse_basic_realm("Digest realm=\"x\""), None);
    }

    #[test]
    fn test_parse_basic_realm_with_quoted_comma() {
        assert_eq!(
            parse_basic_realm(r#"Basic realm="a, b", charset="UTF-8""#).as_deref(),
            Some("a, b")
        );
        assert_eq!(
            parse_basic_realm(r#"Basic charset="UTF-8", realm="say \"hi\"""#).as_deref(),
            Some(r#"say "hi""#)
        );
        assert_eq!(parse_basic_realm("Basic realm=plain").as_deref(), Some("plain"));
        assert_eq!(parse_basic_realm("Basic"), None);
    }
}

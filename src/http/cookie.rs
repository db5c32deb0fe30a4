// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Cookie model, Set-Cookie parsing and the in-memory cookie jar
//!
//! Domains follow the storage-state convention: a leading `.` marks a domain
//! cookie that also matches subdomains, a bare host marks a host-only cookie.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, SubsecRound, TimeZone, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use url::{Host, Url};

/// Longest lifetime granted through `Max-Age`, in seconds (400 days)
const MAX_AGE_CAP_SECS: i64 = 400 * 24 * 60 * 60;

/// A single HTTP cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// `.example.com` for domain cookies, `example.com` for host-only ones
    pub domain: String,
    /// Path the cookie is valid for
    pub path: String,
    /// Expiration time (None = session cookie)
    #[serde(default, with = "expiry")]
    pub expires: Option<DateTime<Utc>>,
    /// HttpOnly flag (not accessible via JavaScript)
    #[serde(default)]
    pub http_only: bool,
    /// Secure flag (HTTPS only)
    #[serde(default)]
    pub secure: bool,
    /// SameSite attribute
    #[serde(default)]
    pub same_site: SameSite,
}

/// SameSite cookie attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SameSite {
    /// Cookie only sent with same-site requests
    Strict,
    /// Cookie sent with same-site and top-level navigations
    #[default]
    Lax,
    /// Cookie sent with all requests
    None,
}

impl Cookie {
    /// Create a new session cookie with path `/` and no domain
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            path: "/".to_string(),
            expires: None,
            http_only: false,
            secure: false,
            same_site: SameSite::default(),
        }
    }

    /// Set the domain
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into().to_ascii_lowercase();
        self
    }

    /// Set the path
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set secure flag
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set http_only flag
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Set same_site attribute
    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    /// Set expiration time, kept at millisecond resolution
    pub fn expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires.trunc_subsecs(3));
        self
    }

    /// Uniqueness key within a jar
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.name, &self.domain, &self.path)
    }

    /// Check if the cookie is expired
    pub fn is_expired(&self) -> bool {
        self.expires.map_or(false, |exp| exp <= Utc::now())
    }

    /// Check if the cookie is eligible for a request to the given URL
    pub fn matches(&self, url: &Url) -> bool {
        let host = match url.host_str() {
            Some(host) => host.to_ascii_lowercase(),
            None => return false,
        };

        if !self.domain_matches(&host) {
            return false;
        }

        if !self.path_matches(url.path()) {
            return false;
        }

        if self.secure && !matches!(url.scheme(), "https" | "wss") {
            return false;
        }

        !self.is_expired()
    }

    /// Check if domain matches
    pub fn domain_matches(&self, host: &str) -> bool {
        match self.domain.strip_prefix('.') {
            Some(domain) => host == domain || host.ends_with(&format!(".{}", domain)),
            None => !self.domain.is_empty() && host == self.domain,
        }
    }

    /// RFC 6265 path-match
    pub fn path_matches(&self, request_path: &str) -> bool {
        if request_path == self.path {
            return true;
        }
        if let Some(rest) = request_path.strip_prefix(self.path.as_str()) {
            return self.path.ends_with('/') || rest.starts_with('/');
        }
        false
    }

    /// Parse a Set-Cookie header value received from `url`
    ///
    /// Returns `None` for malformed headers and for a `Domain` attribute the
    /// request host does not belong to.
    pub fn parse(header: &str, url: &Url) -> Option<Self> {
        let host = url.host_str()?.to_ascii_lowercase();
        let is_ip = matches!(url.host(), Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)));

        let mut parts = header.split(';');
        let first = parts.next()?.trim();

        let (name, value) = first.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let mut cookie = Cookie::new(name, value.trim());
        cookie.domain = host.clone();
        cookie.path = default_path(url);

        let mut max_age: Option<DateTime<Utc>> = None;
        let mut expires: Option<DateTime<Utc>> = None;

        for part in parts {
            let part = part.trim();
            let (attr, val) = match part.split_once('=') {
                Some((attr, val)) => (attr.trim().to_ascii_lowercase(), val.trim()),
                None => (part.to_ascii_lowercase(), ""),
            };
            match attr.as_str() {
                "domain" => {
                    let domain = val.trim_start_matches('.').to_ascii_lowercase();
                    if domain.is_empty() {
                        continue;
                    }
                    if host == domain {
                        cookie.domain = if is_ip { host.clone() } else { format!(".{}", domain) };
                    } else if !is_ip && host.ends_with(&format!(".{}", domain)) {
                        cookie.domain = format!(".{}", domain);
                    } else {
                        tracing::debug!(host = %host, domain = %domain, "Rejecting cookie for foreign domain");
                        return None;
                    }
                }
                "path" => {
                    if val.starts_with('/') {
                        cookie.path = val.to_string();
                    }
                }
                "expires" => expires = parse_cookie_date(val),
                "max-age" => {
                    if let Ok(secs) = val.parse::<i64>() {
                        max_age = Some(if secs <= 0 {
                            DateTime::<Utc>::MIN_UTC
                        } else {
                            Utc::now() + chrono::Duration::seconds(secs.min(MAX_AGE_CAP_SECS))
                        });
                    }
                }
                "samesite" => {
                    cookie.same_site = match val.to_ascii_lowercase().as_str() {
                        "strict" => SameSite::Strict,
                        "none" => SameSite::None,
                        _ => SameSite::Lax,
                    };
                }
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                _ => {}
            }
        }

        cookie.expires = max_age.or(expires).map(|exp| exp.trunc_subsecs(3));
        Some(cookie)
    }

    /// Convert to cookie header format
    pub fn to_header_value(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

/// RFC 6265 default-path of a request URL
fn default_path(url: &Url) -> String {
    let path = url.path();
    if !path.starts_with('/') {
        return "/".to_string();
    }
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

/// Parse an `Expires` attribute (RFC 1123 or the dashed Netscape form)
fn parse_cookie_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%a, %d-%b-%Y %H:%M:%S GMT", "%A, %d-%b-%y %H:%M:%S GMT"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Wire form of cookie expiry: Unix seconds, `-1` for session cookies
mod expiry {
    use chrono::{DateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => serializer.serialize_f64(dt.timestamp_millis() as f64 / 1000.0),
            None => serializer.serialize_f64(-1.0),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if secs == -1.0 {
            return Ok(None);
        }
        if !secs.is_finite() {
            return Err(D::Error::custom(format!("invalid cookie expiry: {}", secs)));
        }
        DateTime::<Utc>::from_timestamp_millis((secs * 1000.0).round() as i64)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("cookie expiry out of range: {}", secs)))
    }
}

/// Storage backend a cookie synchronizer reads from and writes to
///
/// Implemented by the in-memory [`CookieJar`]; a browser session can hand out
/// its own store so the request context and its pages share one jar.
pub trait CookieStore: Send + Sync {
    /// Unexpired cookies eligible for a request to `url`
    fn cookies_for(&self, url: &Url) -> Vec<Cookie>;

    /// Every unexpired cookie in the store
    fn all(&self) -> Vec<Cookie>;

    /// Insert or replace by (name, domain, path). An expired cookie deletes
    /// the matching entry instead.
    fn store(&self, cookie: Cookie);

    /// Remove every cookie
    fn clear(&self);
}

/// Thread-safe cookie storage
#[derive(Debug, Clone)]
pub struct CookieJar {
    /// Cookies stored by domain
    cookies: Arc<DashMap<String, Vec<Cookie>>>,
}

impl Default for CookieJar {
    fn default() -> Self {
        Self::new()
    }
}

impl CookieJar {
    /// Create a new empty cookie jar
    pub fn new() -> Self {
        Self {
            cookies: Arc::new(DashMap::new()),
        }
    }

    /// Add a cookie from a Set-Cookie header
    pub fn add_from_header(&self, header: &str, url: &Url) {
        if let Some(cookie) = Cookie::parse(header, url) {
            self.store(cookie);
        }
    }

    /// Get Cookie header value for a URL
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        let cookies = self.cookies_for(url);
        if cookies.is_empty() {
            return None;
        }

        Some(
            cookies
                .iter()
                .map(|c| c.to_header_value())
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Drop expired cookies and empty buckets
    pub fn remove_expired(&self) {
        self.cookies.retain(|_, cookies| {
            cookies.retain(|c| !c.is_expired());
            !cookies.is_empty()
        });
    }

    /// Get total cookie count, expired entries included
    pub fn len(&self) -> usize {
        self.cookies.iter().map(|e| e.value().len()).sum()
    }

    /// Check if jar is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CookieStore for CookieJar {
    fn cookies_for(&self, url: &Url) -> Vec<Cookie> {
        let mut result: Vec<Cookie> = self
            .cookies
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|c| c.matches(url))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();

        // Longer paths first, as browsers send them
        result.sort_by(|a, b| {
            b.path
                .len()
                .cmp(&a.path.len())
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.domain.cmp(&b.domain))
        });
        result
    }

    fn all(&self) -> Vec<Cookie> {
        self.remove_expired();
        let mut result: Vec<Cookie> = self
            .cookies
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect();
        result.sort_by(|a, b| a.key().cmp(&b.key()));
        result
    }

    fn store(&self, cookie: Cookie) {
        let domain = cookie.domain.clone();
        {
            let mut bucket = self.cookies.entry(domain.clone()).or_default();
            bucket.retain(|c| c.name != cookie.name || c.path != cookie.path);
            if cookie.is_expired() {
                tracing::debug!(name = %cookie.name, domain = %cookie.domain, "Cookie deleted by expiry");
            } else {
                bucket.push(cookie);
            }
        }
        self.cookies.remove_if(&domain, |_, bucket| bucket.is_empty());
    }

    fn clear(&self) {
        self.cookies.clear();
    }
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Request context configuration

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::HeaderMap;

use crate::http::{insert_header, DEFAULT_USER_AGENT};
use crate::storage::StorageState;

/// Default maximum number of redirects followed per request
pub const DEFAULT_MAX_REDIRECTS: usize = 20;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// When HTTP credentials are sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialsSend {
    /// Only after a 401 response with a `WWW-Authenticate` challenge
    #[default]
    Unauthorized,
    /// With every request
    Always,
}

/// HTTP Basic credentials
#[derive(Debug, Clone)]
pub struct HttpCredentials {
    pub username: String,
    pub password: String,
    /// Restrict to one origin (`https://example.com:8443`)
    pub origin: Option<String>,
    pub send: CredentialsSend,
}

impl HttpCredentials {
    /// Create credentials sent after an authentication challenge
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            origin: None,
            send: CredentialsSend::default(),
        }
    }

    /// Restrict to an origin
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into().trim_end_matches('/').to_ascii_lowercase());
        self
    }

    /// Set the send mode
    pub fn send(mut self, send: CredentialsSend) -> Self {
        self.send = send;
        self
    }

    /// Check if these credentials apply to an origin
    pub fn applies_to(&self, origin: &str) -> bool {
        self.origin.as_deref().map_or(true, |o| o == origin)
    }
}

/// Initial storage state of a context
#[derive(Debug, Clone)]
pub enum StorageStateSource {
    /// In-memory snapshot
    State(StorageState),
    /// File written by `storage_state` / `StorageState::persist`
    Path(PathBuf),
}

/// Request context configuration
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Base URL that relative request URLs resolve against
    pub base_url: Option<String>,
    /// Headers sent with every request
    pub extra_headers: HeaderMap,
    /// User agent string
    pub user_agent: String,
    /// Default timeout for requests; zero disables it
    pub timeout: Duration,
    /// Turn non-2xx/3xx statuses into errors
    pub fail_on_status_code: bool,
    /// Maximum redirects to follow; zero disables following
    pub max_redirects: usize,
    /// Accept invalid TLS certificates
    pub ignore_https_errors: bool,
    /// Proxy URL
    pub proxy: Option<String>,
    /// HTTP Basic credentials
    pub http_credentials: Option<HttpCredentials>,
    /// Cookies and local storage to start from
    pub storage_state: Option<StorageStateSource>,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            extra_headers: HeaderMap::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            fail_on_status_code: false,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            ignore_https_errors: false,
            proxy: None,
            http_credentials: None,
            storage_state: None,
        }
    }
}

impl ContextOptions {
    /// Create a new context config
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base URL
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Add a header sent with every request
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        insert_header(&mut self.extra_headers, name.as_ref(), value.as_ref());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fail on non-2xx/3xx statuses
    pub fn fail_on_status_code(mut self, fail: bool) -> Self {
        self.fail_on_status_code = fail;
        self
    }

    /// Set max redirects
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    /// Ignore HTTPS errors
    pub fn ignore_https_errors(mut self, ignore: bool) -> Self {
        self.ignore_https_errors = ignore;
        self
    }

    /// Set proxy
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Set HTTP credentials
    pub fn http_credentials(mut self, credentials: HttpCredentials) -> Self {
        self.http_credentials = Some(credentials);
        self
    }

    /// Start from an in-memory storage state
    pub fn storage_state(mut self, state: StorageState) -> Self {
        self.storage_state = Some(StorageStateSource::State(state));
        self
    }

    /// Start from a storage state file
    pub fn storage_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_state = Some(StorageStateSource::Path(path.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_options() {
        let options = ContextOptions::new()
            .base_url("https://api.example.com")
            .header("X-Api-Key", "secret")
            .timeout(Duration::from_secs(60));

        assert_eq!(options.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(options.extra_headers.get("x-api-key").unwrap(), "secret");
        assert_eq!(options.timeout, Duration::from_secs(60));
        assert_eq!(options.max_redirects, DEFAULT_MAX_REDIRECTS);
        assert!(!options.fail_on_status_code);
    }

    #[test]
    fn test_credentials_origin() {
        let credentials = HttpCredentials::new("user", "pass").origin("https://Example.com/");

        assert!(credentials.applies_to("https://example.com"));
        assert!(!credentials.applies_to("https://other.com"));
        assert!(HttpCredentials::new("user", "pass").applies_to("https://any.com"));
    }
}

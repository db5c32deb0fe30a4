// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! API request context: the request dispatcher
//!
//! Builds the effective request from context defaults, a target and per-call
//! overrides, attaches cookies for every hop, follows redirects itself, and
//! registers the final body in the response cache.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, USER_AGENT};
use reqwest::Method;
use url::Url;

use crate::config::{ContextOptions, CredentialsSend, StorageStateSource};
use crate::error::{Error, Result};
use crate::http::{
    headers, resolve_url, CookieSync, HttpClient, HttpClientConfig, PreparedRequest, RawResponse,
    RedirectPolicy, RequestBody, RequestOptions, RequestTarget, RequestTemplate, ResponseCache,
    ResponseHandle, Transport,
};
use crate::session::BrowserSession;
use crate::storage::{write_file, OriginState, StorageItem, StorageState};

/// Options of [`ApiRequestContext::storage_state`]
#[derive(Debug, Clone, Default)]
pub struct StorageStateOptions {
    /// Also write the snapshot to this file; relative paths resolve against
    /// the working directory
    pub path: Option<PathBuf>,
}

impl StorageStateOptions {
    /// Create empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist to a path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Redirect handling resolved for one dispatch
#[derive(Debug, Clone, Copy)]
struct RedirectLimit {
    follow: bool,
    max: usize,
}

/// Issues HTTP requests sharing cookies and storage with a browser session
///
/// Share it between tasks through an `Arc`; every operation takes `&self`.
/// A response with a 4xx/5xx status is returned as a normal
/// [`ResponseHandle`] unless `fail_on_status_code` is set.
pub struct ApiRequestContext {
    options: ContextOptions,
    base_url: Option<Url>,
    transport: Arc<dyn Transport>,
    cookies: CookieSync,
    cache: Arc<ResponseCache>,
    session: Option<Arc<dyn BrowserSession>>,
    disposed: AtomicBool,
}

impl ApiRequestContext {
    /// Create a standalone context with a private cookie jar
    pub async fn new(options: ContextOptions) -> Result<Self> {
        let transport = Self::default_transport(&options)?;
        Self::with_transport(options, transport, None).await
    }

    /// Create a context sharing cookies and storage with a browser session
    pub async fn for_session(
        session: Arc<dyn BrowserSession>,
        options: ContextOptions,
    ) -> Result<Self> {
        let transport = Self::default_transport(&options)?;
        Self::with_transport(options, transport, Some(session)).await
    }

    /// Create a context over a custom transport
    pub async fn with_transport(
        options: ContextOptions,
        transport: Arc<dyn Transport>,
        session: Option<Arc<dyn BrowserSession>>,
    ) -> Result<Self> {
        let base_url = options
            .base_url
            .as_deref()
            .map(|base| {
                Url::parse(base)
                    .map_err(|e| Error::invalid(format!("invalid base URL '{}': {}", base, e)))
            })
            .transpose()?;

        let cookies = match &session {
            Some(session) => CookieSync::with_store(session.cookie_store()),
            None => CookieSync::standalone(),
        };

        let initial_state = match &options.storage_state {
            Some(StorageStateSource::State(state)) => Some(state.clone()),
            Some(StorageStateSource::Path(path)) => Some(StorageState::load(path).await?),
            None => None,
        };

        let context = Self {
            options,
            base_url,
            transport,
            cookies,
            cache: Arc::new(ResponseCache::new()),
            session,
            disposed: AtomicBool::new(false),
        };

        if let Some(state) = initial_state {
            context.restore(&state);
        }

        Ok(context)
    }

    fn default_transport(options: &ContextOptions) -> Result<Arc<dyn Transport>> {
        let client = HttpClient::with_config(HttpClientConfig {
            user_agent: options.user_agent.clone(),
            proxy: options.proxy.clone(),
            accept_invalid_certs: options.ignore_https_errors,
        })?;
        Ok(Arc::new(client))
    }

    /// Get context configuration
    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    /// Get the cookie synchronizer
    pub fn cookies(&self) -> &CookieSync {
        &self.cookies
    }

    /// Get the response cache
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Check if the context has been disposed
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Execute a GET request
    pub async fn get(&self, url: impl Into<String>) -> Result<ResponseHandle> {
        self.get_with(url, RequestOptions::default()).await
    }

    /// Execute a GET request with options
    pub async fn get_with(
        &self,
        url: impl Into<String>,
        options: RequestOptions,
    ) -> Result<ResponseHandle> {
        self.execute_method(Method::GET, url.into(), options).await
    }

    /// Execute a POST request
    pub async fn post(&self, url: impl Into<String>) -> Result<ResponseHandle> {
        self.post_with(url, RequestOptions::default()).await
    }

    /// Execute a POST request with options
    pub async fn post_with(
        &self,
        url: impl Into<String>,
        options: RequestOptions,
    ) -> Result<ResponseHandle> {
        self.execute_method(Method::POST, url.into(), options).await
    }

    /// Execute a PUT request
    pub async fn put(&self, url: impl Into<String>) -> Result<ResponseHandle> {
        self.put_with(url, RequestOptions::default()).await
    }

    /// Execute a PUT request with options
    pub async fn put_with(
        &self,
        url: impl Into<String>,
        options: RequestOptions,
    ) -> Result<ResponseHandle> {
        self.execute_method(Method::PUT, url.into(), options).await
    }

    /// Execute a PATCH request
    pub async fn patch(&self, url: impl Into<String>) -> Result<ResponseHandle> {
        self.patch_with(url, RequestOptions::default()).await
    }

    /// Execute a PATCH request with options
    pub async fn patch_with(
        &self,
        url: impl Into<String>,
        options: RequestOptions,
    ) -> Result<ResponseHandle> {
        self.execute_method(Method::PATCH, url.into(), options).await
    }

    /// Execute a DELETE request
    pub async fn delete(&self, url: impl Into<String>) -> Result<ResponseHandle> {
        self.delete_with(url, RequestOptions::default()).await
    }

    /// Execute a DELETE request with options
    pub async fn delete_with(
        &self,
        url: impl Into<String>,
        options: RequestOptions,
    ) -> Result<ResponseHandle> {
        self.execute_method(Method::DELETE, url.into(), options).await
    }

    /// Execute a HEAD request
    pub async fn head(&self, url: impl Into<String>) -> Result<ResponseHandle> {
        self.head_with(url, RequestOptions::default()).await
    }

    /// Execute a HEAD request with options
    pub async fn head_with(
        &self,
        url: impl Into<String>,
        options: RequestOptions,
    ) -> Result<ResponseHandle> {
        self.execute_method(Method::HEAD, url.into(), options).await
    }

    async fn execute_method(
        &self,
        method: Method,
        url: String,
        mut options: RequestOptions,
    ) -> Result<ResponseHandle> {
        options.method = Some(method);
        self.execute(url, Some(options)).await
    }

    /// Alias of [`ApiRequestContext::execute`]
    pub async fn fetch(
        &self,
        target: impl Into<RequestTarget>,
        options: Option<RequestOptions>,
    ) -> Result<ResponseHandle> {
        self.execute(target, options).await
    }

    /// Execute a request against a URL or template
    ///
    /// Errors are transport failures, invalid input, redirect loops and
    /// disposal. A 4xx/5xx status is a successful result.
    pub async fn execute(
        &self,
        target: impl Into<RequestTarget>,
        options: Option<RequestOptions>,
    ) -> Result<ResponseHandle> {
        self.ensure_open()?;

        let (request, limit, fail_on_status_code) =
            self.prepare(target.into(), options.unwrap_or_default())?;
        let method = request.method.clone();
        let original_url = request.url.clone();

        let response = self.dispatch(request, limit).await?;

        if fail_on_status_code && !(200..400).contains(&response.status) {
            return Err(Error::HttpStatus {
                method: method.to_string(),
                url: response.url.to_string(),
                status: response.status,
                status_text: response.status_text,
            });
        }

        let id = self.cache.register(response.body)?;
        tracing::debug!(
            method = %method,
            url = %original_url,
            final_url = %response.url,
            status = response.status,
            id = %id,
            "Request complete"
        );

        Ok(ResponseHandle::new(
            id,
            response.status,
            response.status_text,
            response.headers,
            response.url,
            self.cache.clone(),
        ))
    }

    /// Merge defaults, target and overrides into the first hop's request
    fn prepare(
        &self,
        target: RequestTarget,
        overrides: RequestOptions,
    ) -> Result<(PreparedRequest, RedirectLimit, bool)> {
        let (method, url, template_options) = match target {
            RequestTarget::Url(url) => (None, url, RequestOptions::default()),
            RequestTarget::Template(RequestTemplate {
                method,
                url,
                options,
            }) => (Some(method), url, options),
        };

        let merged = self
            .default_options()
            .merged(&template_options)
            .merged(&overrides);

        let method = merged.method.clone().or(method).unwrap_or(Method::GET);

        let mut url = resolve_url(&url, self.base_url.as_ref())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::invalid(format!(
                "unsupported URL scheme '{}' in {}",
                url.scheme(),
                url
            )));
        }
        if !merged.params.is_empty() {
            url.query_pairs_mut().extend_pairs(merged.params.iter());
        }

        let mut headers = merged.headers;
        if !headers.contains_key(USER_AGENT) {
            if let Ok(value) = HeaderValue::from_str(&self.options.user_agent) {
                headers.insert(USER_AGENT, value);
            }
        }

        let mut request = PreparedRequest {
            method,
            url,
            headers,
            body: merged.body.unwrap_or_default(),
            timeout: merged.timeout.unwrap_or(self.options.timeout),
            ignore_https_errors: merged.ignore_https_errors.unwrap_or(false),
            proxy: merged.proxy,
        };

        if self.sends_credentials_always() {
            self.attach_credentials(&mut request);
        }

        let max = merged.max_redirects.unwrap_or(self.options.max_redirects);
        let limit = RedirectLimit {
            follow: merged.redirect.unwrap_or_default() == RedirectPolicy::Follow && max > 0,
            max,
        };

        Ok((request, limit, merged.fail_on_status_code.unwrap_or(false)))
    }

    fn default_options(&self) -> RequestOptions {
        RequestOptions {
            headers: self.options.extra_headers.clone(),
            timeout: Some(self.options.timeout),
            fail_on_status_code: Some(self.options.fail_on_status_code),
            max_redirects: Some(self.options.max_redirects),
            ignore_https_errors: Some(self.options.ignore_https_errors),
            proxy: self.options.proxy.clone(),
            ..Default::default()
        }
    }

    /// Send hop after hop until a final response
    async fn dispatch(
        &self,
        mut request: PreparedRequest,
        limit: RedirectLimit,
    ) -> Result<RawResponse> {
        let mut explicit_cookie = request
            .headers
            .get(COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let original_method = request.method.to_string();
        let original_url = request.url.to_string();
        let mut redirects = 0usize;
        let mut challenged = false;

        loop {
            self.attach_cookies(&mut request, explicit_cookie.as_deref());

            tracing::debug!(method = %request.method, url = %request.url, hop = redirects, "Sending request");
            let response = self.transport.send(&request).await?;
            self.cookies
                .merge_set_cookies(&response.url, response.header_all(headers::SET_COOKIE));

            if response.status == 401 && !challenged && self.should_answer_challenge(&request, &response) {
                challenged = true;
                self.attach_credentials(&mut request);
                tracing::debug!(url = %request.url, "Retrying with HTTP credentials");
                continue;
            }

            if !limit.follow || !is_redirect(response.status) {
                return Ok(response);
            }

            let location = match response
                .header(headers::LOCATION)
                .and_then(|location| response.url.join(location).ok())
            {
                Some(location) => location,
                None => return Ok(response),
            };

            if redirects >= limit.max {
                tracing::warn!(url = %original_url, max = limit.max, "Redirect limit exceeded");
                return Err(Error::TooManyRedirects {
                    method: original_method,
                    url: original_url,
                    max: limit.max,
                });
            }
            redirects += 1;

            let switch_to_get = match response.status {
                303 => request.method != Method::HEAD,
                301 | 302 => request.method == Method::POST,
                _ => false,
            };
            if switch_to_get {
                request.method = Method::GET;
                request.body = RequestBody::Empty;
                request.headers.remove(CONTENT_TYPE);
                request.headers.remove(CONTENT_LENGTH);
            }
            // A caller's Cookie and Authorization headers stay with the first origin
            if location.origin() != request.url.origin() {
                request.headers.remove(AUTHORIZATION);
                explicit_cookie = None;
            }

            tracing::debug!(status = response.status, from = %request.url, to = %location, "Following redirect");
            request.url = location;

            if self.sends_credentials_always() {
                self.attach_credentials(&mut request);
            }
        }
    }

    /// Recompute the `Cookie` header for the current hop
    fn attach_cookies(&self, request: &mut PreparedRequest, explicit: Option<&str>) {
        match self.cookies.cookie_header(&request.url, explicit) {
            Some(header) => match HeaderValue::from_str(&header) {
                Ok(value) => {
                    request.headers.insert(COOKIE, value);
                }
                Err(_) => {
                    tracing::warn!(url = %request.url, "Cookie header is not a valid header value");
                    request.headers.remove(COOKIE);
                }
            },
            None => {
                request.headers.remove(COOKIE);
            }
        }
    }

    fn sends_credentials_always(&self) -> bool {
        self.options
            .http_credentials
            .as_ref()
            .map_or(false, |credentials| credentials.send == CredentialsSend::Always)
    }

    fn should_answer_challenge(&self, request: &PreparedRequest, response: &RawResponse) -> bool {
        match &self.options.http_credentials {
            Some(credentials) => {
                credentials.send == CredentialsSend::Unauthorized
                    && credentials.applies_to(&request.origin())
                    && response.header(headers::WWW_AUTHENTICATE).is_some()
                    && !request.headers.contains_key(AUTHORIZATION)
            }
            None => false,
        }
    }

    fn attach_credentials(&self, request: &mut PreparedRequest) {
        let credentials = match &self.options.http_credentials {
            Some(credentials) if credentials.applies_to(&request.origin()) => credentials,
            _ => return,
        };
        if request.headers.contains_key(AUTHORIZATION) {
            return;
        }
        let encoded = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            format!("{}:{}", credentials.username, credentials.password),
        );
        if let Ok(value) = HeaderValue::from_str(&format!("Basic {}", encoded)) {
            request.headers.insert(AUTHORIZATION, value);
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_disposed() {
            Err(Error::disposed("Request context"))
        } else {
            Ok(())
        }
    }

    /// Current cookies plus the session's local storage
    pub fn snapshot(&self) -> StorageState {
        let origins = match &self.session {
            Some(session) => session
                .origins()
                .into_iter()
                .filter_map(|origin| {
                    let items = session.local_storage(&origin);
                    if items.is_empty() {
                        return None;
                    }
                    Some(OriginState {
                        origin,
                        local_storage: items
                            .into_iter()
                            .map(|(name, value)| StorageItem { name, value })
                            .collect(),
                    })
                })
                .collect(),
            None => Vec::new(),
        };

        StorageState {
            cookies: self.cookies.all(),
            origins,
        }
    }

    /// Import a snapshot: cookies go into the jar, local storage into the
    /// associated session. A standalone context has no local storage and
    /// skips the origins.
    pub fn restore(&self, state: &StorageState) {
        self.cookies.merge(state.cookies.clone());

        match &self.session {
            Some(session) => {
                for origin in &state.origins {
                    session.set_local_storage(
                        &origin.origin,
                        origin
                            .local_storage
                            .iter()
                            .map(|item| (item.name.clone(), item.value.clone()))
                            .collect(),
                    );
                }
            }
            None if !state.origins.is_empty() => {
                tracing::debug!(
                    origins = state.origins.len(),
                    "Standalone context ignores local storage"
                );
            }
            None => {}
        }

        tracing::debug!(cookies = state.cookies.len(), "Restored storage state");
    }

    /// Serialize the current storage state, optionally persisting it
    pub async fn storage_state(&self, options: StorageStateOptions) -> Result<String> {
        let json = self.snapshot().to_json()?;
        if let Some(path) = options.path {
            write_file(&path, &json).await?;
        }
        Ok(json)
    }

    /// Dispose the context: every cached body becomes unreadable and further
    /// requests fail. Calling it again is a no-op.
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            tracing::info!(bodies = self.cache.len(), "Disposing request context");
        }
        self.cache.dispose_all();
    }
}

fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpCredentials;
    use crate::http::Cookie;
    use crate::session::MemorySession;
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;

    type Handler = Box<dyn Fn(&PreparedRequest) -> RawResponse + Send + Sync>;

    /// Transport answering from a closure and recording every hop
    struct ScriptedTransport {
        handler: Handler,
        sent: Mutex<Vec<PreparedRequest>>,
    }

    impl ScriptedTransport {
        fn new(handler: impl Fn(&PreparedRequest) -> RawResponse + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                handler: Box::new(handler),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<PreparedRequest> {
            self.sent.lock().clone()
        }

        fn cookie_headers(&self) -> Vec<Option<String>> {
            self.sent()
                .iter()
                .map(|r| r.headers.get(COOKIE).map(|v| v.to_str().unwrap().to_string()))
                .collect()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: &PreparedRequest) -> Result<RawResponse> {
            self.sent.lock().push(request.clone());
            Ok((self.handler)(request))
        }
    }

    fn response(request: &PreparedRequest, status: u16, headers: &[(&str, &str)], body: &str) -> RawResponse {
        RawResponse {
            status,
            status_text: reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("")
                .to_string(),
            headers: headers
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            body: Bytes::from(body.to_string()),
            url: request.url.clone(),
        }
    }

    async fn context(transport: Arc<ScriptedTransport>, options: ContextOptions) -> ApiRequestContext {
        ApiRequestContext::with_transport(options, transport, None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_login_cookie_scoping() {
        let transport = ScriptedTransport::new(|req| match req.url.path() {
            "/login" => response(req, 200, &[("Set-Cookie", "session=abc; Domain=example.com; Path=/")], ""),
            _ => response(req, 200, &[], "ok"),
        });
        let ctx = context(transport.clone(), ContextOptions::default()).await;

        ctx.get("https://example.com/login").await.unwrap();
        ctx.get("https://example.com/profile").await.unwrap();
        ctx.get("https://other.com/").await.unwrap();

        assert_eq!(
            transport.cookie_headers(),
            vec![None, Some("session=abc".to_string()), None]
        );
    }

    #[tokio::test]
    async fn test_not_found_is_not_an_error() {
        let transport = ScriptedTransport::new(|req| {
            response(req, 404, &[("Content-Type", "application/json")], r#"{"error":"missing"}"#)
        });
        let ctx = context(transport, ContextOptions::default()).await;

        let handle = ctx.get("https://example.com/missing").await.unwrap();
        assert_eq!(handle.status(), 404);
        assert_eq!(handle.status_text(), "Not Found");
        assert!(!handle.ok());
        assert_eq!(handle.body().unwrap(), Bytes::from_static(br#"{"error":"missing"}"#));
    }

    #[tokio::test]
    async fn test_fail_on_status_code() {
        let transport = ScriptedTransport::new(|req| response(req, 500, &[], "boom"));
        let ctx = context(transport, ContextOptions::default()).await;

        let err = ctx
            .get_with("https://example.com/", RequestOptions::new().fail_on_status_code(true))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(500));
        assert!(ctx.cache().is_empty());
    }

    #[tokio::test]
    async fn test_redirect_cookies_follow_each_hop() {
        let transport = ScriptedTransport::new(|req| match (req.url.host_str(), req.url.path()) {
            (Some("a.com"), "/start") => response(req, 302, &[("Location", "https://b.com/mid")], ""),
            (Some("b.com"), "/mid") => response(
                req,
                301,
                &[("Location", "https://a.com/end"), ("Set-Cookie", "hop=b")],
                "",
            ),
            _ => response(req, 200, &[], "done"),
        });
        let ctx = context(transport.clone(), ContextOptions::default()).await;
        ctx.cookies().merge(vec![
            Cookie::new("site", "a").domain("a.com"),
            Cookie::new("site", "b").domain("b.com"),
        ]);

        let handle = ctx.get("https://a.com/start").await.unwrap();

        assert_eq!(handle.url().as_str(), "https://a.com/end");
        assert_eq!(handle.text().unwrap(), "done");
        assert_eq!(
            transport.cookie_headers(),
            vec![
                Some("site=a".to_string()),
                Some("site=b".to_string()),
                Some("site=a".to_string()),
            ]
        );
        assert_eq!(ctx.cookies().all().len(), 3);
    }

    #[tokio::test]
    async fn test_too_many_redirects() {
        let transport = ScriptedTransport::new(|req| response(req, 302, &[("Location", "/loop")], ""));
        let ctx = context(transport.clone(), ContextOptions::default().max_redirects(3)).await;

        let err = ctx.get("https://example.com/loop").await.unwrap_err();

        assert!(matches!(err, Error::TooManyRedirects { max: 3, .. }));
        assert_eq!(err.url(), Some("https://example.com/loop"));
        assert_eq!(transport.sent().len(), 4);
        assert!(ctx.cache().is_empty());
    }

    #[tokio::test]
    async fn test_redirect_chain_at_limit() {
        let transport = ScriptedTransport::new(|req| {
            let hop: usize = req.url.path().trim_start_matches("/hop").parse().unwrap_or(0);
            if hop < 3 {
                let next = format!("/hop{}", hop + 1);
                response(req, 302, &[("Location", next.as_str())], "")
            } else {
                response(req, 200, &[], "end")
            }
        });
        let ctx = context(transport.clone(), ContextOptions::default().max_redirects(3)).await;

        let handle = ctx.get("https://example.com/hop0").await.unwrap();

        assert_eq!(handle.status(), 200);
        assert_eq!(handle.url().as_str(), "https://example.com/hop3");
        assert_eq!(handle.text().unwrap(), "end");
        assert_eq!(transport.sent().len(), 4);
    }

    fn cross_origin_chain(req: &PreparedRequest) -> RawResponse {
        match (req.url.host_str(), req.url.path()) {
            (Some("a.com"), "/start") => response(req, 302, &[("Location", "https://b.com/x")], ""),
            (Some("b.com"), "/x") => response(req, 302, &[("Location", "https://a.com/end")], ""),
            _ => response(req, 200, &[], ""),
        }
    }

    #[tokio::test]
    async fn test_caller_cookie_not_sent_cross_origin() {
        let transport = ScriptedTransport::new(cross_origin_chain);
        let ctx = context(transport.clone(), ContextOptions::default()).await;
        ctx.cookies()
            .merge(vec![Cookie::new("site", "b").domain("b.com")]);

        ctx.get_with("https://a.com/start", RequestOptions::new().header("Cookie", "secret=1"))
            .await
            .unwrap();

        assert_eq!(
            transport.cookie_headers(),
            vec![Some("secret=1".to_string()), Some("site=b".to_string()), None]
        );
    }

    #[tokio::test]
    async fn test_credentials_always_restored_after_foreign_hop() {
        let transport = ScriptedTransport::new(cross_origin_chain);
        let ctx = context(
            transport.clone(),
            ContextOptions::default().http_credentials(
                HttpCredentials::new("user", "pass")
                    .origin("https://a.com")
                    .send(CredentialsSend::Always),
            ),
        )
        .await;

        ctx.get("https://a.com/start").await.unwrap();

        let auth: Vec<bool> = transport
            .sent()
            .iter()
            .map(|r| r.headers.contains_key(AUTHORIZATION))
            .collect();
        assert_eq!(auth, vec![true, false, true]);
    }

    #[tokio::test]
    async fn test_redirects_disabled() {
        let transport = ScriptedTransport::new(|req| response(req, 302, &[("Location", "/next")], ""));
        let ctx = context(transport.clone(), ContextOptions::default()).await;

        let handle = ctx
            .get_with("https://example.com/", RequestOptions::new().max_redirects(0))
            .await
            .unwrap();
        assert_eq!(handle.status(), 302);

        let handle = ctx
            .get_with(
                "https://example.com/",
                RequestOptions::new().redirect(RedirectPolicy::Manual),
            )
            .await
            .unwrap();
        assert_eq!(handle.header("location"), Some("/next"));
        assert_eq!(transport.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_redirect_method_rewrite() {
        let transport = ScriptedTransport::new(|req| match req.url.path() {
            "/see-other" => response(req, 303, &[("Location", "/result")], ""),
            "/temporary" => response(req, 307, &[("Location", "/result")], ""),
            _ => response(req, 200, &[], ""),
        });
        let ctx = context(transport.clone(), ContextOptions::default()).await;

        ctx.post_with("https://example.com/see-other", RequestOptions::new().data("payload"))
            .await
            .unwrap();
        ctx.post_with("https://example.com/temporary", RequestOptions::new().data("payload"))
            .await
            .unwrap();

        let sent = transport.sent();
        assert_eq!(sent[1].method, Method::GET);
        assert!(sent[1].body.is_empty());
        assert_eq!(sent[3].method, Method::POST);
        assert_eq!(sent[3].body, RequestBody::Bytes(Bytes::from("payload")));
    }

    #[tokio::test]
    async fn test_layered_merge() {
        let transport = ScriptedTransport::new(|req| response(req, 200, &[], ""));
        let ctx = context(
            transport.clone(),
            ContextOptions::default()
                .base_url("https://api.example.com/v1/")
                .header("x-layer", "context")
                .header("x-context", "1"),
        )
        .await;

        let template = RequestTemplate::new(Method::PUT, "items/7")
            .header("x-layer", "template")
            .header("x-template", "1");
        ctx.execute(
            template,
            Some(RequestOptions::new().header("X-Layer", "call").param("q", "a b")),
        )
        .await
        .unwrap();

        let sent = &transport.sent()[0];
        assert_eq!(sent.method, Method::PUT);
        assert_eq!(sent.url.as_str(), "https://api.example.com/v1/items/7?q=a+b");
        assert_eq!(sent.headers.get("x-layer").unwrap(), "call");
        assert_eq!(sent.headers.get("x-context").unwrap(), "1");
        assert_eq!(sent.headers.get("x-template").unwrap(), "1");
        assert!(sent.headers.contains_key(USER_AGENT));
    }

    #[tokio::test]
    async fn test_invalid_targets() {
        let transport = ScriptedTransport::new(|req| response(req, 200, &[], ""));
        let ctx = context(transport.clone(), ContextOptions::default()).await;

        assert!(matches!(ctx.get("/relative").await, Err(Error::InvalidArgument(_))));
        assert!(matches!(ctx.get("http://[::1").await, Err(Error::InvalidArgument(_))));
        assert!(matches!(ctx.get("ftp://example.com/").await, Err(Error::InvalidArgument(_))));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_explicit_cookie_header_wins() {
        let transport = ScriptedTransport::new(|req| response(req, 200, &[], ""));
        let ctx = context(transport.clone(), ContextOptions::default()).await;
        ctx.cookies().merge(vec![
            Cookie::new("a", "jar").domain("example.com"),
            Cookie::new("b", "jar").domain("example.com"),
        ]);

        ctx.get_with("https://example.com/", RequestOptions::new().header("Cookie", "a=mine"))
            .await
            .unwrap();

        assert_eq!(transport.cookie_headers(), vec![Some("a=mine; b=jar".to_string())]);
    }

    #[tokio::test]
    async fn test_dispose_invalidates_handles() {
        let transport = ScriptedTransport::new(|req| response(req, 200, &[], "body"));
        let ctx = context(transport, ContextOptions::default()).await;

        let first = ctx.get("https://example.com/1").await.unwrap();
        let second = ctx.get("https://example.com/2").await.unwrap();
        assert_eq!(first.text().unwrap(), "body");

        ctx.dispose();
        ctx.dispose();

        assert!(first.body().unwrap_err().is_disposed());
        assert!(second.body().unwrap_err().is_disposed());
        assert!(ctx.get("https://example.com/3").await.unwrap_err().is_disposed());
    }

    #[tokio::test]
    async fn test_credentials_on_challenge() {
        let transport = ScriptedTransport::new(|req| {
            if req.headers.contains_key(AUTHORIZATION) {
                response(req, 200, &[], "welcome")
            } else {
                response(req, 401, &[("WWW-Authenticate", "Basic realm=\"api\"")], "")
            }
        });
        let ctx = context(
            transport.clone(),
            ContextOptions::default().http_credentials(HttpCredentials::new("user", "pass")),
        )
        .await;

        let handle = ctx.get("https://example.com/private").await.unwrap();

        assert_eq!(handle.status(), 200);
        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].headers.get(AUTHORIZATION).unwrap(), "Basic dXNlcjpwYXNz");
    }

    #[tokio::test]
    async fn test_credentials_always_respects_origin() {
        let transport = ScriptedTransport::new(|req| response(req, 200, &[], ""));
        let ctx = context(
            transport.clone(),
            ContextOptions::default().http_credentials(
                HttpCredentials::new("user", "pass")
                    .origin("https://example.com")
                    .send(CredentialsSend::Always),
            ),
        )
        .await;

        ctx.get("https://example.com/").await.unwrap();
        ctx.get("https://other.com/").await.unwrap();

        let sent = transport.sent();
        assert!(sent[0].headers.contains_key(AUTHORIZATION));
        assert!(!sent[1].headers.contains_key(AUTHORIZATION));
    }

    #[tokio::test]
    async fn test_session_shares_cookies_and_storage() {
        let session = Arc::new(MemorySession::new());
        session.set_item("https://example.com", "token", "t1");
        session
            .cookies()
            .add_from_header("page=1", &Url::parse("https://example.com/").unwrap());

        let transport = ScriptedTransport::new(|req| response(req, 200, &[("Set-Cookie", "api=2")], ""));
        let ctx = ApiRequestContext::with_transport(
            ContextOptions::default(),
            transport.clone(),
            Some(session.clone()),
        )
        .await
        .unwrap();

        ctx.get("https://example.com/").await.unwrap();

        assert_eq!(transport.cookie_headers(), vec![Some("page=1".to_string())]);
        assert_eq!(session.cookies().len(), 2);

        let state = ctx.snapshot();
        assert_eq!(state.cookies.len(), 2);
        assert_eq!(state.origins.len(), 1);
        assert_eq!(state.origins[0].local_storage[0].value, "t1");
    }

    #[tokio::test]
    async fn test_restore_into_session_and_standalone() {
        let mut state = StorageState::new();
        state.cookies.push(Cookie::new("sid", "1").domain(".example.com"));
        state.add_local_storage("https://example.com", "k", "v");

        let session = Arc::new(MemorySession::new());
        let transport = ScriptedTransport::new(|req| response(req, 200, &[], ""));
        let associated = ApiRequestContext::with_transport(
            ContextOptions::default().storage_state(state.clone()),
            transport.clone(),
            Some(session.clone()),
        )
        .await
        .unwrap();
        assert_eq!(associated.snapshot(), state);
        assert_eq!(session.get_item("https://example.com", "k"), Some("v".to_string()));

        let standalone = context(transport, ContextOptions::default().storage_state(state)).await;
        let snapshot = standalone.snapshot();
        assert_eq!(snapshot.cookies.len(), 1);
        assert!(snapshot.origins.is_empty());
    }

    #[tokio::test]
    async fn test_storage_state_persists_to_path() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new(|req| response(req, 200, &[("Set-Cookie", "a=1")], ""));
        let ctx = context(transport, ContextOptions::default()).await;
        ctx.get("https://example.com/").await.unwrap();

        let first = dir.path().join("state.json");
        let json = ctx
            .storage_state(StorageStateOptions::new().path(&first))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&first).unwrap(), json);

        ctx.cookies().merge(vec![Cookie::new("b", "2").domain("example.com")]);
        let second = dir.path().join("other/state.json");
        let json2 = ctx
            .storage_state(StorageStateOptions::new().path(&second))
            .await
            .unwrap();

        assert_ne!(json, json2);
        assert_eq!(std::fs::read_to_string(&first).unwrap(), json);
        assert_eq!(std::fs::read_to_string(&second).unwrap(), json2);
    }

    #[tokio::test]
    async fn test_concurrent_requests() {
        let transport = ScriptedTransport::new(|req| {
            let name = req.url.path().trim_start_matches('/').to_string();
            let cookie = format!("{}=1", name);
            response(req, 200, &[("Set-Cookie", cookie.as_str())], &name)
        });
        let ctx = Arc::new(context(transport, ContextOptions::default()).await);

        let handles = futures::future::join_all((0..16).map(|i| {
            let ctx = ctx.clone();
            async move { ctx.get(format!("https://example.com/c{}", i)).await }
        }))
        .await;

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.unwrap().text().unwrap(), format!("c{}", i));
        }
        assert_eq!(ctx.cookies().all().len(), 16);
        assert_eq!(ctx.cache().len(), 16);
    }
}

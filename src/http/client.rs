// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Transport seam and the reqwest-backed HTTP client

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::redirect::Policy;
use reqwest::Client;
use url::Url;

use super::request::{MultipartValue, PreparedRequest, RequestBody};
use crate::error::{Error, Result};

/// One completed HTTP exchange, as produced by a transport
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// Status code
    pub status: u16,
    /// Status text
    pub status_text: String,
    /// Headers in arrival order
    pub headers: Vec<(String, String)>,
    /// Full body
    pub body: Bytes,
    /// URL the response came from
    pub url: Url,
}

impl RawResponse {
    /// Get all values for a header
    pub fn header_all(&self, name: &str) -> impl Iterator<Item = &str> + '_ {
        let name = name.to_string();
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(&name))
            .map(|(_, v)| v.as_str())
    }

    /// Get a header value
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_all(name).next()
    }
}

/// Executes exactly one HTTP exchange; never follows redirects itself
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return the complete response
    ///
    /// Transport-level failures (DNS, connect, timeout, malformed response)
    /// come back as [`Error::Transport`]. HTTP error statuses are responses.
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse>;
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// User agent string
    pub user_agent: String,
    /// Default proxy URL
    pub proxy: Option<String>,
    /// Accept invalid certificates (dangerous!)
    pub accept_invalid_certs: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: super::DEFAULT_USER_AGENT.to_string(),
            proxy: None,
            accept_invalid_certs: false,
        }
    }
}

/// reqwest-backed [`Transport`]
///
/// Keeps one reqwest client per (proxy, certificate policy) pair, since both
/// are client-level settings in reqwest but per-request options here.
pub struct HttpClient {
    config: HttpClientConfig,
    clients: DashMap<(Option<String>, bool), Client>,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Self {
            config,
            clients: DashMap::new(),
        };
        // Surface an invalid default proxy at construction time
        client.client_for(client.config.proxy.clone(), client.config.accept_invalid_certs)?;
        Ok(client)
    }

    /// Get client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    fn client_for(&self, proxy: Option<String>, accept_invalid_certs: bool) -> Result<Client> {
        let key = (proxy, accept_invalid_certs);
        if let Some(client) = self.clients.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = Client::builder()
            .user_agent(&self.config.user_agent)
            .redirect(Policy::none())
            .danger_accept_invalid_certs(accept_invalid_certs);

        if let Some(ref proxy_url) = key.0 {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy_url)
                    .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?,
            );
        }

        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        self.clients.insert(key, client.clone());
        Ok(client)
    }

    fn transport_error(request: &PreparedRequest, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::transport_timeout(
                request.method.as_str(),
                request.url.as_str(),
                format!("timeout {}ms exceeded", request.timeout.as_millis()),
            )
        } else {
            Error::transport(request.method.as_str(), request.url.as_str(), err.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse> {
        let start = Instant::now();
        let proxy = request.proxy.clone().or_else(|| self.config.proxy.clone());
        let client = self.client_for(
            proxy,
            request.ignore_https_errors || self.config.accept_invalid_certs,
        )?;

        let mut builder = client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());

        if request.timeout > Duration::ZERO {
            builder = builder.timeout(request.timeout);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Bytes(bytes) => builder.body(bytes.clone()),
            RequestBody::Json(value) => {
                if !request.headers.contains_key(CONTENT_TYPE) {
                    builder = builder.header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                let body = serde_json::to_vec(value)
                    .map_err(|e| Error::invalid(format!("request body is not serializable: {}", e)))?;
                builder.body(body)
            }
            RequestBody::Form(fields) => {
                if !request.headers.contains_key(CONTENT_TYPE) {
                    builder = builder.header(
                        CONTENT_TYPE,
                        HeaderValue::from_static("application/x-www-form-urlencoded"),
                    );
                }
                let body = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(fields.iter())
                    .finish();
                builder.body(body)
            }
            RequestBody::Multipart(fields) => {
                let mut form = Form::new();
                for field in fields {
                    form = match &field.value {
                        MultipartValue::Text(text) => form.text(field.name.clone(), text.clone()),
                        MultipartValue::File {
                            file_name,
                            mime_type,
                            buffer,
                        } => {
                            let part = Part::bytes(buffer.to_vec())
                                .file_name(file_name.clone())
                                .mime_str(mime_type)
                                .map_err(|e| {
                                    Error::invalid(format!("invalid mime type '{}': {}", mime_type, e))
                                })?;
                            form.part(field.name.clone(), part)
                        }
                    };
                }
                builder.multipart(form)
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| Self::transport_error(request, e))?;

        let status = response.status();
        let url = response.url().clone();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| Self::transport_error(request, e))?;

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            bytes = body.len(),
            time_ms = start.elapsed().as_millis() as u64,
            "Exchange complete"
        );

        Ok(RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body,
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = HttpClient::new().unwrap();
        assert_eq!(client.config().user_agent, super::super::DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_invalid_proxy_rejected() {
        let result = HttpClient::with_config(HttpClientConfig {
            proxy: Some("not a proxy url".to_string()),
            ..Default::default()
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_raw_response_headers() {
        let response = RawResponse {
            status: 302,
            status_text: "Found".to_string(),
            headers: vec![
                ("Location".to_string(), "/next".to_string()),
                ("set-cookie".to_string(), "a=1".to_string()),
                ("Set-Cookie".to_string(), "b=2".to_string()),
            ],
            body: Bytes::new(),
            url: Url::parse("https://example.com/").unwrap(),
        };

        assert_eq!(response.header("location"), Some("/next"));
        assert_eq!(response.header_all("set-cookie").count(), 2);
    }
}

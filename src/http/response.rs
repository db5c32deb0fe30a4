// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Response handles
//!
//! A [`ResponseHandle`] carries the metadata of a completed exchange; its body
//! lives in the owning context's [`ResponseCache`]. A 4xx or 5xx status is a
//! successful dispatch: inspect [`ResponseHandle::status`] or
//! [`ResponseHandle::ok`] to tell them apart.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use url::Url;

use super::cache::{ResponseCache, ResponseId};
use super::headers;
use crate::error::{Error, Result};

/// Handle to a completed exchange
///
/// Not `Clone`: there is exactly one handle per exchange.
pub struct ResponseHandle {
    id: ResponseId,
    status: u16,
    status_text: String,
    headers: Vec<(String, String)>,
    url: Url,
    cache: Arc<ResponseCache>,
}

impl ResponseHandle {
    pub(crate) fn new(
        id: ResponseId,
        status: u16,
        status_text: String,
        headers: Vec<(String, String)>,
        url: Url,
        cache: Arc<ResponseCache>,
    ) -> Self {
        Self {
            id,
            status,
            status_text,
            headers,
            url,
            cache,
        }
    }

    /// Id of the cached body
    pub fn id(&self) -> ResponseId {
        self.id
    }

    /// Status code
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Status text
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Check if status is success (2xx)
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// URL reached after redirects
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Headers in arrival order, duplicates kept
    pub fn headers_array(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Headers keyed by lower-cased name. Repeated headers are joined with
    /// `, `, except `set-cookie` which is joined with newlines.
    pub fn headers(&self) -> BTreeMap<String, String> {
        let mut map: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in &self.headers {
            let name = name.to_ascii_lowercase();
            let separator = if name == headers::SET_COOKIE { "\n" } else { ", " };
            map.entry(name)
                .and_modify(|existing| {
                    existing.push_str(separator);
                    existing.push_str(value);
                })
                .or_insert_with(|| value.clone());
        }
        map
    }

    /// Get a header value (the first one, case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get all values for a header
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Get content type
    pub fn content_type(&self) -> Option<&str> {
        self.header(headers::CONTENT_TYPE)
    }

    /// Get raw body bytes; fails once the handle or its context is disposed
    pub fn body(&self) -> Result<Bytes> {
        self.cache.body(self.id)
    }

    /// Get body as text
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body()?.to_vec())
            .map_err(|e| Error::Codec(format!("response body is not UTF-8: {}", e)))
    }

    /// Get body as text, lossy conversion
    pub fn text_lossy(&self) -> Result<String> {
        Ok(String::from_utf8_lossy(&self.body()?).into_owned())
    }

    /// Parse body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body()?)
            .map_err(|e| Error::Codec(format!("response body is not valid JSON: {}", e)))
    }

    /// Release the cached body
    pub fn dispose(&self) {
        self.cache.dispose(self.id);
    }

    /// Check if the body has been released
    pub fn is_disposed(&self) -> bool {
        !self.cache.contains(self.id)
    }
}

impl fmt::Debug for ResponseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseHandle")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers.len())
            .finish()
    }
}

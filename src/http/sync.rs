// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Cookie synchronization between a request context and its cookie store

use std::sync::Arc;

use parking_lot::Mutex;
use url::Url;

use super::cookie::{Cookie, CookieJar, CookieStore};

/// Pulls cookies into outgoing requests and pushes `Set-Cookie` results back
///
/// Holds a capability handle to the store rather than owning it: a standalone
/// context gets a private [`CookieJar`], an associated context gets the
/// session's store. Each read or merge batch runs under one lock, so a batch
/// is atomic with respect to other exchanges. Network I/O never runs under it.
#[derive(Clone)]
pub struct CookieSync {
    store: Arc<dyn CookieStore>,
    lock: Arc<Mutex<()>>,
}

impl CookieSync {
    /// Synchronize with a private, empty jar
    pub fn standalone() -> Self {
        Self::with_store(Arc::new(CookieJar::new()))
    }

    /// Synchronize with a shared store
    pub fn with_store(store: Arc<dyn CookieStore>) -> Self {
        Self {
            store,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<dyn CookieStore> {
        &self.store
    }

    /// Cookies eligible for a request to `url`
    pub fn cookies_for(&self, url: &Url) -> Vec<Cookie> {
        let _guard = self.lock.lock();
        self.store.cookies_for(url)
    }

    /// Build the `Cookie` header for `url`
    ///
    /// Pairs from an explicit caller header win per name; jar cookies whose
    /// name the caller already set are left out.
    pub fn cookie_header(&self, url: &Url, explicit: Option<&str>) -> Option<String> {
        let explicit_pairs: Vec<(&str, &str)> = explicit
            .map(|header| {
                header
                    .split(';')
                    .filter_map(|pair| {
                        let pair = pair.trim();
                        if pair.is_empty() {
                            return None;
                        }
                        Some(pair.split_once('=').unwrap_or((pair, "")))
                    })
                    .map(|(name, value)| (name.trim(), value.trim()))
                    .collect()
            })
            .unwrap_or_default();

        let mut pairs: Vec<String> = explicit_pairs
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        pairs.extend(
            self.cookies_for(url)
                .into_iter()
                .filter(|c| !explicit_pairs.iter().any(|(name, _)| *name == c.name))
                .map(|c| c.to_header_value()),
        );

        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    /// Merge cookies into the store, in order
    pub fn merge(&self, cookies: Vec<Cookie>) {
        let _guard = self.lock.lock();
        for cookie in cookies {
            self.store.store(cookie);
        }
    }

    /// Parse `Set-Cookie` values received from `url` and merge them; returns
    /// the number of accepted cookies
    pub fn merge_set_cookies<'a>(
        &self,
        url: &Url,
        headers: impl IntoIterator<Item = &'a str>,
    ) -> usize {
        let cookies: Vec<Cookie> = headers
            .into_iter()
            .filter_map(|header| {
                let cookie = Cookie::parse(header, url);
                if cookie.is_none() {
                    tracing::debug!(url = %url, header = %header, "Ignoring Set-Cookie");
                }
                cookie
            })
            .collect();
        let count = cookies.len();
        if count > 0 {
            tracing::debug!(url = %url, count, "Merging response cookies");
            self.merge(cookies);
        }
        count
    }

    /// Every unexpired cookie
    pub fn all(&self) -> Vec<Cookie> {
        let _guard = self.lock.lock();
        self.store.all()
    }
}

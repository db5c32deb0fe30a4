// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Browser session association
//!
//! A request context associated with a browser session shares the session's
//! cookie store and reports the session's local storage in its storage state.
//! [`MemorySession`] is an in-memory session for embedding and tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::http::{CookieJar, CookieStore};
use crate::storage::StorageState;

/// What a request context needs from a browser session
pub trait BrowserSession: Send + Sync {
    /// The session's cookie store; the context reads and writes it in place
    fn cookie_store(&self) -> Arc<dyn CookieStore>;

    /// Origins that have local storage
    fn origins(&self) -> Vec<String>;

    /// Local storage of one origin, in insertion order
    fn local_storage(&self, origin: &str) -> Vec<(String, String)>;

    /// Replace the local storage of one origin
    fn set_local_storage(&self, origin: &str, items: Vec<(String, String)>);
}

/// In-memory browser session: a cookie jar plus local storage per origin
#[derive(Debug, Default)]
pub struct MemorySession {
    cookie_jar: Arc<CookieJar>,
    local_storage: RwLock<BTreeMap<String, Vec<(String, String)>>>,
}

impl MemorySession {
    /// Create a new empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session pre-populated from a snapshot
    pub fn from_state(state: &StorageState) -> Self {
        let session = Self::new();
        for cookie in &state.cookies {
            session.cookie_jar.store(cookie.clone());
        }
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
        session
    }

    /// Get the cookie jar
    pub fn cookies(&self) -> &CookieJar {
        &self.cookie_jar
    }

    /// Set a localStorage item, keeping the position of an existing key
    pub fn set_item(&self, origin: &str, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        let mut storage = self.local_storage.write();
        let items = storage.entry(origin.to_string()).or_default();
        match items.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value,
            None => items.push((key, value)),
        }
    }

    /// Get a localStorage item
    pub fn get_item(&self, origin: &str, key: &str) -> Option<String> {
        self.local_storage
            .read()
            .get(origin)
            .and_then(|items| items.iter().find(|(k, _)| k == key))
            .map(|(_, v)| v.clone())
    }

    /// Remove a localStorage item
    pub fn remove_item(&self, origin: &str, key: &str) {
        let mut storage = self.local_storage.write();
        if let Some(items) = storage.get_mut(origin) {
            items.retain(|(k, _)| k != key);
            if items.is_empty() {
                storage.remove(origin);
            }
        }
    }

    /// Clear cookies and local storage
    pub fn clear(&self) {
        self.cookie_jar.clear();
        self.local_storage.write().clear();
    }
}

impl BrowserSession for MemorySession {
    fn cookie_store(&self) -> Arc<dyn CookieStore> {
        self.cookie_jar.clone()
    }

    fn origins(&self) -> Vec<String> {
        self.local_storage.read().keys().cloned().collect()
    }

    fn local_storage(&self, origin: &str) -> Vec<(String, String)> {
        self.local_storage
            .read()
            .get(origin)
            .cloned()
            .unwrap_or_default()
    }

    fn set_local_storage(&self, origin: &str, items: Vec<(String, String)>) {
        let mut storage = self.local_storage.write();
        if items.is_empty() {
            storage.remove(origin);
        } else {
            storage.insert(origin.to_string(), items);
        }
    }
}

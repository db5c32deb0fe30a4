// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! In-memory store of response bodies
//!
//! The cache is the only owner of body bytes. Bodies stay until their handle
//! is disposed or the whole cache is disposed; there is no eviction. Bodies
//! are immutable [`Bytes`], so a read racing a disposal sees either the whole
//! body or [`Error::Disposed`].

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::{Error, Result};

/// Opaque identifier of a cached response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResponseId(u64);

impl fmt::Display for ResponseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "response#{}", self.0)
    }
}

#[derive(Debug, Default)]
struct CacheState {
    bodies: HashMap<ResponseId, Bytes>,
    closed: bool,
}

/// Response body cache
#[derive(Debug, Default)]
pub struct ResponseCache {
    state: RwLock<CacheState>,
    next_id: AtomicU64,
}

impl ResponseCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a body and return its id. Fails once the cache has been disposed.
    pub fn register(&self, body: Bytes) -> Result<ResponseId> {
        let mut state = self.state.write();
        if state.closed {
            return Err(Error::disposed("Request context"));
        }
        let id = ResponseId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::trace!(id = %id, bytes = body.len(), "Registered response body");
        state.bodies.insert(id, body);
        Ok(id)
    }

    /// Get the body of a response
    pub fn body(&self, id: ResponseId) -> Result<Bytes> {
        self.state
            .read()
            .bodies
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::disposed(format!("Response body of {}", id)))
    }

    /// Check if a body is still available
    pub fn contains(&self, id: ResponseId) -> bool {
        self.state.read().bodies.contains_key(&id)
    }

    /// Drop one body; disposing twice is a no-op
    pub fn dispose(&self, id: ResponseId) {
        if self.state.write().bodies.remove(&id).is_some() {
            tracing::trace!(id = %id, "Disposed response body");
        }
    }

    /// Drop every body and refuse further registrations; idempotent
    pub fn dispose_all(&self) {
        let mut state = self.state.write();
        if !state.closed {
            tracing::debug!(count = state.bodies.len(), "Disposing all response bodies");
        }
        state.bodies.clear();
        state.closed = true;
    }

    /// Check if the cache has been disposed
    pub fn is_disposed(&self) -> bool {
        self.state.read().closed
    }

    /// Number of live bodies
    pub fn len(&self) -> usize {
        self.state.read().bodies.len()
    }

    /// Check if no bodies are held
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes held
    pub fn total_bytes(&self) -> usize {
        self.state.read().bodies.values().map(Bytes::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_repeated_reads_return_same_bytes() {
        let cache = ResponseCache::new();
        let id = cache.register(Bytes::from_static(b"hello")).unwrap();

        assert_eq!(cache.body(id).unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(cache.body(id).unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(cache.total_bytes(), 5);
    }

    #[test]
    fn test_dispose_single() {
        let cache = ResponseCache::new();
        let first = cache.register(Bytes::from_static(b"a")).unwrap();
        let second = cache.register(Bytes::from_static(b"b")).unwrap();

        cache.dispose(first);
        cache.dispose(first);

        assert!(cache.body(first).unwrap_err().is_disposed());
        assert_eq!(cache.body(second).unwrap(), Bytes::from_static(b"b"));
    }

    #[test]
    fn test_dispose_all_is_idempotent() {
        let cache = ResponseCache::new();
        let id = cache.register(Bytes::from_static(b"body")).unwrap();

        cache.dispose_all();
        cache.dispose_all();

        assert!(cache.is_disposed());
        assert!(cache.is_empty());
        assert!(matches!(cache.body(id), Err(Error::Disposed(_))));
        assert!(matches!(
            cache.register(Bytes::from_static(b"late")),
            Err(Error::Disposed(_))
        ));
    }

    #[test]
    fn test_concurrent_reads_and_disposal() {
        let cache = Arc::new(ResponseCache::new());
        let body = Bytes::from(vec![7u8; 64 * 1024]);
        let id = cache.register(body.clone()).unwrap();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                let body = body.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        match cache.body(id) {
                            Ok(bytes) => assert_eq!(bytes, body),
                            Err(err) => assert!(err.is_disposed()),
                        }
                    }
                })
            })
            .collect();

        cache.dispose_all();
        for reader in readers {
            reader.join().unwrap();
        }
        assert!(cache.body(id).is_err());
    }
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Portable storage state: cookies plus per-origin local storage
//!
//! The JSON layout is the one browser automation tools exchange:
//!
//! ```json
//! {
//!   "cookies": [
//!     { "name": "session", "value": "abc", "domain": ".example.com", "path": "/",
//!       "expires": -1, "httpOnly": true, "secure": true, "sameSite": "Lax" }
//!   ],
//!   "origins": [
//!     { "origin": "https://example.com",
//!       "localStorage": [ { "name": "token", "value": "t" } ] }
//!   ]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorContext, Result};
use crate::http::Cookie;

/// Cookies and local storage at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageState {
    /// Cookie jar contents
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    /// Local storage per origin
    #[serde(default)]
    pub origins: Vec<OriginState>,
}

/// Local storage of one origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginState {
    /// `scheme://host[:port]`
    pub origin: String,
    /// Key/value pairs in insertion order
    #[serde(default)]
    pub local_storage: Vec<StorageItem>,
}

/// A local storage entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageItem {
    pub name: String,
    pub value: String,
}

impl StorageState {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if there are neither cookies nor origins
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.origins.is_empty()
    }

    /// Local storage of an origin
    pub fn origin(&self, origin: &str) -> Option<&OriginState> {
        self.origins.iter().find(|o| o.origin == origin)
    }

    /// Add a local storage entry, creating the origin when needed
    pub fn add_local_storage(
        &mut self,
        origin: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) {
        let origin = origin.into();
        let item = StorageItem {
            name: name.into(),
            value: value.into(),
        };
        match self.origins.iter_mut().find(|o| o.origin == origin) {
            Some(existing) => existing.local_storage.push(item),
            None => self.origins.push(OriginState {
                origin,
                local_storage: vec![item],
            }),
        }
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Error::from)
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::from)
    }

    /// Write the JSON form to `path`, creating parent directories and
    /// replacing any existing file
    pub async fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = self.to_json()?;
        write_file(path.as_ref(), &json).await
    }

    /// Read a snapshot written by [`StorageState::persist`]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.with_path(path)?;
        Self::from_json(&json)
    }
}

/// Write text to a file, creating parent directories
pub(crate) async fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.with_path(parent)?;
    }
    tokio::fs::write(path, contents).await.with_path(path)?;
    tracing::debug!(path = %path.display(), bytes = contents.len(), "Persisted storage state");
    Ok(())
}

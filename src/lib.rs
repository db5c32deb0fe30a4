// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! # apireq - API request context
//!
//! Issue HTTP requests that share cookies and storage state with a browser
//! session, without loading any page.
//!
//! ## Features
//!
//! - Shared cookie jar: responses update the session's cookies, every hop sends them
//! - Redirects followed hop by hop with per-hop cookie recomputation
//! - Response bodies cached until disposed, individually or all at once
//! - Storage state snapshots in the common `{cookies, origins}` JSON layout
//! - Request templates layered under per-call overrides
//! - HTTP Basic credentials, proxies, per-request timeouts
//!
//! ## Example
//!
//! ```rust,no_run
//! use apireq::{ApiRequestContext, ContextOptions, StorageStateOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let context = ApiRequestContext::new(
//!         ContextOptions::new().base_url("https://api.example.com/"),
//!     )
//!     .await?;
//!
//!     let response = context.get("login").await?;
//!     println!("{} {}", response.status(), response.text()?);
//!
//!     context
//!         .storage_state(StorageStateOptions::new().path("state.json"))
//!         .await?;
//!     context.dispose();
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod session;
pub mod storage;

// Context and configuration
pub use config::{ContextOptions, CredentialsSend, HttpCredentials, StorageStateSource};
pub use context::{ApiRequestContext, StorageStateOptions};

// Errors
pub use error::{Error, ErrorContext, Result};

// HTTP
pub use http::{
    Cookie, CookieJar, CookieStore, CookieSync, HttpClient, HttpClientConfig, MultipartField,
    PreparedRequest, RawResponse, RedirectPolicy, RequestBody, RequestOptions, RequestTarget,
    RequestTemplate, ResponseCache, ResponseHandle, ResponseId, SameSite, Transport,
};

// Sessions and storage
pub use session::{BrowserSession, MemorySession};
pub use storage::{OriginState, StorageItem, StorageState};

/// apireq version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

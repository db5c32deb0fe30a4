// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP layer of the request context
//!
//! Cookie model and jar, request templates, the transport seam with its
//! reqwest implementation, the response cache and response handles.

mod cache;
mod client;
mod cookie;
mod request;
mod response;
mod sync;

pub use cache::{ResponseCache, ResponseId};
pub use client::{HttpClient, HttpClientConfig, RawResponse, Transport};
pub use cookie::{Cookie, CookieJar, CookieStore, SameSite};
pub use request::{
    resolve_url, MultipartField, MultipartValue, PreparedRequest, RedirectPolicy, RequestBody,
    RequestOptions, RequestTarget, RequestTemplate,
};
pub use response::ResponseHandle;
pub use sync::CookieSync;

pub(crate) use request::insert_header;

/// Default user agent string
pub const DEFAULT_USER_AGENT: &str = concat!("apireq/", env!("CARGO_PKG_VERSION"));

/// Common HTTP headers
pub mod headers {
    pub const AUTHORIZATION: &str = "authorization";
    pub const CONTENT_LENGTH: &str = "content-length";
    pub const CONTENT_TYPE: &str = "content-type";
    pub const COOKIE: &str = "cookie";
    pub const LOCATION: &str = "location";
    pub const SET_COOKIE: &str = "set-cookie";
    pub const WWW_AUTHENTICATE: &str = "www-authenticate";
}

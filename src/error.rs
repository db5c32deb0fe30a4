// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Error types for the API request context
//!
//! HTTP failure statuses (4xx/5xx) are *not* errors: they come back as a
//! normal [`ResponseHandle`](crate::ResponseHandle) whose status the caller
//! inspects. Only transport failures, invalid input, redirect loops, disposal
//! and codec/persistence problems surface as [`Error`]. The single exception
//! is [`Error::HttpStatus`], produced only when `fail_on_status_code` is set.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for request context operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the request context
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed URL, request template or option
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Redirect chain longer than the configured maximum
    #[error("Too many redirects for {method} {url}: exceeded limit of {max}")]
    TooManyRedirects {
        method: String,
        url: String,
        max: usize,
    },

    /// DNS, connect, timeout or malformed-response failure reported by the transport
    #[error("{method} {url} failed: {message}")]
    Transport {
        method: String,
        url: String,
        message: String,
        timed_out: bool,
    },

    /// Body or context accessed after disposal
    #[error("{0} has been disposed")]
    Disposed(String),

    /// Malformed storage state text
    #[error("Storage state codec error: {0}")]
    Codec(String),

    /// Storage state file could not be read or written
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Non-2xx/3xx status while `fail_on_status_code` is enabled
    #[error("{method} {url} returned {status} {status_text}")]
    HttpStatus {
        method: String,
        url: String,
        status: u16,
        status_text: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an invalid argument error
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create a transport error
    pub fn transport(
        method: impl Into<String>,
        url: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Transport {
            method: method.into(),
            url: url.into(),
            message: message.into(),
            timed_out: false,
        }
    }

    /// Create a transport timeout error
    pub fn transport_timeout(
        method: impl Into<String>,
        url: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Transport {
            method: method.into(),
            url: url.into(),
            message: message.into(),
            timed_out: true,
        }
    }

    /// Create a disposed error
    pub fn disposed<S: Into<String>>(what: S) -> Self {
        Error::Disposed(what.into())
    }

    /// Create an I/O error bound to a path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if this is a transport-level failure
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }

    /// Check if this is a transport timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Transport { timed_out: true, .. })
    }

    /// Check if this error comes from disposal
    pub fn is_disposed(&self) -> bool {
        matches!(self, Error::Disposed(_))
    }

    /// Get HTTP status code if available
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Get URL if available
    pub fn url(&self) -> Option<&str> {
        match self {
            Error::TooManyRedirects { url, .. } => Some(url),
            Error::Transport { url, .. } => Some(url),
            Error::HttpStatus { url, .. } => Some(url),
            _ => None,
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::InvalidArgument(format!("invalid URL: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Codec(err.to_string())
    }
}

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    /// Bind an I/O failure to the path it happened on
    fn with_path(self, path: &std::path::Path) -> Result<T>;
}

impl<T> ErrorContext<T> for std::result::Result<T, std::io::Error> {
    fn with_path(self, path: &std::path::Path) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}

//! Script fetching.
//!
//! A [`ScriptSource`] turns a URL into script bytes. The production
//! implementation is [`HttpFetcher`]; tests drive the session controller
//! with in-memory sources.

pub mod http;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use http::{FetcherBuildError, HttpFetcher};

/// Errors a fetch can end with.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Fetching {url} timed out after {}s", .after.as_secs())]
    Timeout { url: String, after: Duration },

    #[error("{url} returned an empty script")]
    EmptyContent { url: String },

    #[error("Network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Invalid script URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Refusing to fetch {url} over plain HTTP (HTTPS-only is enabled)")]
    InsecureScheme { url: String },
}

#[async_trait]
pub trait ScriptSource: Send + Sync {
    /// Download the script at `url`.
    ///
    /// A body that is empty or only whitespace is an
    /// [`FetchError::EmptyContent`] error.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Whether a fetched body contains anything but whitespace.
pub(crate) fn has_content(body: &[u8]) -> bool {
    !String::from_utf8_lossy(body).trim().is_empty()
}

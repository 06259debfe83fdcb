//! HTTPS fetcher built on `reqwest`.

use super::{has_content, FetchError, ScriptSource};
use ab_protocol::config_models::FetchConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::tls::Version;
use reqwest::{Client, Url};
use std::time::Duration;
use thiserror::Error;

/// Errors while building an [`HttpFetcher`].
#[derive(Error, Debug)]
pub enum FetcherBuildError {
    #[error("Invalid API key header: {0}")]
    InvalidHeader(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Fetches scripts over HTTPS with TLS 1.2 or newer.
///
/// Every request carries the configured `User-Agent` and, when set up,
/// an API key header.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
    https_only: bool,
    api_key: Option<(HeaderName, HeaderValue)>,
}

impl HttpFetcher {
    /// Build a fetcher from the `[fetch]` configuration section.
    ///
    /// The API key, if any, is read from the environment variable named
    /// by `api_key_env`. A missing variable disables the header.
    pub fn from_config(config: &FetchConfig) -> Result<Self, FetcherBuildError> {
        let api_key = match (&config.api_key_header, &config.api_key_env) {
            (Some(header), Some(var)) => match std::env::var(var) {
                Ok(key) => Some(parse_api_key(header, &key)?),
                Err(_) => {
                    tracing::warn!(var = %var, "API key variable not set, sending no key");
                    None
                }
            },
            _ => None,
        };

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .min_tls_version(Version::TLS_1_2)
            .https_only(config.https_only)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            timeout,
            https_only: config.https_only,
            api_key,
        })
    }

    fn classify(&self, url: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                after: self.timeout,
            }
        } else {
            FetchError::Network {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

fn parse_api_key(header: &str, key: &str) -> Result<(HeaderName, HeaderValue), FetcherBuildError> {
    let name = HeaderName::from_bytes(header.as_bytes())
        .map_err(|e| FetcherBuildError::InvalidHeader(format!("{header}: {e}")))?;
    let mut value = HeaderValue::from_str(key)
        .map_err(|e| FetcherBuildError::InvalidHeader(format!("{header}: {e}")))?;
    value.set_sensitive(true);
    Ok((name, value))
}

#[async_trait]
impl ScriptSource for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        match parsed.scheme() {
            "https" => {}
            "http" if !self.https_only => {}
            "http" => {
                return Err(FetchError::InsecureScheme {
                    url: url.to_string(),
                })
            }
            other => {
                return Err(FetchError::InvalidUrl {
                    url: url.to_string(),
                    reason: format!("unsupported scheme '{other}'"),
                })
            }
        }

        tracing::debug!(url, "fetching script");
        let mut request = self.client.get(parsed);
        if let Some((name, value)) = &self.api_key {
            request = request.header(name.clone(), value.clone());
        }

        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| self.classify(url, e))?;
        let body = response.bytes().await.map_err(|e| self.classify(url, e))?;

        if !has_content(&body) {
            return Err(FetchError::EmptyContent {
                url: url.to_string(),
            });
        }
        tracing::debug!(url, bytes = body.len(), "script fetched");
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FetchConfig {
        FetchConfig::default()
    }

    #[tokio::test]
    async fn test_https_only_rejects_plain_http() {
        let fetcher = HttpFetcher::from_config(&config()).unwrap();
        let err = fetcher.fetch("http://example.com/a.sh").await.unwrap_err();
        assert!(matches!(err, FetchError::InsecureScheme { .. }));
    }

    #[tokio::test]
    async fn test_rejects_unparseable_url() {
        let fetcher = HttpFetcher::from_config(&config()).unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_rejects_unsupported_scheme() {
        let fetcher = HttpFetcher::from_config(&config()).unwrap();
        let err = fetcher.fetch("ftp://example.com/a.sh").await.unwrap_err();
        match err {
            FetchError::InvalidUrl { reason, .. } => assert!(reason.contains("ftp")),
            other => panic!("Expected InvalidUrl, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_api_key_header_name() {
        let result = parse_api_key("bad header", "secret");
        assert!(matches!(result, Err(FetcherBuildError::InvalidHeader(_))));
    }
}

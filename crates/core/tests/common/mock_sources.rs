//! In-memory [`ScriptSource`] implementations for deterministic testing.

use ab_core::fetch::{FetchError, ScriptSource};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;

/// Serves fixed script bodies by URL. Unknown URLs fail with a network error.
#[allow(dead_code)]
#[derive(Default)]
pub struct StaticSource {
    scripts: HashMap<String, Vec<u8>>,
}

impl StaticSource {
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn with_script(mut self, url: &str, body: &str) -> Self {
        self.scripts.insert(url.to_string(), body.as_bytes().to_vec());
        self
    }
}

#[async_trait]
impl ScriptSource for StaticSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.scripts
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Network {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            })
    }
}

/// Always fails with the given error.
#[allow(dead_code)]
pub struct FailingSource(pub FetchError);

#[async_trait]
impl ScriptSource for FailingSource {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
        Err(self.0.clone())
    }
}

/// Holds every fetch until the gate is opened, then delegates.
#[allow(dead_code)]
pub struct GatedSource<S> {
    inner: S,
    gate: Arc<Notify>,
}

impl<S> GatedSource<S> {
    /// Returns the source and the gate that releases it.
    #[allow(dead_code)]
    pub fn new(inner: S) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        (
            Self {
                inner,
                gate: Arc::clone(&gate),
            },
            gate,
        )
    }
}

#[async_trait]
impl<S: ScriptSource> ScriptSource for GatedSource<S> {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.gate.notified().await;
        self.inner.fetch(url).await
    }
}

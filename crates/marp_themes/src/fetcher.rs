//! Retrieves the raw css of a theme from its backing source.

use crate::error::FetchError;
use crate::host::FileSystem;
use crate::key::{CanonicalKey, SourceKind};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Clone)]
pub struct ThemeFetcher {
    fs: Arc<dyn FileSystem>,
    client: reqwest::Client,
    timeout: Duration,
}

impl ThemeFetcher {
    pub fn new(fs: Arc<dyn FileSystem>, timeout: Duration) -> Self {
        Self {
            fs,
            client: reqwest::Client::new(),
            timeout,
        }
    }

    /// Same fetcher with another remote timeout, the http client is shared.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    /// Fetches the css text of `key`. No retry is attempted.
    pub async fn fetch(&self, key: &CanonicalKey, kind: SourceKind) -> Result<String, FetchError> {
        match kind {
            SourceKind::RemoteUrl => self.fetch_remote(key.as_str()).await,
            SourceKind::LocalFile | SourceKind::VirtualUri => self.read(key).await,
        }
    }

    async fn read(&self, key: &CanonicalKey) -> Result<String, FetchError> {
        let uri = key
            .to_uri()
            .map_err(|err| FetchError::Io(format!("invalid uri {key}: {err}")))?;
        let bytes = self
            .fs
            .read(&uri)
            .await
            .map_err(|err| FetchError::from_io(key.as_str(), err))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn fetch_remote(&self, url: &str) -> Result<String, FetchError> {
        let request = async {
            let response = self.client.get(url).send().await?.error_for_status()?;
            Ok::<_, FetchError>(response.text().await?)
        };

        // Dropping the request future on elapse aborts the underlying connection.
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_elapsed) => {
                tracing::debug!(url, timeout = ?self.timeout, "Aborted remote theme fetch");
                Err(FetchError::Timeout(self.timeout))
            }
        }
    }
}

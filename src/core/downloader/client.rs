// ─── HTTP Fetcher ───
// Single network seam for metadata documents and file downloads.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};

const USER_AGENT: &str = concat!("launchkit/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Network seam used by the resolver, the planners and the workers.
///
/// Everything that touches the network goes through this trait so a batch
/// can be exercised against an in-memory double.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Stream `url` into `dest`, creating parent directories.
    /// Returns the number of bytes written.
    async fn fetch_to_file(&self, url: &str, dest: &Path) -> LauncherResult<u64>;

    /// Fetch a small text document (JSON indexes, `.sha1` sidecars).
    async fn fetch_text(&self, url: &str) -> LauncherResult<String>;
}

/// `reqwest`-backed fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Client with the launcher user agent. Compression is disabled so the
    /// bytes on disk are exactly what the declared sha1 and size describe.
    pub fn new() -> LauncherResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_to_file(&self, url: &str, dest: &Path) -> LauncherResult<u64> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut written = 0_u64;
        // Scope the handle so it is closed before post-processing touches the file.
        {
            let mut file = tokio::fs::File::create(dest)
                .await
                .map_err(|e| LauncherError::io(dest, e))?;
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk)
                    .await
                    .map_err(|e| LauncherError::io(dest, e))?;
                written += chunk.len() as u64;
            }
            file.flush().await.map_err(|e| LauncherError::io(dest, e))?;
        }

        debug!("Downloaded: {} -> {:?} ({} bytes)", url, dest, written);
        Ok(written)
    }

    async fn fetch_text(&self, url: &str) -> LauncherResult<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

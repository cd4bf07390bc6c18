//! In-memory [`Fetcher`] for exercising planners and batches without a network.
//!
//! Responses are registered per URL. Every call is counted so tests can
//! assert exactly how many requests a batch issued.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::client::Fetcher;
use crate::core::error::{LauncherError, LauncherResult};

#[derive(Debug, Default)]
pub struct MemoryFetcher {
    responses: Mutex<HashMap<String, Vec<u8>>>,
    /// URLs that fail this many more times before succeeding.
    flaky: Mutex<HashMap<String, usize>>,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    pub fn serve(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> &Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(url.into(), body.into());
        }
        self
    }

    /// Make `url` fail `failures` times before it starts succeeding.
    pub fn fail_times(&self, url: impl Into<String>, failures: usize) -> &Self {
        if let Ok(mut flaky) = self.flaky.lock() {
            flaky.insert(url.into(), failures);
        }
        self
    }

    /// Total number of fetch calls, successful or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every URL requested so far, in call order.
    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn respond(&self, url: &str) -> LauncherResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requested) = self.requested.lock() {
            requested.push(url.to_string());
        }

        if let Ok(mut flaky) = self.flaky.lock() {
            if let Some(left) = flaky.get_mut(url) {
                if *left > 0 {
                    *left -= 1;
                    return Err(LauncherError::DownloadFailed {
                        url: url.to_string(),
                        status: 503,
                    });
                }
            }
        }

        self.responses
            .lock()
            .ok()
            .and_then(|r| r.get(url).cloned())
            .ok_or_else(|| LauncherError::DownloadFailed {
                url: url.to_string(),
                status: 404,
            })
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch_to_file(&self, url: &str, dest: &Path) -> LauncherResult<u64> {
        let body = self.respond(url)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }
        tokio::fs::write(dest, &body)
            .await
            .map_err(|e| LauncherError::io(dest, e))?;
        Ok(body.len() as u64)
    }

    async fn fetch_text(&self, url: &str) -> LauncherResult<String> {
        let body = self.respond(url)?;
        String::from_utf8(body).map_err(|e| LauncherError::Other(e.to_string()))
    }
}

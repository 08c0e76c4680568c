//! Streaming artifact download.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::config::{build_http_client, DEFAULT_DOWNLOAD_TIMEOUT};
use crate::error::{ClientError, ClientResult};

/// Fetches a generated artifact to local disk.
#[async_trait]
pub trait ArtifactDownloader: Send + Sync {
    /// Download `url` to `dest`. Returns the number of bytes written.
    ///
    /// `dest` only ever holds a complete body.
    async fn download(&self, url: &str, dest: &Path) -> ClientResult<u64>;
}

/// Plain HTTP GET streamed to `<dest>.part`, then renamed into place.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    pub fn new() -> ClientResult<Self> {
        Self::with_timeout(DEFAULT_DOWNLOAD_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> ClientResult<Self> {
        Ok(Self {
            client: build_http_client(timeout)?,
        })
    }

    async fn stream_to(&self, url: &str, part: &Path) -> ClientResult<u64> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let mut file = fs::File::create(part).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;

        if written == 0 {
            return Err(ClientError::invalid_response(format!("empty body from {url}")));
        }
        Ok(written)
    }
}

pub(crate) fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

#[async_trait]
impl ArtifactDownloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> ClientResult<u64> {
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let part = part_path(dest);
        match self.stream_to(url, &part).await {
            Ok(bytes) => {
                fs::rename(&part, dest).await?;
                debug!(dest = %dest.display(), bytes, "Artifact downloaded");
                Ok(bytes)
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&part).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!(part = %part.display(), "Failed to remove partial download: {}", cleanup);
                    }
                }
                Err(e)
            }
        }
    }
}

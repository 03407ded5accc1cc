//! Fetching artifact files.
//!
//! The [`ArtifactStore`](super::store::ArtifactStore) decides *what* to
//! fetch; an [`ArtifactFetcher`] only moves bytes from a URL into a `.part`
//! file, resuming when the file already holds a prefix.

use crate::error::{Result, VoxgateError};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Moves remote bytes into a local partial file.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Download `url` into `dest`, continuing after any bytes already there.
    ///
    /// Returns the total size of `dest` once the transfer finished.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// Fetcher used when downloads are disabled or not compiled in.
pub struct OfflineFetcher;

#[async_trait]
impl ArtifactFetcher for OfflineFetcher {
    async fn fetch(&self, url: &str, _dest: &Path) -> Result<u64> {
        Err(VoxgateError::ArtifactUnavailable {
            variant: url.to_string(),
            message: "downloads are disabled; install the artifact with `voxgate models install`"
                .to_string(),
        })
    }
}

/// Hex SHA-256 of a file's contents.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Hex SHA-256 of an in-memory buffer.
pub fn sha256_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[cfg(feature = "model-download")]
pub use http::HttpFetcher;

#[cfg(feature = "model-download")]
mod http {
    use super::ArtifactFetcher;
    use crate::error::{Result, VoxgateError};
    use async_trait::async_trait;
    use futures_util::StreamExt;
    use indicatif::{ProgressBar, ProgressStyle};
    use reqwest::StatusCode;
    use reqwest::header::RANGE;
    use std::fs;
    use std::io::Write;
    use std::path::Path;

    /// HTTP fetcher with `Range` resume.
    pub struct HttpFetcher {
        client: reqwest::Client,
        progress: bool,
    }

    impl HttpFetcher {
        pub fn new() -> Self {
            Self {
                client: reqwest::Client::new(),
                progress: false,
            }
        }

        /// Draw a terminal progress bar (CLI installs).
        pub fn with_progress(mut self, progress: bool) -> Self {
            self.progress = progress;
            self
        }

        fn progress_bar(&self, total: u64, position: u64) -> Option<ProgressBar> {
            if !self.progress {
                return None;
            }
            let pb = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb.set_position(position);
            Some(pb)
        }
    }

    impl Default for HttpFetcher {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ArtifactFetcher for HttpFetcher {
        async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            let existing = fs::metadata(dest).map(|m| m.len()).unwrap_or(0);

            let mut request = self.client.get(url);
            if existing > 0 {
                request = request.header(RANGE, format!("bytes={existing}-"));
            }
            let response = request.send().await.map_err(|e| VoxgateError::Download {
                message: format!("failed to start download of {url}: {e}"),
            })?;

            let status = response.status();
            if status == StatusCode::RANGE_NOT_SATISFIABLE && existing > 0 {
                tracing::debug!(url, existing, "server reports nothing left to resume");
                return Ok(existing);
            }
            if !status.is_success() {
                return Err(VoxgateError::Download {
                    message: format!("{url} returned status {status}"),
                });
            }

            let resumed = status == StatusCode::PARTIAL_CONTENT;
            let (mut file, mut written) = if resumed {
                tracing::info!(url, existing, "resuming download");
                (fs::OpenOptions::new().append(true).open(dest)?, existing)
            } else {
                (fs::File::create(dest)?, 0)
            };
            let total = response
                .content_length()
                .map(|len| len + written)
                .unwrap_or(0);
            let pb = self.progress_bar(total, written);

            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| VoxgateError::Download {
                    message: format!("failed to read download chunk: {e}"),
                })?;
                file.write_all(&chunk)?;
                written += chunk.len() as u64;
                if let Some(ref pb) = pb {
                    pb.inc(chunk.len() as u64);
                }
            }
            file.flush()?;

            if let Some(pb) = pb {
                pb.finish_with_message("Downloaded");
            }
            Ok(written)
        }
    }
}

//! Release archive download.

use super::release::Release;
use crate::config::FeedConfig;
use crate::error::{Result, UpdateError};
use crate::swapper::fs_ops;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Byte-level progress callback: `(downloaded, total)`. Returning an error
/// aborts the download.
pub type ByteProgress<'a> = &'a mut dyn FnMut(u64, Option<u64>) -> Result<()>;

/// Retrieves a release archive onto local disk.
pub trait ArchiveFetcher: Send + Sync {
    /// Download `release` to `dest`. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Network`] for transfer failures,
    /// [`UpdateError::Storage`] if `dest` cannot be written, or whatever
    /// `on_bytes` returns.
    fn fetch(&self, release: &Release, dest: &Path, on_bytes: ByteProgress<'_>) -> Result<u64>;
}

/// Streams archives over HTTP(S) with ureq.
pub struct HttpFetcher {
    agent: ureq::Agent,
    user_agent: String,
}

impl HttpFetcher {
    /// Fetcher using the feed's timeouts and user agent.
    pub fn new(feed: &FeedConfig) -> Self {
        Self {
            agent: super::checker::http_agent(feed),
            user_agent: feed.user_agent.clone(),
        }
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

impl ArchiveFetcher for HttpFetcher {
    fn fetch(&self, release: &Release, dest: &Path, on_bytes: ByteProgress<'_>) -> Result<u64> {
        tracing::info!(url = %release.url, dest = %dest.display(), "downloading release archive");

        let resp = self
            .agent
            .get(&release.url)
            .set("User-Agent", &self.user_agent)
            .call()
            .map_err(|e| UpdateError::Network(format!("download failed: {e}")))?;

        let total = resp
            .header("Content-Length")
            .and_then(|v| v.parse::<u64>().ok())
            .or(release.size);

        // Write to a sibling `.part` file, then rename into place.
        let tmp = partial_path(dest);
        let mut file = std::fs::File::create(&tmp)
            .map_err(|e| UpdateError::storage("create", &tmp, e))?;
        let mut reader = resp.into_reader();

        let streamed = (|| -> Result<u64> {
            let mut buf = [0u8; 64 * 1024];
            let mut downloaded: u64 = 0;
            on_bytes(0, total)?;
            loop {
                let n = reader
                    .read(&mut buf)
                    .map_err(|e| UpdateError::Network(format!("download read error: {e}")))?;
                if n == 0 {
                    break;
                }
                file.write_all(&buf[..n])
                    .map_err(|e| UpdateError::storage("write", &tmp, e))?;
                downloaded += n as u64;
                on_bytes(downloaded, total)?;
            }
            file.flush()
                .map_err(|e| UpdateError::storage("flush", &tmp, e))?;

            if let Some(expected) = total
                && expected != downloaded
            {
                return Err(UpdateError::Integrity(format!(
                    "truncated download: expected {expected} bytes, got {downloaded}"
                )));
            }
            drop(file);
            std::fs::rename(&tmp, dest).map_err(|e| UpdateError::storage("finalize", dest, e))?;
            Ok(downloaded)
        })();

        // The closure owns `file`, so the handle is closed by now.
        let downloaded = match streamed {
            Ok(n) => n,
            Err(e) => {
                if let Err(cleanup) = fs_ops::remove_path_if_present(&tmp) {
                    tracing::warn!(error = %cleanup, "cannot remove partial download");
                }
                return Err(e);
            }
        };

        tracing::info!(bytes = downloaded, "download complete");
        Ok(downloaded)
    }
}

/// Copies an archive already on disk (offline installs, `file://`-style feeds).
pub struct LocalFileFetcher {
    source: PathBuf,
}

impl LocalFileFetcher {
    /// Fetcher that always copies `source`.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

impl ArchiveFetcher for LocalFileFetcher {
    fn fetch(&self, _release: &Release, dest: &Path, on_bytes: ByteProgress<'_>) -> Result<u64> {
        let total = std::fs::metadata(&self.source)
            .map_err(|e| UpdateError::storage("read", &self.source, e))?
            .len();
        on_bytes(0, Some(total))?;
        let copied = std::fs::copy(&self.source, dest)
            .map_err(|e| UpdateError::storage("copy archive to", dest, e))?;
        on_bytes(copied, Some(total))?;
        Ok(copied)
    }
}

//! Release feed checker.
//!
//! Queries a GitHub-style "latest release" endpoint, compares the published
//! version with the installed one and caches the ETag of "nothing new"
//! responses so repeat checks are cheap conditional requests.

use super::release::{Release, version_is_newer};
use super::state::UpdateState;
use crate::config::FeedConfig;
use crate::error::{Result, UpdateError};

/// Builds a ureq agent with the feed's timeouts.
pub(crate) fn http_agent(feed: &FeedConfig) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(feed.connect_timeout())
        .timeout_read(feed.read_timeout())
        .build()
}

/// Checks the release feed for versions newer than the installed one.
pub struct UpdateChecker {
    agent: ureq::Agent,
    feed: FeedConfig,
    current_version: String,
}

impl UpdateChecker {
    /// Create a checker for the given feed and installed version.
    pub fn new(feed: &FeedConfig, current_version: impl Into<String>) -> Self {
        Self {
            agent: http_agent(feed),
            feed: feed.clone(),
            current_version: current_version.into(),
        }
    }

    /// Installed version this checker compares against.
    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    /// Query the feed. Returns `Ok(None)` when nothing newer is available,
    /// the feed answered `304 Not Modified`, or the newer release was
    /// dismissed. Updates `state` with the check time and ETag; the caller
    /// persists it.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Network`] if the feed is unreachable or its
    /// response cannot be parsed. Callers treat this as non-fatal.
    pub fn check_for_updates(&self, state: &mut UpdateState) -> Result<Option<Release>> {
        if self.feed.releases_url.is_empty() {
            return Err(UpdateError::Config("feed.releases_url is not set".to_owned()));
        }

        let mut request = self
            .agent
            .get(&self.feed.releases_url)
            .set("User-Agent", &self.feed.user_agent)
            .set("Accept", "application/vnd.github+json");
        if let Some(etag) = &state.etag {
            request = request.set("If-None-Match", etag);
        }

        let response = request
            .call()
            .map_err(|e| UpdateError::Network(format!("release check failed: {e}")))?;
        state.mark_checked();

        if response.status() == 304 {
            tracing::debug!("release feed not modified");
            return Ok(None);
        }

        let etag = response.header("ETag").map(str::to_owned);
        let body = response
            .into_string()
            .map_err(|e| UpdateError::Network(format!("cannot read release feed: {e}")))?;
        let mut release = Release::from_github_json(&body, &self.feed.asset_pattern)?;

        if !version_is_newer(&release.version, &self.current_version) {
            tracing::info!(
                latest = %release.version,
                current = %self.current_version,
                "already up to date"
            );
            state.etag = etag;
            return Ok(None);
        }

        if state.is_dismissed(&release.version) {
            tracing::info!(version = %release.version, "newer release was dismissed");
            return Ok(None);
        }

        if let Some(url) = release.sha256_url.clone() {
            release.sha256 = Some(self.fetch_checksum(&url)?);
        }

        tracing::info!(
            version = %release.version,
            asset = %release.asset_name,
            "update available"
        );
        Ok(Some(release))
    }

    /// Download a `.sha256` sidecar and return the first hex token.
    fn fetch_checksum(&self, url: &str) -> Result<String> {
        let text = self
            .agent
            .get(url)
            .set("User-Agent", &self.feed.user_agent)
            .call()
            .map_err(|e| UpdateError::Network(format!("checksum download failed: {e}")))?
            .into_string()
            .map_err(|e| UpdateError::Network(format!("cannot read checksum: {e}")))?;

        parse_checksum(&text)
            .ok_or_else(|| UpdateError::Integrity(format!("malformed checksum file at {url}")))
    }
}

/// Extract a 64-character hex digest from `sha256sum`-style text.
pub fn parse_checksum(text: &str) -> Option<String> {
    let token = text.split_whitespace().next()?;
    if token.len() == 64 && token.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(token.to_ascii_lowercase())
    } else {
        None
    }
}

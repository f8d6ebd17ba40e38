//! Release descriptors and version comparison.

use crate::error::{Result, UpdateError};
use serde::Deserialize;

/// A release available for installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Version without a leading `v` (e.g. `"1.4.2"`).
    pub version: String,
    /// Tag name as published (e.g. `"v1.4.2"`).
    pub tag: String,
    /// Direct download URL of the archive.
    pub url: String,
    /// Archive file name.
    pub asset_name: String,
    /// Archive size in bytes, if published.
    pub size: Option<u64>,
    /// Expected SHA-256 of the archive (hex), if published.
    pub sha256: Option<String>,
    /// URL of a `<asset>.sha256` sidecar, if published.
    pub sha256_url: Option<String>,
    /// Release notes.
    pub notes: String,
}

impl Release {
    /// Descriptor for an archive at `url` with no feed metadata.
    pub fn from_url(version: impl Into<String>, url: impl Into<String>) -> Self {
        let version = version.into();
        let url = url.into();
        let asset_name = url
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("release.zip")
            .to_owned();
        Self {
            tag: format!("v{version}"),
            version,
            url,
            asset_name,
            size: None,
            sha256: None,
            sha256_url: None,
            notes: String::new(),
        }
    }

    /// Parse a GitHub "latest release" payload, selecting the first asset
    /// whose name contains `asset_pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Network`] if the payload is malformed or has no
    /// matching asset.
    pub fn from_github_json(body: &str, asset_pattern: &str) -> Result<Self> {
        let payload: GithubRelease = serde_json::from_str(body)
            .map_err(|e| UpdateError::Network(format!("malformed release payload: {e}")))?;

        let asset = payload
            .assets
            .iter()
            .find(|a| a.name.contains(asset_pattern) && !a.name.ends_with(".sha256"))
            .ok_or_else(|| {
                UpdateError::Network(format!(
                    "release {} has no asset matching `{asset_pattern}`",
                    payload.tag_name
                ))
            })?;

        let sidecar = format!("{}.sha256", asset.name);
        let sha256_url = payload
            .assets
            .iter()
            .find(|a| a.name == sidecar)
            .map(|a| a.browser_download_url.clone());

        Ok(Self {
            version: strip_v(&payload.tag_name).to_owned(),
            tag: payload.tag_name.clone(),
            url: asset.browser_download_url.clone(),
            asset_name: asset.name.clone(),
            size: asset.size,
            sha256: None,
            sha256_url,
            notes: payload.body.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct GithubRelease {
    tag_name: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    assets: Vec<GithubAsset>,
}

#[derive(Debug, Deserialize)]
struct GithubAsset {
    name: String,
    browser_download_url: String,
    #[serde(default)]
    size: Option<u64>,
}

fn strip_v(tag: &str) -> &str {
    tag.strip_prefix('v')
        .or_else(|| tag.strip_prefix('V'))
        .unwrap_or(tag)
}

/// Parse `"1.2.3"`, `"v1.2"` or `"1.2.3-beta.1"` into numeric parts and an
/// optional pre-release suffix.
fn parse_version(version: &str) -> Option<(Vec<u64>, Option<&str>)> {
    let version = strip_v(version.trim());
    let (core, pre) = match version.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (version, None),
    };
    let core = core.split('+').next().unwrap_or(core);
    let parts = core
        .split('.')
        .map(|p| p.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    if parts.is_empty() {
        return None;
    }
    Some((parts, pre))
}

/// Returns `true` if `candidate` is strictly newer than `current`.
///
/// Missing components count as zero (`1.2` == `1.2.0`). A pre-release sorts
/// below the release it precedes. Unparseable versions are never newer.
pub fn version_is_newer(candidate: &str, current: &str) -> bool {
    let (Some((cand, cand_pre)), Some((cur, cur_pre))) =
        (parse_version(candidate), parse_version(current))
    else {
        return false;
    };

    let len = cand.len().max(cur.len());
    for i in 0..len {
        let a = cand.get(i).copied().unwrap_or(0);
        let b = cur.get(i).copied().unwrap_or(0);
        if a != b {
            return a > b;
        }
    }

    match (cand_pre, cur_pre) {
        (None, Some(_)) => true,
        (Some(a), Some(b)) => a > b,
        _ => false,
    }
}

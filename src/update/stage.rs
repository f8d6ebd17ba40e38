//! Building a staging directory from a release.

use super::extract::{Extractor, ZipExtractor, flatten_single_root};
use super::fetcher::{ArchiveFetcher, HttpFetcher};
use super::integrity;
use super::progress::band;
use super::release::Release;
use crate::config::FeedConfig;
use crate::error::Result;
use crate::layout::INTERNAL_DIR;
use std::path::{Path, PathBuf};

/// Percentage callback used while building a stage. Returning an error
/// (typically [`crate::UpdateError::Cancelled`]) aborts the build.
pub type StageProgress<'a> = &'a mut dyn FnMut(u8) -> Result<()>;

/// Acquires a release and lays it out in an empty staging directory.
pub trait StageBuilder: Send + Sync {
    /// Populate `stage_dir` (already created, empty) with `release`.
    ///
    /// # Errors
    ///
    /// Network, storage or integrity failures, or the error returned by
    /// `progress`.
    fn build_stage(&self, release: &Release, stage_dir: &Path, progress: StageProgress<'_>)
    -> Result<()>;
}

const DOWNLOAD_END: u8 = 70;
const VERIFY_END: u8 = 75;
const EXTRACT_END: u8 = 99;

/// Downloads an archive next to the stage, verifies it, then extracts it.
pub struct ArchiveStageBuilder {
    fetcher: Box<dyn ArchiveFetcher>,
    extractor: Box<dyn Extractor>,
}

impl ArchiveStageBuilder {
    /// Builder from explicit parts.
    pub fn new(fetcher: Box<dyn ArchiveFetcher>, extractor: Box<dyn Extractor>) -> Self {
        Self { fetcher, extractor }
    }

    /// HTTP download + zip extraction.
    pub fn http(feed: &FeedConfig) -> Self {
        Self::new(Box::new(HttpFetcher::new(feed)), Box::new(ZipExtractor))
    }
}

/// Archive path used for `stage_dir`: a sibling with a `.download` suffix.
pub fn archive_path_for(stage_dir: &Path) -> PathBuf {
    let mut name = stage_dir.as_os_str().to_owned();
    name.push(".download");
    PathBuf::from(name)
}

impl StageBuilder for ArchiveStageBuilder {
    fn build_stage(
        &self,
        release: &Release,
        stage_dir: &Path,
        progress: StageProgress<'_>,
    ) -> Result<()> {
        let archive = archive_path_for(stage_dir);
        let result = (|| -> Result<()> {
            self.fetcher.fetch(release, &archive, &mut |done, total| {
                let fraction = match total {
                    Some(total) if total > 0 => done as f64 / total as f64,
                    _ => 0.0,
                };
                progress(band(0, DOWNLOAD_END, fraction))
            })?;

            integrity::verify(&archive, release.sha256.as_deref())?;
            progress(VERIFY_END)?;

            self.extractor.extract(&archive, stage_dir, &mut |done, total| {
                let fraction = if total == 0 {
                    1.0
                } else {
                    done as f64 / total as f64
                };
                progress(band(VERIFY_END, EXTRACT_END, fraction))
            })?;

            flatten_single_root(stage_dir, INTERNAL_DIR)?;
            Ok(())
        })();

        if let Err(e) = std::fs::remove_file(&archive)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %archive.display(), error = %e, "cannot remove downloaded archive");
        }
        result
    }
}
